//! Enricher (C7): geo/ASN lookup driver. The lookup database itself is an
//! external collaborator; only the interface it must satisfy is specified
//! here, plus a `maxminddb`-backed implementation.

use std::net::IpAddr;
use std::str::FromStr;

use serde_json::Value;

use crate::util;

/// Geo and ASN facts for one IP address, already shaped as ECS fragments
/// (`geo.*`, `as.*`) ready to merge onto the record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoIpResult {
    pub geo: Option<Value>,
    pub asn: Option<Value>,
}

/// Injected by the caller; wraps whichever geo/ASN database is actually
/// open (MaxMind GeoLite2 in the reference deployment, a fake table in
/// tests).
pub trait GeoIpLookup {
    fn lookup(&self, ip: IpAddr) -> GeoIpResult;
}

/// For each key in `geoip`, reads `record[key].ip`, queries `lookup`, and
/// merges the geo/ASN fragments under `record[key].geo`/`record[key].as`
/// without disturbing sibling fields already at that path. A missing or
/// unparsable IP is silently skipped.
pub fn enrich(doc: &mut Value, geoip: &str, lookup: &dyn GeoIpLookup) {
    for key in geoip.split_whitespace() {
        let ip_path = format!("{key}.ip");
        let Some(ip_value) = util::dig(doc, &ip_path).and_then(|v| v.as_str()) else {
            continue;
        };
        let Ok(ip) = IpAddr::from_str(ip_value) else {
            continue;
        };
        let result = lookup.lookup(ip);
        if let Some(geo) = result.geo {
            util::put(doc, &format!("{key}.geo"), geo);
        }
        if let Some(asn) = result.asn {
            util::put(doc, &format!("{key}.as"), asn);
        }
    }
}

/// `GeoIpLookup` backed by MaxMind city and ASN databases opened once at
/// startup and queried read-only thereafter, matching the shared-resource
/// policy for the geo database.
pub struct MaxMindGeoIp {
    city: Option<maxminddb::Reader<Vec<u8>>>,
    asn: Option<maxminddb::Reader<Vec<u8>>>,
}

impl MaxMindGeoIp {
    pub fn open(city_db_path: Option<&str>, asn_db_path: Option<&str>) -> Result<Self, maxminddb::MaxMindDBError> {
        let city = city_db_path.map(maxminddb::Reader::open_readfile).transpose()?;
        let asn = asn_db_path.map(maxminddb::Reader::open_readfile).transpose()?;
        Ok(Self { city, asn })
    }

    fn city_to_value(record: &maxminddb::geoip2::City) -> Value {
        let mut geo = serde_json::Map::new();
        if let Some(country) = record.country.as_ref().and_then(|c| c.iso_code) {
            geo.insert("country_iso_code".to_string(), Value::String(country.to_string()));
        }
        if let Some(city_name) = record
            .city
            .as_ref()
            .and_then(|c| c.names.as_ref())
            .and_then(|names| names.get("en"))
        {
            geo.insert("city_name".to_string(), Value::String((*city_name).to_string()));
        }
        if let Some(location) = &record.location {
            if let (Some(lat), Some(lon)) = (location.latitude, location.longitude) {
                geo.insert(
                    "location".to_string(),
                    serde_json::json!({"lat": lat, "lon": lon}),
                );
            }
        }
        Value::Object(geo)
    }

    fn asn_to_value(record: &maxminddb::geoip2::Asn) -> Value {
        let mut asn_obj = serde_json::Map::new();
        if let Some(number) = record.autonomous_system_number {
            asn_obj.insert("number".to_string(), Value::Number(number.into()));
        }
        if let Some(org) = record.autonomous_system_organization {
            asn_obj.insert("organization".to_string(), serde_json::json!({"name": org}));
        }
        Value::Object(asn_obj)
    }
}

impl GeoIpLookup for MaxMindGeoIp {
    fn lookup(&self, ip: IpAddr) -> GeoIpResult {
        let geo = self
            .city
            .as_ref()
            .and_then(|db| db.lookup::<maxminddb::geoip2::City>(ip).ok())
            .map(|record| Self::city_to_value(&record));
        let asn = self
            .asn
            .as_ref()
            .and_then(|db| db.lookup::<maxminddb::geoip2::Asn>(ip).ok())
            .map(|record| Self::asn_to_value(&record));
        GeoIpResult { geo, asn }
    }
}
