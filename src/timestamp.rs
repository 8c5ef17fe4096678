//! TimestampResolver (C6): extracts and parses the configured timestamp
//! field, or falls back to "now" when none is configured.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use log_source::config::LogConfig;
use log_source::record::RecordMeta;
use serde_json::Value;

use crate::error::{self, Result};
use crate::util;

pub(crate) fn offset_from_hours(hours: f64) -> FixedOffset {
    let seconds = (hours * 3600.0).round() as i32;
    FixedOffset::east_opt(seconds).unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
}

/// `cwe_timestamp`/`cwl_timestamp` never appear in the parsed payload, only
/// in `meta`; when `timestamp_key` names one of them, copy it into the
/// record map first so the generic dotted-path extraction below can find
/// it like any other field.
pub fn materialize_meta_timestamp(doc: &mut Value, key: &str, meta: &RecordMeta) {
    match key {
        "cwe_timestamp" => {
            if let Some(v) = &meta.cwe_timestamp {
                util::put(doc, key, Value::String(v.clone()));
            }
        }
        "cwl_timestamp" => {
            if let Some(v) = meta.cwl_timestamp {
                util::put(doc, key, Value::String(v.to_string()));
            }
        }
        _ => {}
    }
}

/// Resolves `@timestamp` for one record. When `timestamp_key` is
/// configured, extracts the raw value via dotted-path lookup and parses it
/// with `timestamp_format` in `timestamp_tz`; a parse failure is a hard
/// error (`BadTimestamp`). Otherwise returns the current UTC instant.
pub fn resolve(doc: &Value, config: &LogConfig) -> Result<DateTime<FixedOffset>> {
    let Some(key) = &config.timestamp_key else {
        return Ok(Utc::now().into());
    };
    let Some(raw_value) = util::dig(doc, key) else {
        return error::BadTimestampSnafu {
            key: key.clone(),
            raw: String::new(),
            format: config.timestamp_format.clone(),
        }
        .fail();
    };
    let raw = match raw_value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let raw_for_parse = if config.timestamp_nano { truncate_nanos(&raw) } else { raw.clone() };
    let offset = offset_from_hours(config.timestamp_tz);

    let parsed = match &config.timestamp_format {
        Some(format) => parse_with_format(&raw_for_parse, format, offset),
        None => DateTime::parse_from_rfc3339(&raw_for_parse).ok(),
    };

    parsed.ok_or_else(|| {
        error::BadTimestampSnafu {
            key: key.clone(),
            raw,
            format: config.timestamp_format.clone(),
        }
        .build()
    })
}

fn parse_with_format(raw: &str, format: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_str(raw, format) {
        return Some(dt);
    }
    let naive = NaiveDateTime::parse_from_str(raw, format).ok()?;
    offset.from_local_datetime(&naive).single()
}

/// Truncates a fractional-second field down to microsecond precision so
/// chrono's parser can still consume a `timestamp_nano`-flagged value with
/// more than 6 fractional digits; the additional precision is not retained
/// in `@timestamp`. Leaves the string untouched when there is no decimal
/// point or the fraction is already 6 digits or fewer.
fn truncate_nanos(raw: &str) -> String {
    let Some(dot) = raw.rfind('.') else {
        return raw.to_string();
    };
    let (head, tail) = raw.split_at(dot + 1);
    let digit_len = tail.chars().take_while(|c| c.is_ascii_digit()).count();
    if digit_len <= 6 {
        return raw.to_string();
    }
    let (digits, rest) = tail.split_at(digit_len);
    format!("{head}{}{rest}", &digits[..6])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn base_config() -> LogConfig {
        LogConfig {
            file_format: log_source::config::FileFormat::Json,
            via_cwl: false,
            via_firelens: false,
            multiline_firstline: None,
            text_header_line_number: 0,
            s3_key_ignored: None,
            json_delimiter: None,
            ignore_container_stderr: false,
            timestamp_key: None,
            timestamp_format: None,
            timestamp_tz: 0.0,
            timestamp_nano: false,
            index_tz: None,
            index_rotation: log_source::config::IndexRotation::Auto,
            index_time: log_source::config::IndexTime::EventIngested,
            index_name: "logs-test".to_string(),
            ecs: String::new(),
            ecs_fields: HashMap::new(),
            static_ecs: String::new(),
            static_ecs_fields: HashMap::new(),
            cloud_provider: None,
            ecs_version: "8.11.0".to_string(),
            doc_id: None,
            doc_id_suffix: None,
            json_to_text: String::new(),
            geoip: String::new(),
            script_ecs: false,
            log_pattern: None,
            max_log_count: 20_000,
        }
    }

    #[test]
    fn falls_back_to_now_when_unconfigured() {
        let config = base_config();
        let doc = json!({});
        let resolved = resolve(&doc, &config).unwrap();
        assert!((Utc::now().timestamp() - resolved.timestamp()).abs() < 5);
    }

    #[test]
    fn parses_configured_format_and_tz() {
        let mut config = base_config();
        config.timestamp_key = Some("time".to_string());
        config.timestamp_format = Some("%Y-%m-%dT%H:%M:%SZ".to_string());
        let doc = json!({"time": "2024-01-01T00:00:00Z"});
        let resolved = resolve(&doc, &config).unwrap();
        assert_eq!(resolved.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn bad_timestamp_is_an_error() {
        let mut config = base_config();
        config.timestamp_key = Some("time".to_string());
        config.timestamp_format = Some("%Y-%m-%dT%H:%M:%SZ".to_string());
        let doc = json!({"time": "not a timestamp"});
        assert!(resolve(&doc, &config).is_err());
    }

    #[test]
    fn nano_precision_timestamp_truncates_to_microseconds() {
        let mut config = base_config();
        config.timestamp_key = Some("time".to_string());
        config.timestamp_format = Some("%Y-%m-%dT%H:%M:%S%.fZ".to_string());
        config.timestamp_nano = true;
        let doc = json!({"time": "2024-01-01T00:00:00.123456789Z"});
        let resolved = resolve(&doc, &config).unwrap();
        assert_eq!(resolved.to_rfc3339(), "2024-01-01T00:00:00.123456+00:00");
    }

    #[test]
    fn truncate_nanos_leaves_short_fractions_alone() {
        assert_eq!(truncate_nanos("2024-01-01T00:00:00.123Z"), "2024-01-01T00:00:00.123Z");
        assert_eq!(truncate_nanos("2024-01-01T00:00:00Z"), "2024-01-01T00:00:00Z");
    }

    #[test]
    fn materializes_cwl_timestamp_from_meta() {
        let mut doc = json!({});
        let meta = RecordMeta {
            cwl_timestamp: Some(1700000000000),
            ..Default::default()
        };
        materialize_meta_timestamp(&mut doc, "cwl_timestamp", &meta);
        assert_eq!(doc["cwl_timestamp"], "1700000000000");
    }
}
