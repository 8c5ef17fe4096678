//! Per-record normalization into an ECS-shaped document (C5–C9), composed
//! on top of the [`log_source`] crate's format-aware decoding and sharding
//! (C1–C4). [`process_object`] is the one entry point that ties both
//! halves together the way a caller (an object-store event handler) would.

pub mod enrich;
pub mod error;
pub mod exclude;
pub mod field_mapper;
pub mod job;
pub mod normalizer;
pub mod timestamp;
pub mod util;

use std::collections::BTreeMap;

use log_source::config::LogConfig;
use log_source::shard::WorkQueue;
use log_source::LogSource;
use snafu::ResultExt;
use tracing::{info, warn};

pub use enrich::{GeoIpLookup, GeoIpResult, MaxMindGeoIp};
pub use error::{Error, Result};
pub use exclude::Pattern;
pub use job::Job;
pub use normalizer::{NoopTransform, NormalizeOutcome, NormalizedRecord, Normalizer, ScriptTransform};

/// What happened when an object was run through the pipeline: it was too
/// large and got split into continuation jobs, it was ignored outright
/// (object-level), or it yielded zero or more normalized documents.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessOutcome {
    Sharded { shard_count: usize },
    Ignored { reason: String },
    Documents(Vec<NormalizedRecord>),
}

/// Runs one object through the complete pipeline: decode/shard via
/// [`LogSource`], then normalize each yielded record via [`Normalizer`].
/// `queue`, `exclude`, `geoip`, and `transform` are the external
/// collaborators named in §1 of the design: object-store retrieval already
/// happened (the caller hands in `object_bytes`), everything downstream of
/// that is this function's job.
#[allow(clippy::too_many_arguments)]
pub fn process_object(
    bucket: &str,
    key: &str,
    logtype: &str,
    config: LogConfig,
    object_bytes: &[u8],
    advertised_size: u64,
    shard_window: Option<(u64, u64)>,
    exclude: Option<&BTreeMap<String, Pattern>>,
    geoip: &dyn GeoIpLookup,
    transform: &dyn ScriptTransform,
    queue: &dyn WorkQueue,
) -> Result<ProcessOutcome> {
    info!(bucket, key, logtype, "ingesting object");

    let mut source = LogSource::new(bucket, key, logtype, config.clone(), object_bytes, advertised_size)
        .context(error::LogSourceSnafu)?;

    if let Some(shards) = source.shard(queue).context(error::ShardDispatchFailedSnafu)? {
        info!(bucket, key, shard_count = shards.len(), "object split into shards");
        return Ok(ProcessOutcome::Sharded {
            shard_count: shards.len(),
        });
    }

    if source.is_ignored() {
        let reason = source.ignored_reason().unwrap_or_default().to_string();
        info!(bucket, key, reason = %reason, "object ignored");
        return Ok(ProcessOutcome::Ignored { reason });
    }

    let normalizer = Normalizer {
        config: &config,
        bucket,
        key,
        logtype,
        geoip,
        transform,
    };

    let mut documents = Vec::new();
    for record in source.records(shard_window) {
        match normalizer.normalize(record, exclude)? {
            NormalizeOutcome::Document(doc) => documents.push(doc),
            NormalizeOutcome::Ignored { reason } => {
                warn!(bucket, key, reason = %reason, "record ignored");
            }
        }
    }
    Ok(ProcessOutcome::Documents(documents))
}

#[cfg(test)]
mod tests {
    use super::*;
    use log_source::config::FileFormat;
    use std::collections::HashMap;
    use std::net::IpAddr;

    struct NoopQueue;
    impl WorkQueue for NoopQueue {
        fn send_batch(&self, _entries: &[(String, String)]) -> bool {
            true
        }
    }

    struct NoopGeoIp;
    impl GeoIpLookup for NoopGeoIp {
        fn lookup(&self, _ip: IpAddr) -> GeoIpResult {
            GeoIpResult::default()
        }
    }

    fn csv_config() -> LogConfig {
        LogConfig {
            file_format: FileFormat::Csv,
            via_cwl: false,
            via_firelens: false,
            multiline_firstline: None,
            text_header_line_number: 1,
            s3_key_ignored: None,
            json_delimiter: None,
            ignore_container_stderr: false,
            timestamp_key: Some("time".to_string()),
            timestamp_format: Some("%Y-%m-%dT%H:%M:%SZ".to_string()),
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
    fn s1_csv_end_to_end_produces_one_document() {
        let mut config = csv_config();
        config.ecs_fields.insert(
            "host.name".to_string(),
            log_source::config::EcsSourceSpec::Alternatives("host".to_string()),
        );
        let body = b"time host msg\n2024-01-01T00:00:00Z h1 hello\n".to_vec();
        let geoip = NoopGeoIp;
        let transform = NoopTransform;
        let queue = NoopQueue;
        let outcome = process_object(
            "bucket",
            "key",
            "csvtype",
            config,
            &body,
            body.len() as u64,
            None,
            None,
            &geoip,
            &transform,
            &queue,
        )
        .unwrap();
        let ProcessOutcome::Documents(docs) = outcome else {
            panic!("expected documents");
        };
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].document["host"]["name"], "h1");
        assert_eq!(docs[0].document["@timestamp"], "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn ignored_object_never_reaches_normalizer() {
        let geoip = NoopGeoIp;
        let transform = NoopTransform;
        let queue = NoopQueue;
        let outcome = process_object(
            "bucket",
            "prefix/",
            "csvtype",
            csv_config(),
            b"",
            0,
            None,
            None,
            &geoip,
            &transform,
            &queue,
        )
        .unwrap();
        assert!(matches!(outcome, ProcessOutcome::Ignored { .. }));
    }

    #[test]
    fn oversized_object_shards_instead_of_normalizing() {
        let mut config = csv_config();
        config.file_format = FileFormat::Text;
        config.max_log_count = 10;
        config.timestamp_key = None;
        let body: Vec<u8> = (1..=25).map(|n| format!("line{n}\n")).collect::<String>().into_bytes();
        let geoip = NoopGeoIp;
        let transform = NoopTransform;
        let queue = NoopQueue;
        let outcome = process_object(
            "bucket",
            "key",
            "txttype",
            config,
            &body,
            body.len() as u64,
            None,
            None,
            &geoip,
            &transform,
            &queue,
        )
        .unwrap();
        assert_eq!(outcome, ProcessOutcome::Sharded { shard_count: 3 });
    }
}
