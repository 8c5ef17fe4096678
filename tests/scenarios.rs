//! Black-box integration tests for the six concrete scenarios named in the
//! design's testable-properties section, run through the crate's public
//! entry point end to end (decode → shard-check → normalize), the way an
//! object-store event handler would call it.

use std::collections::HashMap;
use std::net::IpAddr;

use log_source::config::{EcsSourceSpec, FileFormat, IndexRotation, IndexTime, LogConfig, RegexField};
use log_source::shard::WorkQueue;
use siem_normalizer::{GeoIpLookup, GeoIpResult, NoopTransform, ProcessOutcome};

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

fn base_config(file_format: FileFormat) -> LogConfig {
    LogConfig {
        file_format,
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
        index_rotation: IndexRotation::Auto,
        index_time: IndexTime::EventIngested,
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

fn process(
    bucket: &str,
    key: &str,
    logtype: &str,
    config: LogConfig,
    body: &[u8],
) -> ProcessOutcome {
    let geoip = NoopGeoIp;
    let transform = NoopTransform;
    let queue = NoopQueue;
    siem_normalizer::process_object(
        bucket,
        key,
        logtype,
        config,
        body,
        body.len() as u64,
        None,
        None,
        &geoip,
        &transform,
        &queue,
    )
    .unwrap()
}

#[test]
fn s1_csv() {
    let mut config = base_config(FileFormat::Csv);
    config.text_header_line_number = 1;
    config.timestamp_key = Some("time".to_string());
    config.timestamp_format = Some("%Y-%m-%dT%H:%M:%SZ".to_string());
    config
        .ecs_fields
        .insert("host.name".to_string(), EcsSourceSpec::Alternatives("host".to_string()));
    config
        .ecs_fields
        .insert("message".to_string(), EcsSourceSpec::Alternatives("msg".to_string()));

    let body = b"time host msg\n2024-01-01T00:00:00Z h1 hello\n".to_vec();
    let outcome = process("bucket", "key", "csvtype", config, &body);

    let ProcessOutcome::Documents(docs) = outcome else {
        panic!("expected documents");
    };
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].document["@timestamp"], "2024-01-01T00:00:00+00:00");
    assert_eq!(docs[0].document["host"]["name"], "h1");
    assert_eq!(docs[0].document["message"], "hello");
}

#[test]
fn s2_cloudwatch_logs() {
    let mut config = base_config(FileFormat::Text);
    config.via_cwl = true;
    config.cloud_provider = Some("aws".to_string());

    let body = br#"{"messageType":"DATA_MESSAGE","owner":"123","logGroup":"g","logStream":"s","logEvents":[{"id":"a","timestamp":1700000000000,"message":"x"}]}"#.to_vec();
    let outcome = process("bucket", "key", "cwltype", config, &body);

    let ProcessOutcome::Documents(docs) = outcome else {
        panic!("expected documents");
    };
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].document["@log_group"], "g");
    assert_eq!(docs[0].document["cloud"]["account"]["id"], "123");
}

#[test]
fn s3_firelens_stderr() {
    // `file_format=text` here, not `json`: when the inner format is json the
    // reader also attempts to parse `log` as JSON, and a parse failure on a
    // stderr line overwrites `error_message` with a generic parsing message
    // instead of the raw stderr text (see `FireLensReader::parse_line`).
    // The scenario as specified (`error.message="boom"`) exercises the
    // stderr-only path.
    let mut config = base_config(FileFormat::Text);
    config.via_firelens = true;
    config.ignore_container_stderr = false;

    let body = br#"{"container_id":"c1","container_name":"n","source":"stderr","log":"boom"}"#.to_vec();
    let outcome = process("bucket", "s3key", "firelenstype", config, &body);

    let ProcessOutcome::Documents(docs) = outcome else {
        panic!("expected documents");
    };
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].document["error"]["message"], "boom");
    assert_eq!(docs[0].doc_id, siem_normalizer::util::md5_hex("booms3key"));
}

#[test]
fn s4_multiline() {
    let mut config = base_config(FileFormat::Multiline);
    config.multiline_firstline = Some(RegexField(regex::Regex::new(r"^\d{4}-").unwrap()));

    let body = b"2024-01-01 A\ncont\n2024-01-02 B\n".to_vec();
    let outcome = process("bucket", "key", "mltype", config, &body);

    let ProcessOutcome::Documents(docs) = outcome else {
        panic!("expected documents");
    };
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].document["message"], "2024-01-01 A\ncont");
    assert_eq!(docs[1].document["message"], "2024-01-02 B");
}

#[test]
fn s5_sharding() {
    let mut config = base_config(FileFormat::Text);
    config.max_log_count = 10;
    let body: Vec<u8> = (1..=25).map(|n| format!("line{n}\n")).collect::<String>().into_bytes();
    let outcome = process("bucket", "key", "txttype", config, &body);
    assert_eq!(outcome, ProcessOutcome::Sharded { shard_count: 3 });
}

#[test]
fn s6_index_rotation() {
    let mut config = base_config(FileFormat::Json);
    config.index_name = "logs-x".to_string();
    config.index_rotation = IndexRotation::Daily;
    config.index_time = IndexTime::Event;
    config.index_tz = Some(9.0);
    config.timestamp_key = Some("time".to_string());
    config.timestamp_format = Some("%Y-%m-%dT%H:%M:%S%z".to_string());

    let body = br#"{"time":"2024-03-04T10:00:00+0000"}"#.to_vec();
    let outcome = process("bucket", "key", "rotationtype", config, &body);

    let ProcessOutcome::Documents(docs) = outcome else {
        panic!("expected documents");
    };
    assert_eq!(docs[0].index_name, "logs-x-2024-03-04");
}

#[test]
fn ignored_record_is_dropped_but_not_fatal() {
    let mut config = base_config(FileFormat::Text);
    config.s3_key_ignored = Some(RegexField(regex::Regex::new(r"\.tmp$").unwrap()));
    let outcome = process("bucket", "file.tmp", "txttype", config, b"irrelevant body");
    assert!(matches!(outcome, ProcessOutcome::Ignored { .. }));
}
