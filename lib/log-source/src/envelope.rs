//! Envelope strippers (C3): CloudWatch Logs subscription envelopes and
//! FireLens container-log envelopes replace the normal per-format reader
//! entirely (the original's `via_cwl`/`via_firelens` branches bypass
//! `file_format`-based counting), while the CloudWatch Events per-record
//! check is a thin post-process over whatever the JSON reader already
//! produced.

use serde_json::Value;

use crate::config::FileFormat;
use crate::record::{Payload, Record, RecordMeta};

use super::format::FormatReader;

/// Strategy selected at `LogSource` construction when `via_cwl` is set. The
/// raw body is a concatenation of envelopes of the shape
/// `{messageType, owner, logGroup, logStream, logEvents: [...]}`; only
/// `DATA_MESSAGE` envelopes are expanded, others are dropped entirely (they
/// do not even count towards `log_count`). Uses 0-based half-open windows,
/// like `text`/`csv`.
pub struct CwlReader {
    events: Vec<(Value, RecordMeta)>,
    inner_format: FileFormat,
}

impl CwlReader {
    pub fn new(body: &str, inner_format: FileFormat) -> Self {
        let mut events = Vec::new();
        let stream = serde_json::Deserializer::from_str(body).into_iter::<Value>();
        for envelope in stream.filter_map(|r| r.ok()) {
            let Some("DATA_MESSAGE") = envelope.get("messageType").and_then(Value::as_str) else {
                continue;
            };
            let Some(log_events) = envelope.get("logEvents").and_then(Value::as_array) else {
                continue;
            };
            let owner = envelope.get("owner").and_then(Value::as_str).map(String::from);
            let log_group = envelope
                .get("logGroup")
                .and_then(Value::as_str)
                .map(String::from);
            let log_stream = envelope
                .get("logStream")
                .and_then(Value::as_str)
                .map(String::from);
            for event in log_events {
                let mut meta = RecordMeta {
                    cwl_accountid: owner.clone(),
                    loggroup: log_group.clone(),
                    logstream: log_stream.clone(),
                    ..Default::default()
                };
                meta.cwl_id = event.get("id").and_then(Value::as_str).map(String::from);
                meta.cwl_timestamp = event.get("timestamp").and_then(Value::as_i64);
                let message = event
                    .get("message")
                    .cloned()
                    .unwrap_or(Value::String(String::new()));
                events.push((message, meta));
            }
        }
        Self {
            events,
            inner_format,
        }
    }
}

impl FormatReader for CwlReader {
    fn count(&self) -> u64 {
        self.events.len() as u64
    }

    fn iterate(&self, start: u64, end: u64) -> Vec<Record> {
        let start = start as usize;
        let end = (end as usize).min(self.events.len());
        if start >= end {
            return Vec::new();
        }
        self.events[start..end]
            .iter()
            .map(|(message, meta)| {
                let payload = match (self.inner_format, message) {
                    (FileFormat::Json, Value::String(text)) => {
                        serde_json::from_str(text).unwrap_or_else(|_| message.clone())
                    }
                    (FileFormat::Json, other) => other.clone(),
                    (_, Value::String(text)) => return Record::new(
                        Payload::Text(text.clone()),
                        meta.clone(),
                    ),
                    (_, other) => other.clone(),
                };
                Record::new(Payload::Json(payload), meta.clone())
            })
            .collect()
    }
}

/// Strategy selected at construction when `via_firelens` is set. Each line
/// is a JSON object; the record payload is its `log` field. Uses 0-based
/// half-open windows, like `text`/`csv`.
pub struct FireLensReader<'a> {
    lines: Vec<&'a str>,
    inner_format: FileFormat,
    ignore_container_stderr: bool,
}

impl<'a> FireLensReader<'a> {
    pub fn new(body: &'a str, inner_format: FileFormat, ignore_container_stderr: bool) -> Self {
        Self {
            lines: body.lines().collect(),
            inner_format,
            ignore_container_stderr,
        }
    }

    fn parse_line(&self, line: &str) -> Record {
        let obj: Value = match serde_json::from_str(line.trim()) {
            Ok(v) => v,
            Err(_) => return Record::new(Payload::Text(String::new()), RecordMeta::ignored("invalid firelens envelope")),
        };
        let mut meta = RecordMeta {
            container_id: str_field(&obj, "container_id"),
            container_name: str_field(&obj, "container_name"),
            container_source: str_field(&obj, "source"),
            ecs_cluster: str_field(&obj, "ecs_cluster"),
            ecs_task_arn: str_field(&obj, "ecs_task_arn"),
            ecs_task_definition: str_field(&obj, "ecs_task_definition"),
            ec2_instance_id: str_field(&obj, "ec2_instance_id"),
            ..Default::default()
        };
        let log_value = obj.get("log").cloned().unwrap_or(Value::Null);

        if meta.container_source.as_deref() == Some("stderr") {
            if self.ignore_container_stderr {
                meta.is_ignored = true;
                meta.ignored_reason = Some("log is container's stderr".to_string());
            } else {
                meta.skip_normalization = true;
                meta.error_message = log_value.as_str().map(String::from);
            }
        }

        if self.inner_format == FileFormat::Json {
            let raw = log_value.as_str().unwrap_or_default();
            match serde_json::from_str::<Value>(raw) {
                Ok(parsed) => return Record::new(Payload::Json(parsed), meta),
                Err(_) => {
                    meta.skip_normalization = true;
                    if meta.error_message.is_some() {
                        meta.error_message =
                            Some("Invalid file format found during parsing".to_string());
                    }
                    return Record::new(Payload::Json(log_value), meta);
                }
            }
        }
        match log_value {
            Value::String(text) => Record::new(Payload::Text(text), meta),
            other => Record::new(Payload::Json(other), meta),
        }
    }
}

fn str_field(obj: &Value, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(String::from)
}

impl<'a> FormatReader for FireLensReader<'a> {
    fn count(&self) -> u64 {
        self.lines.len() as u64
    }

    fn iterate(&self, start: u64, end: u64) -> Vec<Record> {
        let start = start as usize;
        let end = (end as usize).min(self.lines.len());
        if start >= end {
            return Vec::new();
        }
        self.lines[start..end]
            .iter()
            .map(|line| self.parse_line(line))
            .collect()
    }
}

/// CloudWatch Events per-record unwrap: when a parsed JSON record has both
/// `detail-type` and `resources`, the payload becomes `record.detail` and
/// provenance is captured. Applied as a post-process over plain `json`
/// format records only (the original never applies this to `via_cwl`
/// records).
pub fn strip_cloudwatch_event(record: Record) -> Record {
    let Payload::Json(value) = &record.payload else {
        return record;
    };
    let is_cwe = value.get("detail-type").is_some() && value.get("resources").is_some();
    if !is_cwe {
        return record;
    }
    let mut meta = record.meta;
    meta.cwe_id = str_field(value, "id");
    meta.cwe_source = str_field(value, "source");
    meta.cwe_accountid = str_field(value, "account");
    meta.cwe_region = str_field(value, "region");
    meta.cwe_timestamp = str_field(value, "time");
    let detail = value.get("detail").cloned().unwrap_or(Value::Null);
    Record::new(Payload::Json(detail), meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cwl_reader_expands_log_events() {
        let body = r#"{"messageType":"DATA_MESSAGE","owner":"123","logGroup":"g","logStream":"s","logEvents":[{"id":"a","timestamp":1700000000000,"message":"x"}]}"#;
        let reader = CwlReader::new(body, FileFormat::Text);
        assert_eq!(reader.count(), 1);
        let records = reader.iterate(0, 1);
        assert_eq!(records[0].meta.loggroup.as_deref(), Some("g"));
        assert_eq!(records[0].meta.cwl_id.as_deref(), Some("a"));
        assert_eq!(records[0].payload.as_text(), Some("x"));
    }

    #[test]
    fn cwl_reader_drops_non_data_message() {
        let body = r#"{"messageType":"CONTROL_MESSAGE","logEvents":[]}"#;
        let reader = CwlReader::new(body, FileFormat::Text);
        assert_eq!(reader.count(), 0);
    }

    #[test]
    fn firelens_stderr_without_ignore_marks_skip() {
        let body = r#"{"container_id":"c1","container_name":"n","source":"stderr","log":"boom"}"#;
        let reader = FireLensReader::new(body, FileFormat::Text, false);
        let records = reader.iterate(0, 1);
        assert!(records[0].meta.skip_normalization);
        assert_eq!(records[0].meta.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn firelens_stderr_with_ignore_marks_ignored() {
        let body = r#"{"source":"stderr","log":"boom"}"#;
        let reader = FireLensReader::new(body, FileFormat::Text, true);
        let records = reader.iterate(0, 1);
        assert!(records[0].meta.is_ignored);
    }

    #[test]
    fn strips_cloudwatch_event_envelope() {
        let record = Record::new(
            Payload::Json(serde_json::json!({
                "detail-type": "x", "resources": [], "id": "i", "source": "aws.ec2",
                "account": "123", "region": "us-east-1", "time": "2024-01-01T00:00:00Z",
                "detail": {"a": 1}
            })),
            RecordMeta::default(),
        );
        let stripped = strip_cloudwatch_event(record);
        assert_eq!(stripped.meta.cwe_id.as_deref(), Some("i"));
        let Payload::Json(value) = stripped.payload else { panic!() };
        assert_eq!(value["a"], 1);
    }
}
