//! The `(payload, meta)` pair produced by every `FormatReader`/envelope
//! stripper, and the provenance metadata side channel described in the data
//! model.

use serde_json::Value;

/// Side-channel provenance attached to a record by an envelope stripper.
/// Every field is optional: most records carry none of them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordMeta {
    pub loggroup: Option<String>,
    pub logstream: Option<String>,
    pub cwl_accountid: Option<String>,
    pub cwl_id: Option<String>,
    pub cwl_timestamp: Option<i64>,
    pub cwe_id: Option<String>,
    pub cwe_source: Option<String>,
    pub cwe_accountid: Option<String>,
    pub cwe_region: Option<String>,
    pub cwe_timestamp: Option<String>,
    pub container_id: Option<String>,
    pub container_name: Option<String>,
    pub container_source: Option<String>,
    pub ecs_cluster: Option<String>,
    pub ecs_task_arn: Option<String>,
    pub ecs_task_definition: Option<String>,
    pub ec2_instance_id: Option<String>,

    /// Internal sentinel: normalization of `payload` is skipped and
    /// `error_message` (if any) is attached to `error.message` instead.
    pub skip_normalization: bool,
    pub error_message: Option<String>,

    /// Record-level ignore, distinct from object-level ignore on `LogSource`.
    pub is_ignored: bool,
    pub ignored_reason: Option<String>,
}

impl RecordMeta {
    pub fn ignored(reason: impl Into<String>) -> Self {
        Self {
            is_ignored: true,
            ignored_reason: Some(reason.into()),
            ..Default::default()
        }
    }
}

/// One logical log entry pulled out of an object, alongside whatever
/// provenance its envelope carried. `payload` is text for `text`/`csv`/
/// `multiline` formats, raw XML text for `xml`/`winevtxml`, and an already
/// parsed JSON value for `json`.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Json(Value),
}

impl Payload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            Payload::Json(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub payload: Payload,
    pub meta: RecordMeta,
}

impl Record {
    pub fn new(payload: Payload, meta: RecordMeta) -> Self {
        Self { payload, meta }
    }
}
