//! Normalizer (C8): composes FieldMapper, TimestampResolver, and Enricher,
//! applies the pluggable script transform, assigns id/index, and
//! serializes with the size-aware truncation pass.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Utc};
use log_source::config::{IndexRotation, IndexTime, LogConfig};
use log_source::record::{Payload, Record, RecordMeta};
use serde_json::Value;
use snafu::ResultExt;

use crate::error::{self, Result};
use crate::exclude::{self, Pattern};
use crate::field_mapper;
use crate::timestamp;
use crate::util;
use crate::enrich::GeoIpLookup;

/// Injected per-log-type plugin: reads and may mutate the mapped document,
/// optionally leaving the `__doc_id_suffix`/`__index_name` sentinels for
/// the core to consume and strip.
pub trait ScriptTransform {
    fn transform(&self, doc: Value) -> Value;
}

/// The default when `script_ecs` is not set for a log type.
pub struct NoopTransform;

impl ScriptTransform for NoopTransform {
    fn transform(&self, doc: Value) -> Value {
        doc
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub document: Value,
    pub json: String,
    pub doc_id: String,
    pub index_name: String,
    pub timestamp: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeOutcome {
    Document(NormalizedRecord),
    Ignored { reason: String },
}

pub struct Normalizer<'a> {
    pub config: &'a LogConfig,
    pub bucket: &'a str,
    pub key: &'a str,
    pub logtype: &'a str,
    pub geoip: &'a dyn GeoIpLookup,
    pub transform: &'a dyn ScriptTransform,
}

impl<'a> Normalizer<'a> {
    /// Runs one record through the full pipeline: parse-to-map, FireLens
    /// meta merge, ignore/exclusion checks, `event.ingested` capture,
    /// skip-normalization handling, timestamp resolution, basic fields,
    /// multi-type cleaning, field mapping, script transform, enrichment,
    /// and finalization, in that order.
    pub fn normalize(&self, record: Record, exclude: Option<&BTreeMap<String, Pattern>>) -> Result<NormalizeOutcome> {
        let message = record_message(&record.payload);
        let log_pattern = self.config.log_pattern.as_ref().map(|r| &r.0);
        let mut raw = payload_to_map(&record.payload, log_pattern, self.logtype)?;
        util::sanitize_keys(&mut raw);

        if record.meta.container_name.is_some() {
            merge_firelens_meta(&mut raw, &record.meta);
        }

        if record.meta.is_ignored {
            return Ok(NormalizeOutcome::Ignored {
                reason: record.meta.ignored_reason.clone().unwrap_or_default(),
            });
        }
        if let Some(patterns) = exclude {
            if exclude::matches(patterns, &raw) {
                return Ok(NormalizeOutcome::Ignored {
                    reason: "matched exclude pattern".to_string(),
                });
            }
        }

        let event_ingested: DateTime<Utc> = Utc::now();
        let skip = record.meta.skip_normalization;

        let timestamp: DateTime<FixedOffset> = if skip {
            event_ingested.into()
        } else {
            if let Some(key) = &self.config.timestamp_key {
                timestamp::materialize_meta_timestamp(&mut raw, key, &record.meta);
            }
            timestamp::resolve(&raw, self.config)?
        };

        let mut doc = Value::Object(serde_json::Map::new());
        add_basic_fields(
            &mut doc,
            self.logtype,
            self.bucket,
            self.key,
            &record.meta,
            &message,
            event_ingested,
            timestamp,
        );

        if skip {
            util::put(
                &mut doc,
                "error.message",
                Value::String(record.meta.error_message.clone().unwrap_or_default()),
            );
        } else {
            field_mapper::clean_multi_type_fields(&mut raw, self.config);
            field_mapper::map_fields(&raw, &record.meta, self.config, self.key, &mut doc);
            if self.config.script_ecs {
                doc = self.transform.transform(doc);
            }
            crate::enrich::enrich(&mut doc, &self.config.geoip, self.geoip);
        }

        self.finalize(doc, skip, &message, event_ingested, timestamp)
    }

    fn finalize(
        &self,
        mut doc: Value,
        skip: bool,
        message: &str,
        event_ingested: DateTime<Utc>,
        timestamp: DateTime<FixedOffset>,
    ) -> Result<NormalizeOutcome> {
        let script_suffix = take_string_sentinel(&mut doc, "__doc_id_suffix");
        let script_index = take_string_sentinel(&mut doc, "__index_name");

        let base_id = compute_base_id(&doc, self.config, message, self.key, skip);
        let mut doc_id = util::md5_hex(&base_id);

        let suffix = script_suffix.or_else(|| {
            self.config
                .doc_id_suffix
                .as_ref()
                .and_then(|path| util::dig(&doc, path))
                .map(value_as_text)
        });
        if let Some(suffix) = suffix {
            doc_id = format!("{doc_id}_{suffix}");
        }
        util::put(&mut doc, "@id", Value::String(doc_id.clone()));

        let index_name =
            script_index.unwrap_or_else(|| compute_index_name(self.config, event_ingested, timestamp));

        util::remove_empty(&mut doc);
        let mut serialized = serde_json::to_string(&doc).context(error::SerializeSnafu)?;
        if util::truncate_big_fields(&mut doc, serialized.len(), &doc_id) {
            serialized = serde_json::to_string(&doc).context(error::SerializeSnafu)?;
        }

        Ok(NormalizeOutcome::Document(NormalizedRecord {
            document: doc,
            json: serialized,
            doc_id,
            index_name,
            timestamp,
        }))
    }
}

fn record_message(payload: &Payload) -> String {
    match payload {
        Payload::Text(s) => s.clone(),
        Payload::Json(v) => v.to_string(),
    }
}

/// Parses a record's payload into a nested map: JSON payloads pass through
/// unchanged; text payloads go through the configured `log_pattern`
/// named-group regex when present. A configured pattern that fails to match
/// is a ruleset misconfiguration, not a record to pass through as-is, so it
/// is reported as a `ParseError`; the single-`message`-key fallback applies
/// only when no `log_pattern` is configured at all.
fn payload_to_map(payload: &Payload, log_pattern: Option<&regex::Regex>, logtype: &str) -> Result<Value> {
    match payload {
        Payload::Json(v) => Ok(v.clone()),
        Payload::Text(s) => {
            let Some(re) = log_pattern else {
                return Ok(serde_json::json!({ "message": s }));
            };
            let Some(caps) = re.captures(s) else {
                return error::ParseErrorSnafu {
                    reason: format!("Invalid regex pattern of {logtype}"),
                }
                .fail();
            };
            let mut obj = serde_json::Map::new();
            for name in re.capture_names().flatten() {
                if let Some(m) = caps.name(name) {
                    obj.insert(name.to_string(), Value::String(m.as_str().to_string()));
                }
            }
            Ok(Value::Object(obj))
        }
    }
}

/// Merges FireLens container metadata onto the parsed record map so
/// rulesets written against the older flat `container_id`/`ecs_cluster`
/// fields keep resolving, alongside the new nested fields.
fn merge_firelens_meta(raw: &mut Value, meta: &RecordMeta) {
    let mut patch = serde_json::Map::new();
    if let Some(v) = &meta.container_id {
        patch.insert("container_id".to_string(), Value::String(v.clone()));
    }
    if let Some(v) = &meta.container_name {
        patch.insert("container_name".to_string(), Value::String(v.clone()));
    }
    if let Some(v) = &meta.container_source {
        patch.insert("container_source".to_string(), Value::String(v.clone()));
    }
    if let Some(v) = &meta.ecs_cluster {
        patch.insert("ecs_cluster".to_string(), Value::String(v.clone()));
    }
    if let Some(v) = &meta.ecs_task_arn {
        patch.insert("ecs_task_arn".to_string(), Value::String(v.clone()));
    }
    if let Some(v) = &meta.ecs_task_definition {
        patch.insert("ecs_task_definition".to_string(), Value::String(v.clone()));
    }
    util::merge_into(raw, &Value::Object(patch));
}

fn add_basic_fields(
    doc: &mut Value,
    logtype: &str,
    bucket: &str,
    key: &str,
    meta: &RecordMeta,
    message: &str,
    event_ingested: DateTime<Utc>,
    timestamp: DateTime<FixedOffset>,
) {
    util::put(doc, "@timestamp", Value::String(timestamp.to_rfc3339()));
    util::put(doc, "event.ingested", Value::String(event_ingested.to_rfc3339()));
    util::put(doc, "event.module", Value::String(logtype.to_string()));
    util::put(doc, "@log_type", Value::String(logtype.to_string()));
    util::put(doc, "@message", Value::String(message.to_string()));
    util::put(doc, "@log_s3bucket", Value::String(bucket.to_string()));
    util::put(doc, "@log_s3key", Value::String(key.to_string()));
    if let Some(group) = &meta.loggroup {
        util::put(doc, "@log_group", Value::String(group.clone()));
    }
    if let Some(stream) = &meta.logstream {
        util::put(doc, "@log_stream", Value::String(stream.clone()));
    }
}

fn take_string_sentinel(doc: &mut Value, key: &str) -> Option<String> {
    doc.as_object_mut()
        .and_then(|obj| obj.remove(key))
        .and_then(|v| match v {
            Value::String(s) => Some(s),
            _ => None,
        })
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `@id`'s MD5 input: the configured `doc_id` field when it resolves to a
/// value in the mapped document; otherwise `@message`; when normalization
/// was skipped, always `@message` concatenated with the S3 key (field
/// mapping never ran, so no configured field exists to prefer).
fn compute_base_id(doc: &Value, config: &LogConfig, message: &str, key: &str, skip: bool) -> String {
    if skip {
        return format!("{message}{key}");
    }
    if let Some(path) = &config.doc_id {
        if let Some(value) = util::dig(doc, path) {
            return value_as_text(value);
        }
    }
    message.to_string()
}

fn compute_index_name(config: &LogConfig, event_ingested: DateTime<Utc>, timestamp: DateTime<FixedOffset>) -> String {
    if config.index_rotation == IndexRotation::Auto {
        return config.index_name.clone();
    }
    let base_time: DateTime<FixedOffset> = match config.index_time {
        IndexTime::EventIngested => event_ingested.into(),
        IndexTime::Event => timestamp,
    };
    let adjusted = match config.index_tz {
        Some(hours) => base_time.with_timezone(&timestamp::offset_from_hours(hours)),
        None => base_time,
    };
    let suffix = match config.index_rotation {
        IndexRotation::Daily => adjusted.format("%Y-%m-%d").to_string(),
        IndexRotation::Weekly => adjusted.format("%Y-w%W").to_string(),
        IndexRotation::Monthly => adjusted.format("%Y-%m").to_string(),
        IndexRotation::Yearly => adjusted.format("%Y").to_string(),
        IndexRotation::Auto => unreachable!("handled above"),
    };
    format!("{}-{suffix}", config.index_name)
}
