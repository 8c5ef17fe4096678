//! FieldMapper (C5): walks `ecs_fields`/`static_ecs_fields` to build the
//! ECS-shaped output map, applies the cloud-identity default chain, and
//! cleans multi-type fields ahead of serialization.

use std::net::IpAddr;
use std::str::FromStr;

use log_source::config::{EcsSourceSpec, LogConfig};
use log_source::record::RecordMeta;
use serde_json::Value;

use crate::util;

/// Runs the per-key source-spec resolution, IP validation, cloud-identity
/// defaults, FireLens ARN override, and static injection, writing
/// everything into `out`. `raw` is the parsed-and-meta-merged record the
/// source specs read from.
pub fn map_fields(raw: &Value, meta: &RecordMeta, config: &LogConfig, key: &str, out: &mut Value) {
    util::put(out, "ecs.version", Value::String(config.ecs_version.clone()));

    for (target, spec) in &config.ecs_fields {
        if let Some(value) = resolve_spec(raw, spec) {
            if is_ip_field(target) && !validate_ip(&value) {
                continue;
            }
            util::put(out, target, value);
        }
    }

    if let Some(provider) = &config.cloud_provider {
        util::put(out, "cloud.provider", Value::String(provider.clone()));
        apply_cloud_identity_defaults(out, meta, key);
    }

    apply_firelens_overrides(out, meta);

    for field in config.static_ecs.split_whitespace() {
        if let Some(value) = config.static_ecs_fields.get(field) {
            util::put(out, field, Value::String(value.clone()));
        }
    }
}

fn resolve_spec(raw: &Value, spec: &EcsSourceSpec) -> Option<Value> {
    match spec {
        EcsSourceSpec::Alternatives(paths) => paths
            .split_whitespace()
            .find_map(|path| util::dig(raw, path).filter(|v| !is_blank(v)).cloned()),
        EcsSourceSpec::List(paths) => {
            let mut values: Vec<String> = paths
                .iter()
                .filter_map(|path| util::dig(raw, path))
                .filter(|v| !is_blank(v))
                .map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            values.sort();
            values.dedup();
            if values.is_empty() {
                None
            } else {
                Some(Value::Array(values.into_iter().map(Value::String).collect()))
            }
        }
    }
}

fn is_blank(v: &Value) -> bool {
    matches!(v, Value::Null) || matches!(v, Value::String(s) if s.is_empty())
}

fn is_ip_field(target: &str) -> bool {
    target.ends_with(".ip") || target == "ip"
}

fn validate_ip(value: &Value) -> bool {
    match value {
        Value::String(s) => IpAddr::from_str(s).is_ok(),
        _ => false,
    }
}

fn record_account(meta: &RecordMeta) -> Option<&str> {
    meta.cwl_accountid.as_deref().or(meta.cwe_accountid.as_deref())
}

fn record_region(meta: &RecordMeta) -> Option<&str> {
    meta.cwe_region.as_deref()
}

/// `cloud.account.id`/`cloud.region` precedence: mapped value (unless
/// literally `"unknown"`) > value carried in record provenance > value
/// recovered from the conventional `AWSLogs/<account>/<service>/<region>/`
/// S3 key shape > `"unknown"`.
fn apply_cloud_identity_defaults(out: &mut Value, meta: &RecordMeta, key: &str) {
    let mapped_account = util::dig(out, "cloud.account.id").and_then(|v| v.as_str()).map(str::to_string);
    let account = match mapped_account {
        Some(v) if v != "unknown" => v,
        _ => record_account(meta)
            .map(str::to_string)
            .or_else(|| util::aws_account_from_key(key))
            .unwrap_or_else(|| "unknown".to_string()),
    };
    util::put(out, "cloud.account.id", Value::String(account));

    let mapped_region = util::dig(out, "cloud.region").and_then(|v| v.as_str()).map(str::to_string);
    let region = match mapped_region {
        Some(v) if !v.is_empty() => v,
        _ => record_region(meta)
            .map(str::to_string)
            .or_else(|| util::aws_region_from_key(key))
            .unwrap_or_else(|| "unknown".to_string()),
    };
    util::put(out, "cloud.region", Value::String(region));
}

/// When `meta.ecs_task_arn` is present, its account/region components
/// override `cloud.account.id`/`cloud.region`; `ec2_instance_id` sets
/// `cloud.instance.id`; container identifiers populate `container.id`/
/// `container.name`.
fn apply_firelens_overrides(out: &mut Value, meta: &RecordMeta) {
    if let Some(arn) = &meta.ecs_task_arn {
        if let Some((account, region)) = parse_arn(arn) {
            util::put(out, "cloud.account.id", Value::String(account));
            util::put(out, "cloud.region", Value::String(region));
        }
    }
    if let Some(instance_id) = &meta.ec2_instance_id {
        util::put(out, "cloud.instance.id", Value::String(instance_id.clone()));
    }
    if let Some(container_id) = &meta.container_id {
        util::put(out, "container.id", Value::String(container_id.clone()));
    }
    if let Some(container_name) = &meta.container_name {
        util::put(out, "container.name", Value::String(container_name.clone()));
    }
}

/// `arn:aws:ecs:<region>:<account-id>:task/...` → `(account, region)`.
fn parse_arn(arn: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = arn.splitn(6, ':').collect();
    if parts.len() < 6 || parts[0] != "arn" {
        return None;
    }
    let region = parts[3];
    let account = parts[4];
    if region.is_empty() || account.is_empty() {
        return None;
    }
    Some((account.to_string(), region.to_string()))
}

/// For each key named in `json_to_text`, re-inserts the current value as
/// text (see [`util::value_to_text`]), preventing a field from holding a
/// number in one record and a string in the next across a ruleset.
pub fn clean_multi_type_fields(doc: &mut Value, config: &LogConfig) {
    for key in config.json_to_text.split_whitespace() {
        if let Some(current) = util::dig(doc, key).cloned() {
            util::put(doc, key, util::value_to_text(&current));
        }
    }
}
