//! C9 utilities: dotted-path get/put, recursive merge, size-aware
//! truncation, and the S3-key AWS account/region recovery supplement.
//!
//! The nested-map "tagged value variant" the design notes call for is
//! `serde_json::Value` itself: it is already scalar | list | map, so no
//! separate variant type is introduced.

use std::sync::OnceLock;

use md5::{Digest, Md5};
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

/// Reads a value at a dotted path (`"a.b.c"`), returning `None` if any
/// segment is missing or the value at a segment is not an object.
pub fn dig<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Writes `value` at a dotted path, creating intermediate objects as
/// needed. Overwrites a non-object intermediate with a fresh object.
pub fn put(root: &mut Value, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = root;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            match current.as_object_mut() {
                Some(obj) => {
                    obj.insert(segment.to_string(), value);
                }
                None => {
                    *current = Value::Object(Map::new());
                    current.as_object_mut().unwrap().insert(segment.to_string(), value);
                }
            }
            return;
        }
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let obj = current.as_object_mut().unwrap();
        current = obj
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Deep-merges `b` into `a`: object-vs-object recurses key by key,
/// anything else is an outright overwrite by `b`.
///
/// The original's three-branch rule (equal scalars keep `a`; `b` wins when
/// `str(a)` is a substring of `str(b)`, used to re-type a stringified JSON
/// blob back into a structured value; otherwise `b` overrides `a`) reduces
/// to exactly this once the scalar branches are traced through: every case
/// but object-vs-object assigns `b`'s value. Kept as the simpler equivalent
/// rather than re-deriving the three branches.
pub fn merge_into(a: &mut Value, b: &Value) {
    match (a.as_object_mut(), b.as_object()) {
        (Some(a_obj), Some(b_obj)) => {
            for (key, b_value) in b_obj {
                match a_obj.get_mut(key) {
                    Some(a_value) => merge_into(a_value, b_value),
                    None => {
                        a_obj.insert(key.clone(), b_value.clone());
                    }
                }
            }
        }
        _ => *a = b.clone(),
    }
}

/// Recursively replaces `-` with `_` in every map key.
pub fn sanitize_keys(value: &mut Value) {
    match value {
        Value::Object(obj) => {
            let old = std::mem::take(obj);
            for (key, mut v) in old {
                sanitize_keys(&mut v);
                obj.insert(key.replace('-', "_"), v);
            }
        }
        Value::Array(items) => {
            for item in items {
                sanitize_keys(item);
            }
        }
        _ => {}
    }
}

/// Coerces a value to display text for `json_to_text` cleaning: integers
/// (and other non-string scalars) pass through unchanged as far as the
/// caller is concerned; strings that embed `{` are re-rendered via Rust's
/// debug representation (matching the original's `str(dict)` fallback for
/// an already-stringified JSON blob), everything else is stringified.
pub fn value_to_text(value: &Value) -> Value {
    match value {
        Value::String(s) if s.contains('{') => Value::String(format!("{value:?}").replace("\\\"", "\"")),
        Value::String(_) => value.clone(),
        Value::Number(_) => value.clone(),
        other => Value::String(other.to_string()),
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => matches!(s.as_str(), "" | "-" | "null" | "[]"),
        Value::Object(obj) => obj.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Removes keys whose value is empty (per [`is_empty_value`]), recursing
/// into nested objects first so that an object left empty by its own
/// children's removal is itself removed.
pub fn remove_empty(value: &mut Value) {
    if let Value::Object(obj) = value {
        let keys: Vec<String> = obj.keys().cloned().collect();
        for key in keys {
            if let Some(v) = obj.get_mut(&key) {
                remove_empty(v);
                if is_empty_value(v) {
                    obj.remove(&key);
                }
            }
        }
    }
}

const TRUNCATE_DOC_THRESHOLD: usize = 65_536;
const TRUNCATE_FIELD_LEN_THRESHOLD: usize = 16_383;
const TRUNCATE_FIELD_BYTES_THRESHOLD: usize = 32_766;
const TRUNCATE_KEEP_BYTES: usize = 32_753;
const TRUNCATE_MARKER: &str = "<<TRUNCATED>>";

/// Truncates a string at a valid UTF-8 boundary no later than `max_bytes`.
pub fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut boundary = max_bytes;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }
    &s[..boundary]
}

/// If `serialized.len() >= 65,536`, walks `doc` and truncates every
/// oversized string field (length >= 16,383 chars and >= 32,766 UTF-8
/// bytes), `@message` exempt, logging each truncation with `doc_id`.
/// Returns `true` if anything was truncated (caller must re-serialize).
pub fn truncate_big_fields(doc: &mut Value, serialized_len: usize, doc_id: &str) -> bool {
    if serialized_len < TRUNCATE_DOC_THRESHOLD {
        return false;
    }
    let mut truncated = false;
    truncate_big_fields_inner(doc, doc_id, &mut truncated);
    truncated
}

fn truncate_big_fields_inner(value: &mut Value, doc_id: &str, truncated: &mut bool) {
    match value {
        Value::Object(obj) => {
            for (key, v) in obj.iter_mut() {
                if key == "@message" {
                    continue;
                }
                match v {
                    Value::String(s) => {
                        if s.chars().count() >= TRUNCATE_FIELD_LEN_THRESHOLD && s.len() >= TRUNCATE_FIELD_BYTES_THRESHOLD {
                            let kept = truncate_utf8(s, TRUNCATE_KEEP_BYTES).to_string();
                            warn!(doc_id, field = %key, original_len = s.len(), "truncated oversized field");
                            *s = format!("{kept}{TRUNCATE_MARKER}");
                            *truncated = true;
                        }
                    }
                    _ => truncate_big_fields_inner(v, doc_id, truncated),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                truncate_big_fields_inner(item, doc_id, truncated);
            }
        }
        _ => {}
    }
}

pub fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn aws_logs_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"AWSLogs/(?P<account>\d{12})/[^/]+/(?P<region>[a-z0-9-]+)/").unwrap())
}

/// Recovers an AWS account id from an S3 key shaped like
/// `AWSLogs/<account-id>/<service>/<region>/...`, the conventional AWS
/// log-export layout. `None` when the key doesn't match.
pub fn aws_account_from_key(key: &str) -> Option<String> {
    aws_logs_key_regex()
        .captures(key)
        .map(|c| c["account"].to_string())
}

/// Recovers an AWS region from an S3 key shaped like
/// `AWSLogs/<account-id>/<service>/<region>/...`. `None` when the key
/// doesn't match.
pub fn aws_region_from_key(key: &str) -> Option<String> {
    aws_logs_key_regex()
        .captures(key)
        .map(|c| c["region"].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::{option, prop_assert, prop_assert_eq, proptest};
    use serde_json::json;

    #[test]
    fn dig_walks_dotted_path() {
        let v = json!({"a": {"b": {"c": 1}}});
        assert_eq!(dig(&v, "a.b.c"), Some(&json!(1)));
        assert_eq!(dig(&v, "a.x"), None);
    }

    #[test]
    fn put_creates_nested_objects() {
        let mut v = json!({});
        put(&mut v, "a.b.c", json!(1));
        assert_eq!(v, json!({"a": {"b": {"c": 1}}}));
    }

    #[test]
    fn merge_into_recurses_objects_and_overwrites_scalars() {
        let mut a = json!({"a": 1, "nested": {"x": 1, "y": 2}});
        let b = json!({"a": 2, "nested": {"y": 3, "z": 4}});
        merge_into(&mut a, &b);
        assert_eq!(a, json!({"a": 2, "nested": {"x": 1, "y": 3, "z": 4}}));
    }

    #[test]
    fn remove_empty_drops_sentinels_recursively() {
        let mut v = json!({"a": "", "b": "-", "c": "null", "d": "[]", "e": [], "f": {}, "g": {"h": ""}, "keep": "x"});
        remove_empty(&mut v);
        assert_eq!(v, json!({"keep": "x"}));
    }

    #[test]
    fn truncate_utf8_respects_char_boundaries() {
        let s = "a".repeat(10) + "\u{1F600}";
        let truncated = truncate_utf8(&s, 11);
        assert!(truncated.len() <= 11);
        assert!(std::str::from_utf8(truncated.as_bytes()).is_ok());
    }

    #[test]
    fn aws_account_and_region_parsed_from_key() {
        let key = "AWSLogs/123456789012/elasticloadbalancing/us-east-1/2024/01/01/file.gz";
        assert_eq!(aws_account_from_key(key).as_deref(), Some("123456789012"));
        assert_eq!(aws_region_from_key(key).as_deref(), Some("us-east-1"));
        assert_eq!(aws_account_from_key("no/match/here"), None);
    }

    #[test]
    fn md5_hex_is_stable() {
        assert_eq!(md5_hex("boom"), format!("{:x}", md5::Md5::digest(b"boom")));
    }

    proptest! {
        /// Testable Property 6 (truncation bound), isolated to the
        /// `truncate_utf8` primitive: the result never exceeds the
        /// requested byte budget and always lands on a valid UTF-8
        /// boundary, for any string and any budget.
        #[test]
        fn truncate_utf8_never_exceeds_budget_and_stays_valid_utf8(s in ".{0,200}", max_bytes in 0usize..300) {
            let truncated = truncate_utf8(&s, max_bytes);
            prop_assert!(truncated.len() <= max_bytes);
            prop_assert!(truncated.len() <= s.len());
            prop_assert!(std::str::from_utf8(truncated.as_bytes()).is_ok());
        }

        /// `remove_empty` is idempotent: running it twice yields the same
        /// result as running it once.
        #[test]
        fn remove_empty_is_idempotent(a in option::of(".{0,10}"), b in option::of(".{0,10}")) {
            let mut v = json!({"a": a, "b": b, "keep": "x"});
            remove_empty(&mut v);
            let once = v.clone();
            remove_empty(&mut v);
            prop_assert_eq!(once, v);
        }
    }
}
