//! Exclusion-pattern matching (C9): a nested map of compiled regexes walked
//! in parallel with a record, evaluated before normalization so matching
//! records never reach the pipeline.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::Value;

/// `map<string, Pattern> | Regex`, per the design notes. A group recurses
/// into the record at the same key; a leaf matches against the record's
/// scalar value at that key.
#[derive(Debug, Clone)]
pub enum Pattern {
    Group(BTreeMap<String, Pattern>),
    Leaf(Regex),
}

/// Walks `pattern` against `record` one top-level key at a time, preserving
/// the original's exact short-circuit quirk: as soon as a key present in
/// both `pattern` and `record` resolves to a `Group`-vs-object pair, this
/// returns whatever that nested call returns *without checking the
/// remaining sibling keys* — it does not try every key at a level and OR
/// the results together. A `Leaf` match returns `true` immediately; a
/// `Leaf` miss moves on to the next key. Lists on the record side are
/// never recursed into (arrays can't carry nested exclusion keys).
///
/// This is preserved exactly even though it reads as a bug, because
/// changing it would change which records existing rulesets drop.
pub fn matches(pattern: &BTreeMap<String, Pattern>, record: &Value) -> bool {
    let Some(record_obj) = record.as_object() else {
        return false;
    };
    for (key, sub_pattern) in pattern {
        let Some(record_value) = record_obj.get(key) else {
            continue;
        };
        match sub_pattern {
            Pattern::Group(group) => {
                if record_value.is_object() {
                    return matches(group, record_value);
                }
            }
            Pattern::Leaf(regex) => {
                if record_value.is_array() {
                    continue;
                }
                let text = match record_value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                if regex.is_match(&text) {
                    return true;
                }
            }
        }
    }
    false
}
