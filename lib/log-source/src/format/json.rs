use serde_json::Value;

use crate::envelope::strip_cloudwatch_event;
use crate::record::{Payload, Record, RecordMeta};

use super::FormatReader;

/// Accepts NDJSON (one value per line), Firehose-style concatenated JSON
/// (multiple values per line), and a mix of both, all via the same
/// `serde_json` stream deserializer — it treats any run of JSON whitespace
/// between values as a separator, whether or not that whitespace includes a
/// newline, so both shapes are handled uniformly without a line-oriented
/// scanning loop.
///
/// Each top-level value is first offered to the CloudWatch Events per-record
/// unwrap (a JSON value with both `detail-type` and `resources` has its
/// payload replaced by `.detail` and its provenance captured in meta) before
/// `json_delimiter` expansion runs, matching the original's
/// `check_cwe_and_strip_header` call ordering: delimiter expansion looks at
/// the already-unwrapped value, and every element it produces inherits the
/// envelope's provenance.
///
/// `json_delimiter`, when set and present as an array on the (possibly
/// unwrapped) value, flattens that array into one record per element;
/// counting walks the same traversal so `count()` and `iterate()` can never
/// disagree.
///
/// Uses 1-based inclusive `[start, end]` windows internally, as required by
/// the window-semantics rule for JSON readers.
pub struct JsonReader {
    records: Vec<(Value, RecordMeta)>,
}

impl JsonReader {
    pub fn new(body: &str, delimiter: Option<String>) -> Self {
        let stream = serde_json::Deserializer::from_str(body).into_iter::<Value>();
        let mut records = Vec::new();
        for value in stream.filter_map(|r| r.ok()) {
            let stripped = strip_cloudwatch_event(Record::new(Payload::Json(value), RecordMeta::default()));
            let Payload::Json(value) = stripped.payload else {
                unreachable!("strip_cloudwatch_event preserves Payload::Json")
            };
            for record_value in expand(&value, delimiter.as_deref()) {
                records.push((record_value, stripped.meta.clone()));
            }
        }
        Self { records }
    }
}

fn expand(value: &Value, delimiter: Option<&str>) -> Vec<Value> {
    if let Some(key) = delimiter {
        if let Some(Value::Array(items)) = value.get(key) {
            return items.clone();
        }
    }
    vec![value.clone()]
}

impl FormatReader for JsonReader {
    fn count(&self) -> u64 {
        self.records.len() as u64
    }

    fn iterate(&self, start: u64, end: u64) -> Vec<Record> {
        let mut out = Vec::new();
        let mut count: u64 = 0;
        for (value, meta) in &self.records {
            count += 1;
            if start <= count && count <= end {
                out.push(Record::new(Payload::Json(value.clone()), meta.clone()));
            }
        }
        out
    }
}
