use regex::Regex;

use crate::record::{Payload, Record, RecordMeta};

use super::FormatReader;

/// A record begins on a line matching `first_line` and ends immediately
/// before the next such match, or at EOF. Uses 1-based inclusive `[start,
/// end]` windows internally, as required by the window-semantics rule.
pub struct MultilineReader<'a> {
    body: &'a str,
    first_line: Regex,
}

impl<'a> MultilineReader<'a> {
    pub fn new(body: &'a str, first_line: Regex) -> Self {
        Self { body, first_line }
    }

    fn records(&self) -> Vec<String> {
        split_records(self.body, &self.first_line)
    }
}

/// Splits a body into whole records, joined with `\n`, on a first-line
/// regex. Shared by `multiline`, `xml`, and `winevtxml`, which all use the
/// identical boundary policy: a record begins on a line matching
/// `first_line` and ends immediately before the next such match or at EOF.
/// Matches the original's `"".join(multilog).rstrip()`.
pub(crate) fn split_records(body: &str, first_line: &Regex) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in body.lines() {
        if first_line.is_match(line) {
            if !current.is_empty() {
                out.push(current.join("\n"));
            }
            current = vec![line];
        } else if !current.is_empty() {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(current.join("\n"));
    }
    out
}

impl<'a> FormatReader for MultilineReader<'a> {
    fn count(&self) -> u64 {
        self.records().len() as u64
    }

    fn iterate(&self, start: u64, end: u64) -> Vec<Record> {
        self.records()
            .into_iter()
            .enumerate()
            .filter_map(|(i, record)| {
                let n = (i + 1) as u64;
                (start <= n && n <= end)
                    .then(|| Record::new(Payload::Text(record), RecordMeta::default()))
            })
            .collect()
    }
}
