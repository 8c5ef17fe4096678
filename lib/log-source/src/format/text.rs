use crate::record::{Payload, Record, RecordMeta};

use super::FormatReader;

/// Lines are records. Every line, including any header lines, is counted
/// and indexable here; `LogSource::records` is the one place that applies
/// the `text_header_line_number` skip, against this full array, so the
/// skip happens exactly once.
pub struct TextReader<'a> {
    lines: Vec<&'a str>,
}

impl<'a> TextReader<'a> {
    pub fn new(body: &'a str) -> Self {
        let lines: Vec<&str> = body.lines().collect();
        Self { lines }
    }
}

impl<'a> FormatReader for TextReader<'a> {
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
            .map(|line| {
                Record::new(
                    Payload::Text(line.trim_end().to_string()),
                    RecordMeta::default(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_indexes_every_line_including_header() {
        let body = "HEADER\nfirst\nsecond\n";
        let reader = TextReader::new(body);
        assert_eq!(reader.count(), 3);
        let records = reader.iterate(1, 3);
        assert_eq!(records[0].payload.as_text(), Some("first"));
        assert_eq!(records[1].payload.as_text(), Some("second"));
    }

    #[test]
    fn strips_trailing_whitespace() {
        let body = "hello   \n";
        let reader = TextReader::new(body);
        assert_eq!(reader.iterate(0, 1)[0].payload.as_text(), Some("hello"));
    }
}
