use regex::Regex;
use serde_json::{Map, Value};

use crate::record::{Payload, Record, RecordMeta};

use super::multiline::split_records;
use super::xml::element_to_value;
use super::FormatReader;

/// Identical boundary policy to `multiline`/`xml`: a line matching
/// `first_line` starts a record. Each emitted record is the XML text of one
/// `<Event>`, parsed the same way as `xml` but with one Windows-specific
/// convention applied: `<EventData><Data Name="X">v</Data>...</EventData>`
/// collapses to `{"X": "v", ...}` rather than a list of `{"@Name": ..,
/// "#text": ..}` objects, since that is how Windows Event Log consumers
/// expect `EventData` to read.
pub struct WinEvtXmlReader<'a> {
    body: &'a str,
    first_line: Regex,
}

impl<'a> WinEvtXmlReader<'a> {
    pub fn new(body: &'a str, first_line: Regex) -> Self {
        Self { body, first_line }
    }

    fn records(&self) -> Vec<String> {
        split_records(self.body, &self.first_line)
    }
}

impl<'a> FormatReader for WinEvtXmlReader<'a> {
    fn count(&self) -> u64 {
        self.records().len() as u64
    }

    fn iterate(&self, start: u64, end: u64) -> Vec<Record> {
        self.records()
            .into_iter()
            .enumerate()
            .filter_map(|(i, text)| {
                let n = (i + 1) as u64;
                if !(start <= n && n <= end) {
                    return None;
                }
                let value = parse_event(&text).unwrap_or(Value::Null);
                Some(Record::new(Payload::Json(value), RecordMeta::default()))
            })
            .collect()
    }
}

pub fn parse_event(text: &str) -> Result<Value, roxmltree::Error> {
    let doc = roxmltree::Document::parse(text)?;
    let mut value = element_to_value(doc.root_element());
    collapse_event_data(&mut value);
    Ok(value)
}

fn collapse_event_data(value: &mut Value) {
    let Value::Object(obj) = value else { return };
    if let Some(event_data) = obj.get_mut("EventData") {
        collapse_data_array(event_data);
    }
    if let Some(user_data) = obj.get_mut("UserData") {
        collapse_data_array(user_data);
    }
}

fn collapse_data_array(event_data: &mut Value) {
    let Value::Object(inner) = event_data else { return };
    let Some(data) = inner.remove("Data") else { return };
    let entries: Vec<Value> = match data {
        Value::Array(items) => items,
        single => vec![single],
    };
    let mut collapsed = Map::new();
    for entry in entries {
        match entry {
            Value::Object(mut fields) => {
                let name = fields.remove("@Name");
                let text = fields.remove("#text").unwrap_or(Value::Null);
                if let Some(Value::String(name)) = name {
                    collapsed.insert(name, text);
                }
            }
            Value::String(text) => {
                collapsed.insert("Data".to_string(), Value::String(text));
            }
            _ => {}
        }
    }
    inner.insert("Data".to_string(), Value::Object(collapsed));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_named_data_elements() {
        let xml = r#"<Event><System><EventID>4624</EventID></System><EventData><Data Name="SubjectUserName">alice</Data><Data Name="IpAddress">10.0.0.1</Data></EventData></Event>"#;
        let value = parse_event(xml).unwrap();
        assert_eq!(value["EventData"]["Data"]["SubjectUserName"], "alice");
        assert_eq!(value["EventData"]["Data"]["IpAddress"], "10.0.0.1");
    }
}
