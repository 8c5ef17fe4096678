use regex::Regex;
use serde_json::{Map, Value};

use crate::record::{Payload, Record, RecordMeta};

use super::multiline::split_records;
use super::FormatReader;

/// Same record boundary policy as `multiline` (a line matching `first_line`
/// starts a record), but each record's payload is parsed as XML into a
/// nested JSON value rather than kept as text — the `xmltodict`-style
/// convention: attributes under `@name`, text content under `#text`,
/// repeated child tags collected into an array.
pub struct XmlReader<'a> {
    body: &'a str,
    first_line: Regex,
}

impl<'a> XmlReader<'a> {
    pub fn new(body: &'a str, first_line: Regex) -> Self {
        Self { body, first_line }
    }

    fn records(&self) -> Vec<String> {
        split_records(self.body, &self.first_line)
    }
}

impl<'a> FormatReader for XmlReader<'a> {
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
                let value = parse_xml_document(&text).unwrap_or(Value::Null);
                Some(Record::new(Payload::Json(value), RecordMeta::default()))
            })
            .collect()
    }
}

/// Parses a whole XML document (single root element) into a nested
/// `serde_json::Value`, the way `xmltodict.parse` does in the original.
pub fn parse_xml_document(text: &str) -> Result<Value, roxmltree::Error> {
    let doc = roxmltree::Document::parse(text)?;
    Ok(element_to_value(doc.root_element()))
}

pub(crate) fn element_to_value(node: roxmltree::Node) -> Value {
    let mut obj = Map::new();
    for attr in node.attributes() {
        obj.insert(format!("@{}", attr.name()), Value::String(attr.value().to_string()));
    }

    let mut children: Vec<(String, Value)> = Vec::new();
    let mut text = String::new();
    for child in node.children() {
        if child.is_element() {
            children.push((child.tag_name().name().to_string(), element_to_value(child)));
        } else if child.is_text() {
            if let Some(t) = child.text() {
                text.push_str(t);
            }
        }
    }

    if children.is_empty() {
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            if obj.is_empty() {
                return Value::String(trimmed.to_string());
            }
            obj.insert("#text".to_string(), Value::String(trimmed.to_string()));
        }
        return Value::Object(obj);
    }

    for (name, value) in children {
        match obj.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let previous = existing.clone();
                obj.insert(name, Value::Array(vec![previous, value]));
            }
            None => {
                obj.insert(name, value);
            }
        }
    }
    Value::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_attributes_and_text() {
        let xml = r#"<Event Id="1"><Data>hello</Data></Event>"#;
        let value = parse_xml_document(xml).unwrap();
        assert_eq!(value["@Id"], "1");
        assert_eq!(value["Data"], "hello");
    }

    #[test]
    fn repeated_children_become_array() {
        let xml = r#"<Root><Item>a</Item><Item>b</Item></Root>"#;
        let value = parse_xml_document(xml).unwrap();
        assert_eq!(value["Item"], serde_json::json!(["a", "b"]));
    }
}
