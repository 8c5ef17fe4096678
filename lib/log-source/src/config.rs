//! `LogConfig`: the immutable per-log-type bundle both `LogSource` and the
//! normalizer consume. Deserialized from the ruleset the caller loads
//! (JSON or YAML); regex fields go through [`RegexField`] since `regex::Regex`
//! has no native serde support.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// A `Regex` that deserializes from its pattern string, the way `LogConfig`'s
/// compiled-regex fields (`multiline_firstline`, `s3_key_ignored`,
/// `log_pattern`) are authored in the ruleset.
#[derive(Debug, Clone)]
pub struct RegexField(pub Regex);

impl<'de> Deserialize<'de> for RegexField {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let pattern = String::deserialize(deserializer)?;
        Regex::new(&pattern)
            .map(RegexField)
            .map_err(de::Error::custom)
    }
}

impl Serialize for RegexField {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.0.as_str())
    }
}

impl PartialEq for RegexField {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_str() == other.0.as_str()
    }
}

impl fmt::Display for RegexField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Text,
    Csv,
    Json,
    Multiline,
    Xml,
    Winevtxml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexRotation {
    Auto,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Default for IndexRotation {
    fn default() -> Self {
        IndexRotation::Auto
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexTime {
    EventIngested,
    Event,
}

impl Default for IndexTime {
    fn default() -> Self {
        IndexTime::EventIngested
    }
}

/// The source-field specification for one target ECS key: either a
/// whitespace-joined alternatives string (first non-empty wins) or a list of
/// dotted paths (sorted unique set of all non-empty values).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum EcsSourceSpec {
    Alternatives(String),
    List(Vec<String>),
}

fn default_max_log_count() -> u64 {
    20_000
}

fn default_ecs_version() -> String {
    "8.11.0".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    pub file_format: FileFormat,
    #[serde(default)]
    pub via_cwl: bool,
    #[serde(default)]
    pub via_firelens: bool,
    #[serde(default)]
    pub multiline_firstline: Option<RegexField>,
    #[serde(default)]
    pub text_header_line_number: u64,
    #[serde(default)]
    pub s3_key_ignored: Option<RegexField>,
    #[serde(default)]
    pub json_delimiter: Option<String>,
    #[serde(default)]
    pub ignore_container_stderr: bool,

    #[serde(default)]
    pub timestamp_key: Option<String>,
    #[serde(default)]
    pub timestamp_format: Option<String>,
    #[serde(default)]
    pub timestamp_tz: f64,
    #[serde(default)]
    pub timestamp_nano: bool,

    #[serde(default)]
    pub index_tz: Option<f64>,
    #[serde(default)]
    pub index_rotation: IndexRotation,
    #[serde(default)]
    pub index_time: IndexTime,
    pub index_name: String,

    #[serde(default)]
    pub ecs: String,
    #[serde(default)]
    pub ecs_fields: HashMap<String, EcsSourceSpec>,
    #[serde(default)]
    pub static_ecs: String,
    #[serde(default)]
    pub static_ecs_fields: HashMap<String, String>,

    #[serde(default)]
    pub cloud_provider: Option<String>,
    #[serde(default = "default_ecs_version")]
    pub ecs_version: String,

    #[serde(default)]
    pub doc_id: Option<String>,
    #[serde(default)]
    pub doc_id_suffix: Option<String>,

    #[serde(default)]
    pub json_to_text: String,
    #[serde(default)]
    pub geoip: String,
    #[serde(default)]
    pub script_ecs: bool,

    #[serde(default)]
    pub log_pattern: Option<RegexField>,

    #[serde(default = "default_max_log_count")]
    pub max_log_count: u64,
}

impl LogConfig {
    /// `H` in the window-semantics rule: leading lines/records never yielded.
    pub fn header_line_count(&self) -> u64 {
        if self.via_cwl {
            return 0;
        }
        match self.file_format {
            FileFormat::Text => self.text_header_line_number,
            FileFormat::Csv => 1,
            _ => 0,
        }
    }
}
