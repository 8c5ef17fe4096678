//! Format-aware decoding, sharding and envelope-stripping for cloud log
//! objects (C1–C4 of the normalization pipeline). [`LogSource`] is the one
//! public entry point: constructed once per object, it classifies and
//! decodes the body, selects the right [`format::FormatReader`] strategy
//! (plain per-format, or the CloudWatch Logs / FireLens envelope
//! strategies), counts records, and produces either the record stream or a
//! set of shard jobs for a work queue when the object is too large for one
//! invocation.
//!
//! The per-record normalization into an ECS-shaped document (C5–C9) is a
//! separate concern, consumed by the `siem-normalizer` crate that wraps
//! this one.

pub mod config;
pub mod decoder;
pub mod envelope;
pub mod error;
pub mod format;
pub mod record;
pub mod shard;

use config::{FileFormat, LogConfig};
use envelope::{CwlReader, FireLensReader};
use error::Result;
use format::{CsvReader, FormatReader, JsonReader, MultilineReader, TextReader, WinEvtXmlReader, XmlReader};
use record::Record;
pub use shard::{ShardJob, WorkQueue};

/// Snapshot returned by [`LogSource::inspect`]: everything a caller needs to
/// decide whether to proceed, log, or skip an object, without materializing
/// any records.
#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    pub is_ignored: bool,
    pub ignored_reason: Option<String>,
    pub log_count: u64,
    pub format: FileFormat,
    pub csv_header: Option<String>,
}

/// One reader strategy selected at construction time. `via_cwl` and
/// `via_firelens` bypass `file_format`-based selection entirely (matching
/// the original's `if self.via_cwl: ... elif self.via_firelens: ...`
/// precedence); otherwise the reader is chosen by `file_format`.
enum Reader<'a> {
    Cwl(CwlReader),
    FireLens(FireLensReader<'a>),
    Text(TextReader<'a>),
    Csv(CsvReader<'a>),
    Json(JsonReader),
    Multiline(MultilineReader<'a>),
    Xml(XmlReader<'a>),
    WinEvtXml(WinEvtXmlReader<'a>),
}

impl<'a> Reader<'a> {
    fn count(&self) -> u64 {
        match self {
            Reader::Cwl(r) => r.count(),
            Reader::FireLens(r) => r.count(),
            Reader::Text(r) => r.count(),
            Reader::Csv(r) => r.count(),
            Reader::Json(r) => r.count(),
            Reader::Multiline(r) => r.count(),
            Reader::Xml(r) => r.count(),
            Reader::WinEvtXml(r) => r.count(),
        }
    }

    fn iterate(&self, start: u64, end: u64) -> Vec<Record> {
        match self {
            Reader::Cwl(r) => r.iterate(start, end),
            Reader::FireLens(r) => r.iterate(start, end),
            Reader::Text(r) => r.iterate(start, end),
            Reader::Csv(r) => r.iterate(start, end),
            Reader::Json(r) => r.iterate(start, end),
            Reader::Multiline(r) => r.iterate(start, end),
            Reader::Xml(r) => r.iterate(start, end),
            Reader::WinEvtXml(r) => r.iterate(start, end),
        }
    }

    /// `text`/`csv`/`via_cwl`/`via_firelens` windows are 0-based
    /// half-open; the rest are 1-based inclusive. `LogSource` converts at
    /// the boundary per the window-semantics rule.
    fn zero_based_half_open(&self) -> bool {
        matches!(
            self,
            Reader::Cwl(_) | Reader::FireLens(_) | Reader::Text(_) | Reader::Csv(_)
        )
    }

    fn csv_header(&self) -> Option<String> {
        match self {
            Reader::Csv(r) => Some(r.header_line().to_string()),
            _ => None,
        }
    }
}

/// One object's worth of state: decoded body, ignore status, and the
/// log-type-specific config that drives reader selection and (later)
/// normalization. Lives one per object, exactly as the data model's
/// lifecycle note requires.
pub struct LogSource {
    pub bucket: String,
    pub key: String,
    pub logtype: String,
    config: LogConfig,
    body: Option<String>,
    is_ignored: bool,
    ignored_reason: Option<String>,
    log_count: u64,
}

impl LogSource {
    /// Classifies and decodes `object_bytes`, then counts records eagerly
    /// (cheap relative to per-record normalization, and needed by both
    /// `inspect()` and `shard()` up front, matching the original's
    /// `cached_property log_count`).
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        logtype: impl Into<String>,
        config: LogConfig,
        object_bytes: &[u8],
        advertised_size: u64,
    ) -> Result<Self> {
        let bucket = bucket.into();
        let key = key.into();
        let logtype = logtype.into();

        if let Some(reason) = ignore_reason_for_key(&key, &logtype, &config) {
            return Ok(Self {
                bucket,
                key,
                logtype,
                config,
                body: None,
                is_ignored: true,
                ignored_reason: Some(reason),
                log_count: 0,
            });
        }

        let body = match decoder::decode_object(object_bytes, advertised_size)? {
            Some(body) => body,
            None => {
                return Ok(Self {
                    bucket,
                    key,
                    logtype,
                    config,
                    body: None,
                    is_ignored: true,
                    ignored_reason: Some("no valid contents".to_string()),
                    log_count: 0,
                });
            }
        };

        let mut source = Self {
            bucket,
            key,
            logtype,
            config,
            body: Some(body),
            is_ignored: false,
            ignored_reason: None,
            log_count: 0,
        };
        source.log_count = source.build_reader().map(|r| r.count()).unwrap_or(0);
        if source.log_count == 0 {
            source.is_ignored = true;
            source.ignored_reason = Some("there are not any valid logs in S3 object".to_string());
        }
        Ok(source)
    }

    fn build_reader(&self) -> Option<Reader<'_>> {
        let body = self.body.as_deref()?;
        if self.config.via_cwl {
            return Some(Reader::Cwl(CwlReader::new(body, self.config.file_format)));
        }
        if self.config.via_firelens {
            return Some(Reader::FireLens(FireLensReader::new(
                body,
                self.config.file_format,
                self.config.ignore_container_stderr,
            )));
        }
        Some(match self.config.file_format {
            FileFormat::Text => Reader::Text(TextReader::new(body)),
            FileFormat::Csv => Reader::Csv(CsvReader::new(body)),
            FileFormat::Json => Reader::Json(JsonReader::new(body, self.config.json_delimiter.clone())),
            FileFormat::Multiline => Reader::Multiline(MultilineReader::new(
                body,
                self.config.multiline_firstline.as_ref()?.0.clone(),
            )),
            FileFormat::Xml => Reader::Xml(XmlReader::new(body, self.config.multiline_firstline.as_ref()?.0.clone())),
            FileFormat::Winevtxml => {
                Reader::WinEvtXml(WinEvtXmlReader::new(body, self.config.multiline_firstline.as_ref()?.0.clone()))
            }
        })
    }

    pub fn inspect(&self) -> Inspection {
        Inspection {
            is_ignored: self.is_ignored,
            ignored_reason: self.ignored_reason.clone(),
            log_count: self.log_count,
            format: self.config.file_format,
            csv_header: self.build_reader().and_then(|r| r.csv_header()),
        }
    }

    pub fn log_count(&self) -> u64 {
        self.log_count
    }

    pub fn is_ignored(&self) -> bool {
        self.is_ignored
    }

    pub fn ignored_reason(&self) -> Option<&str> {
        self.ignored_reason.as_deref()
    }

    /// Partitions and dispatches shard jobs when `log_count` exceeds
    /// `max_log_count`. On success the source becomes ignored (its own
    /// invocation stops yielding records) with the documented reason.
    /// Returns `None` when no sharding was needed.
    pub fn shard(&mut self, queue: &dyn WorkQueue) -> Result<Option<Vec<ShardJob>>> {
        if self.is_ignored || self.log_count <= self.config.max_log_count {
            return Ok(None);
        }
        let shards = shard::compute_shards(self.log_count, self.config.max_log_count, &self.bucket, &self.key);
        let sent = shard::dispatch_shards(&shards, queue)?;
        self.is_ignored = true;
        self.ignored_reason = Some(format!("Log file was split into {sent} pieces and sent to SQS."));
        Ok(Some(shards))
    }

    /// Yields records for the selected window. `shard_window` is
    /// `Some((start_number, end_number))`, 1-based inclusive, when the job
    /// carries a `siem.start_number`/`siem.end_number` continuation range;
    /// `None` means "from the first logical record", per the external
    /// interfaces rule.
    pub fn records(&self, shard_window: Option<(u64, u64)>) -> Vec<Record> {
        if self.is_ignored {
            return Vec::new();
        }
        let Some(reader) = self.build_reader() else {
            return Vec::new();
        };
        let (start0, end0) = match shard_window {
            Some((start_number, end_number)) => (start_number - 1, end_number),
            None => {
                let header = self.config.header_line_count();
                (header, self.log_count.min(self.config.max_log_count))
            }
        };
        if reader.zero_based_half_open() {
            reader.iterate(start0, end0)
        } else {
            // 0-based half-open [start0, end0) == 1-based inclusive [start0+1, end0].
            reader.iterate(start0 + 1, end0)
        }
    }
}

/// Object-level ignore rules that can be decided before any bytes are
/// fetched or decoded: trailing-slash keys, unrecognized log types, and
/// `s3_key_ignored` matches.
fn ignore_reason_for_key(key: &str, logtype: &str, config: &LogConfig) -> Option<String> {
    if key.ends_with('/') {
        return Some(format!("this s3 key is just path, {key}"));
    }
    if logtype.contains("unknown") {
        return Some(format!("unknown log type in S3 key, {key}"));
    }
    if let Some(re) = &config.s3_key_ignored {
        if re.0.is_match(key) {
            return Some(format!("\"s3_key_ignored\" {re} matched with {key}"));
        }
    }
    None
}
