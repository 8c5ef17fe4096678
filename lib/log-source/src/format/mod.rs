//! One reader per file format (C2), each exposing `count()` and
//! `iterate(start, end)` over the same decoded text buffer so the two always
//! agree (Testable Property 1).

mod csv;
mod json;
mod multiline;
mod text;
mod winevtxml;
mod xml;

pub use csv::CsvReader;
pub use json::JsonReader;
pub use multiline::MultilineReader;
pub use text::TextReader;
pub use winevtxml::WinEvtXmlReader;
pub use xml::XmlReader;

use crate::record::Record;

/// Implemented by every per-format reader. `text`/`csv` windows are 0-based
/// half-open `[start, end)`; `json`/`multiline`/`xml`/`winevtxml` windows are
/// 1-based inclusive `[start, end]`, per the window-semantics rule in the
/// external interfaces section — each reader owns its own convention and
/// `LogSource` converts at the boundary.
pub trait FormatReader {
    fn count(&self) -> u64;
    fn iterate(&self, start: u64, end: u64) -> Vec<Record>;
}
