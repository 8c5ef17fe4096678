use snafu::Snafu;

/// Errors surfaced while decoding, counting, or iterating a log object.
///
/// Mirrors the error kinds named in the component design: object-level
/// detection failures abort the whole object, per-record parse failures
/// are handled closer to the call site (see `envelope` and `format`).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("first 16 bytes of object did not match a known container encoding"))]
    UnknownFormat,

    #[snafu(display("failed to parse {format} record: {source}"))]
    RecordParse {
        format: &'static str,
        source: serde_json::Error,
    },

    #[snafu(display("failed to parse XML record: {source}"))]
    XmlParse { source: roxmltree::Error },

    #[snafu(display("work queue rejected shard batch with status {status}"))]
    ShardDispatchFailed { status: u16 },

    #[snafu(display("zip archive in object contained no entries"))]
    EmptyZipArchive,

    #[snafu(display("io error while decoding object: {source}"))]
    Io { source: std::io::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
