//! Crate-facing error enum. Mirrors `log_source::error::Error`'s shape:
//! named variants, one `#[snafu(display(...))]` each, `#[snafu(source)]`
//! where a lower error is wrapped.

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("log source error: {source}"))]
    LogSource { source: log_source::error::Error },

    #[snafu(display("could not parse timestamp {raw:?} at key {key} with format {format:?}"))]
    BadTimestamp {
        key: String,
        raw: String,
        format: Option<String>,
    },

    #[snafu(display("{reason}"))]
    ParseError { reason: String },

    #[snafu(display("work queue rejected shard batch"))]
    ShardDispatchFailed { source: log_source::error::Error },

    #[snafu(display("failed to serialize normalized document: {source}"))]
    Serialize { source: serde_json::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
