//! The ingestion job envelope (§6 external interfaces): `{ s3: { bucket:
//! {name}, object: {key} }, siem?: { start_number, end_number } }`.

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObjectRef {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct S3Ref {
    pub bucket: BucketRef,
    pub object: ObjectRef,
}

/// 1-based inclusive continuation range from a shard-dispatched job.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ShardWindow {
    pub start_number: u64,
    pub end_number: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Job {
    pub s3: S3Ref,
    #[serde(default)]
    pub siem: Option<ShardWindow>,
}

impl Job {
    /// The object key, URL-decoded (`+` → space, then percent-escapes),
    /// ready to hand to the object-store fetch.
    pub fn decoded_key(&self) -> String {
        url_decode_key(&self.s3.object.key)
    }

    pub fn shard_window(&self) -> Option<(u64, u64)> {
        self.siem.map(|w| (w.start_number, w.end_number))
    }
}

pub fn url_decode_key(key: &str) -> String {
    let plus_replaced = key.replace('+', " ");
    percent_decode_str(&plus_replaced).decode_utf8_lossy().into_owned()
}
