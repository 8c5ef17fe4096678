//! Shard computation and dispatch (part of C4). Large objects partition
//! `[1..log_count]` into contiguous ranges of at most `max_log_count`
//! records and enqueue a continuation job per range.

use serde::{Deserialize, Serialize};

use crate::error::{self, Result};

/// One continuation job: `{bucket, key, start_number, end_number}`,
/// 1-based inclusive, matching the job envelope's `siem.start_number`/
/// `siem.end_number`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardJob {
    pub bucket: String,
    pub key: String,
    pub start_number: u64,
    pub end_number: u64,
}

/// Injected by the caller; a thin wrapper over whatever work queue client
/// is actually used (SQS in the reference deployment). Submits in batches
/// of up to 10 entries, `Id: "num_<start>"`.
pub trait WorkQueue {
    /// Returns `true` on success (HTTP 200-equivalent), `false` otherwise.
    fn send_batch(&self, entries: &[(String, String)]) -> bool;
}

/// Partitions `[1..log_count]` into contiguous half-open ranges of size
/// `max_log_count` (the last range may be short). Shard count is
/// `ceil(log_count / max_log_count)`; the union covers the whole range with
/// no overlap (Testable Property 2).
pub fn compute_shards(log_count: u64, max_log_count: u64, bucket: &str, key: &str) -> Vec<ShardJob> {
    if max_log_count == 0 {
        return Vec::new();
    }
    let mut shards = Vec::new();
    let mut start = 1u64;
    while start <= log_count {
        let end = (start + max_log_count - 1).min(log_count);
        shards.push(ShardJob {
            bucket: bucket.to_string(),
            key: key.to_string(),
            start_number: start,
            end_number: end,
        });
        start = end + 1;
    }
    shards
}

/// Submits shard jobs in batches of up to 10. Returns the number of shards
/// submitted. A batch that the queue rejects aborts with
/// `ShardDispatchFailed`; already-submitted batches are not rolled back
/// (at-least-once), matching the cancellation/timeout policy.
pub fn dispatch_shards(shards: &[ShardJob], queue: &dyn WorkQueue) -> Result<usize> {
    for batch in shards.chunks(10) {
        let entries: Vec<(String, String)> = batch
            .iter()
            .map(|shard| {
                let body = serde_json::json!({
                    "siem": {"start_number": shard.start_number, "end_number": shard.end_number},
                    "s3": {"bucket": {"name": shard.bucket}, "object": {"key": shard.key}},
                });
                (format!("num_{}", shard.start_number), body.to_string())
            })
            .collect();
        if !queue.send_batch(&entries) {
            return error::ShardDispatchFailedSnafu { status: 0u16 }.fail();
        }
    }
    Ok(shards.len())
}
