//! CLI entry point: reads a job envelope and a `LogConfig` ruleset from
//! disk, fetches the object body from a local path (the object-store fetch
//! itself is the caller's concern per §1; this binary is a thin harness for
//! running the core against a file on disk), and prints one normalized
//! document per line.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use log_source::shard::WorkQueue;
use siem_normalizer::{job::Job, GeoIpResult, MaxMindGeoIp, NoopTransform, ProcessOutcome};
use tracing::error;

struct StderrQueue;

impl WorkQueue for StderrQueue {
    fn send_batch(&self, entries: &[(String, String)]) -> bool {
        for (id, body) in entries {
            eprintln!("shard dispatch {id}: {body}");
        }
        true
    }
}

struct NoGeoIp;

impl siem_normalizer::GeoIpLookup for NoGeoIp {
    fn lookup(&self, _ip: std::net::IpAddr) -> GeoIpResult {
        GeoIpResult::default()
    }
}

fn usage() -> &'static str {
    "usage: siem-normalizer <job.json> <log-config.json|yaml> <object-body-path> [geoip-city.mmdb] [geoip-asn.mmdb]"
}

fn run() -> siem_normalizer::Result<()> {
    let mut args = std::env::args().skip(1);
    let (job_path, config_path, body_path) = match (args.next(), args.next(), args.next()) {
        (Some(j), Some(c), Some(b)) => (j, c, b),
        _ => {
            eprintln!("{}", usage());
            std::process::exit(2);
        }
    };
    let city_db = args.next();
    let asn_db = args.next();

    let job_text = fs::read_to_string(&job_path).unwrap_or_else(|e| panic!("reading {job_path}: {e}"));
    let job: Job = serde_json::from_str(&job_text).unwrap_or_else(|e| panic!("parsing job {job_path}: {e}"));

    let config_text = fs::read_to_string(&config_path).unwrap_or_else(|e| panic!("reading {config_path}: {e}"));
    let config: log_source::config::LogConfig = if config_path.ends_with(".yaml") || config_path.ends_with(".yml") {
        serde_yaml::from_str(&config_text).unwrap_or_else(|e| panic!("parsing config {config_path}: {e}"))
    } else {
        serde_json::from_str(&config_text).unwrap_or_else(|e| panic!("parsing config {config_path}: {e}"))
    };

    let body = fs::read(PathBuf::from(&body_path)).unwrap_or_else(|e| panic!("reading {body_path}: {e}"));
    let key = job.decoded_key();
    let bucket = job.s3.bucket.name.clone();

    let geoip: Box<dyn siem_normalizer::GeoIpLookup> = match (city_db.as_deref(), asn_db.as_deref()) {
        (None, None) => Box::new(NoGeoIp),
        (city, asn) => Box::new(MaxMindGeoIp::open(city, asn).unwrap_or_else(|e| panic!("opening geoip database: {e}"))),
    };
    let transform = NoopTransform;
    let queue = StderrQueue;

    let outcome = siem_normalizer::process_object(
        &bucket,
        &key,
        "cli",
        config,
        &body,
        body.len() as u64,
        job.shard_window(),
        None,
        geoip.as_ref(),
        &transform,
        &queue,
    )?;

    match outcome {
        ProcessOutcome::Sharded { shard_count } => {
            println!("object split into {shard_count} shards");
        }
        ProcessOutcome::Ignored { reason } => {
            println!("object ignored: {reason}");
        }
        ProcessOutcome::Documents(documents) => {
            for document in documents {
                println!("{}", document.json);
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "normalization failed");
            ExitCode::FAILURE
        }
    }
}
