use chirp_wire::{Command, Request};
use std::thread::JoinHandle;
use std::time::Instant;

// ─── Statistics ─────────────────────────────────────────────────────────────

/// Latency summary of one benchmark. Every field but `count` is in the
/// benchmark's unit; an empty sample set summarises to all zeros.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Stats {
    pub count: usize,
    pub min: u64,
    pub p50: u64,
    pub p90: u64,
    pub p99: u64,
    pub p999: u64,
    pub max: u64,
}

impl Stats {
    pub fn from_samples(mut samples: Vec<u64>) -> Self {
        samples.sort_unstable();
        let (Some(&min), Some(&max)) = (samples.first(), samples.last()) else {
            return Self::default();
        };
        let last = samples.len() - 1;
        let at = |quantile: f64| samples[(last as f64 * quantile).round() as usize];
        Self {
            count: samples.len(),
            min,
            p50: at(0.50),
            p90: at(0.90),
            p99: at(0.99),
            p999: at(0.999),
            max,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct BenchResult {
    pub name: String,
    pub unit: &'static str,
    pub stats: Stats,
}

// ─── Measurement Harness ────────────────────────────────────────────────────

/// How many calls make up one timed sample, how many samples to take, and
/// how many untimed batches to run first.
#[derive(Debug, Clone, Copy)]
pub struct Batching {
    pub samples: usize,
    pub calls: usize,
    pub warmup: usize,
}

/// Times `op` in batches of `plan.calls`; each sample is one batch's mean
/// nanoseconds per call, floored at 1.
pub fn time_per_call(name: &str, plan: Batching, mut op: impl FnMut()) -> BenchResult {
    let calls = plan.calls.max(1);
    (0..plan.warmup * calls).for_each(|_| op());

    let samples = (0..plan.samples)
        .map(|_| {
            let start = Instant::now();
            (0..calls).for_each(|_| op());
            let per_call = start.elapsed().as_nanos() / calls as u128;
            u64::try_from(per_call).unwrap_or(u64::MAX).max(1)
        })
        .collect();

    BenchResult {
        name: name.to_string(),
        unit: "ns/op",
        stats: Stats::from_samples(samples),
    }
}

/// Joins every sampling thread and concatenates their samples. A panic in
/// any thread is re-raised here.
pub fn join_samples(handles: Vec<JoinHandle<Vec<u64>>>) -> Vec<u64> {
    handles
        .into_iter()
        .flat_map(|handle| match handle.join() {
            Ok(samples) => samples,
            Err(panic) => std::panic::resume_unwind(panic),
        })
        .collect()
}

// ─── Workloads ──────────────────────────────────────────────────────────────

/// `n` requests cycling ADD, ADD, CONTAINS, REMOVE, FEED over distinct
/// timestamps, terminated by DONE.
pub fn mixed_workload(n: usize) -> Vec<Request> {
    let mut requests = Vec::with_capacity(n + 1);
    for i in 0..n {
        let id = i as i64;
        let ts = i as f64;
        let request = match i % 5 {
            0 | 1 => Request::new(Command::Add, id)
                .with_body(format!("post {i}"))
                .with_timestamp(ts),
            2 => Request::new(Command::Contains, id).with_timestamp(ts - 2.0),
            3 => Request::new(Command::Remove, id).with_timestamp(ts - 3.0),
            _ => Request::new(Command::Feed, id),
        };
        requests.push(request);
    }
    requests.push(Request::new(Command::Done, n as i64));
    requests
}

/// Newline-delimited JSON encoding of `requests`.
pub fn encode_requests(requests: &[Request]) -> Vec<u8> {
    let mut out = Vec::new();
    for request in requests {
        if serde_json::to_writer(&mut out, request).is_ok() {
            out.push(b'\n');
        }
    }
    out
}

// ─── Printing ───────────────────────────────────────────────────────────────

pub fn print_table_header() {
    println!(
        "  {:<34} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}  unit",
        "Benchmark", "min", "p50", "p90", "p99", "p99.9", "max",
    );
    println!("  {}", "─".repeat(96));
}

pub fn print_result_row(r: &BenchResult) {
    println!(
        "  {:<34} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}  {}",
        r.name, r.stats.min, r.stats.p50, r.stats.p90, r.stats.p99, r.stats.p999, r.stats.max, r.unit,
    );
}

pub fn section_header(title: &str) {
    println!("\n{}", "─".repeat(90));
    println!("  {title}");
    println!("{}", "─".repeat(90));
}
