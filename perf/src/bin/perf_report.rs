use std::hint::black_box;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;

use chirp_config::ServerConfig;
use chirp_engine::Server;
use chirp_feed::Feed;
use chirp_perf::*;
use chirp_sync::{LockFreeQueue, RwLock, Semaphore};
use chirp_wire::ResponseSink;

const PLAN: Batching = Batching {
    samples: 2_000,
    calls: 256,
    warmup: 50,
};

fn main() {
    let bar = "\u{2550}".repeat(90);
    println!("\n{bar}");
    println!("  CHIRP PERFORMANCE REPORT");
    println!("  uncontended primitives + contended queue handoff + end-to-end runs");
    println!("{bar}");

    let mut results = Vec::new();

    // ═══════════════════════════════════════════════════════════════════════
    // 1. Uncontended primitives
    // ═══════════════════════════════════════════════════════════════════════
    section_header("Uncontended primitives");
    print_table_header();

    let sem = Semaphore::new(0);
    results.push(time_per_call("semaphore up+down", PLAN, || {
        sem.up();
        sem.down();
    }));

    let lock = RwLock::new(0u64);
    results.push(time_per_call("rwlock read", PLAN, || {
        black_box(*lock.read());
    }));
    results.push(time_per_call("rwlock write", PLAN, || {
        *lock.write() += 1;
    }));

    let queue = LockFreeQueue::new();
    results.push(time_per_call("queue enqueue+dequeue", PLAN, || {
        queue.enqueue(black_box(1u64));
        black_box(queue.dequeue());
    }));

    let feed = Feed::new();
    for i in 0..1_000 {
        feed.add("seed", f64::from(i));
    }
    results.push(time_per_call(
        "feed contains (1k posts)",
        Batching {
            calls: 16,
            warmup: 5,
            ..PLAN
        },
        || {
            black_box(feed.contains(black_box(500.0)));
        },
    ));

    for r in &results {
        print_result_row(r);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // 2. Cross-thread queue handoff
    // ═══════════════════════════════════════════════════════════════════════
    section_header("Cross-thread queue handoff (1 producer, 4 consumers)");
    print_table_header();
    let handoff = queue_handoff(4, 200_000);
    print_result_row(&handoff);
    results.push(handoff);

    // ═══════════════════════════════════════════════════════════════════════
    // 3. End-to-end runs
    // ═══════════════════════════════════════════════════════════════════════
    section_header("End-to-end runs (5k mixed requests)");
    let input = encode_requests(&mixed_workload(5_000));
    for (label, config) in [
        ("sequential", ServerConfig::sequential()),
        ("parallel x2", ServerConfig::parallel(2)),
        ("parallel x4", ServerConfig::parallel(4)),
        ("parallel x8", ServerConfig::parallel(8)),
    ] {
        let server = match Server::new(config) {
            Ok(server) => server,
            Err(err) => {
                println!("  {label:<14} failed: {err}");
                continue;
            }
        };
        let sink = ResponseSink::new(std::io::sink());
        let start = Instant::now();
        match server.run(&input[..], &sink) {
            Ok(report) => {
                let elapsed = start.elapsed();
                let rate = report.requests as f64 / elapsed.as_secs_f64();
                println!("  {label:<14} {elapsed:?}  {rate:>12.0} req/s  ({} responses)", report.responses);
            }
            Err(err) => println!("  {label:<14} failed: {err}"),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // 4. JSON Output
    // ═══════════════════════════════════════════════════════════════════════
    match serde_json::to_string_pretty(&results) {
        Ok(json) => {
            section_header("JSON");
            println!("{json}");
        }
        Err(err) => eprintln!("failed to serialize results: {err}"),
    }
}

/// Latency from enqueue on the producer to dequeue on some consumer.
fn queue_handoff(consumers: usize, items: usize) -> BenchResult {
    let queue = Arc::new(LockFreeQueue::<Instant>::new());
    let start = Arc::new(Barrier::new(consumers + 1));

    let handles: Vec<_> = (0..consumers)
        .map(|c| {
            let queue = Arc::clone(&queue);
            let start = Arc::clone(&start);
            let share = items / consumers + usize::from(c < items % consumers);
            thread::spawn(move || {
                let mut samples = Vec::with_capacity(share);
                start.wait();
                while samples.len() < share {
                    match queue.dequeue() {
                        Some(sent) => samples.push(sent.elapsed().as_nanos() as u64),
                        None => std::hint::spin_loop(),
                    }
                }
                samples
            })
        })
        .collect();

    start.wait();
    for _ in 0..items {
        queue.enqueue(Instant::now());
    }

    let samples = join_samples(handles);

    BenchResult {
        name: "enqueue -> dequeue".to_string(),
        unit: "ns",
        stats: Stats::from_samples(samples),
    }
}
