use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use chirp_config::ServerConfig;
use chirp_engine::Server;
use chirp_perf::{encode_requests, mixed_workload};
use chirp_wire::ResponseSink;

const REQUESTS: usize = 1_000;

fn bench_pipeline(c: &mut Criterion) {
    let input = encode_requests(&mixed_workload(REQUESTS));

    let mut group = c.benchmark_group("pipeline");
    group.throughput(Throughput::Elements(REQUESTS as u64));

    for (label, config) in [
        ("sequential", ServerConfig::sequential()),
        ("parallel x4", ServerConfig::parallel(4)),
    ] {
        group.bench_function(label, |b| {
            b.iter(|| {
                let server = Server::new(config.clone()).expect("valid config");
                let sink = ResponseSink::new(std::io::sink());
                server.run(&input[..], &sink).expect("run failed")
            });
        });
    }
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
