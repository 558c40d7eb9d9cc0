use core::hint::black_box;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use pfn_collector::collector::{
    config::{CollectorConfig, GenerationConfig, OutputSelectors},
    dispatch::{processor::process_unit, request::Unit},
    service::Collector,
    writer::output::MemorySink,
};
use std::time::Instant;
use tokio::runtime::Builder;

// Indices per benchmark iteration
const TOTAL_INDICES: u64 = 1_000;

fn lottery_profile() -> GenerationConfig {
    GenerationConfig {
        outputs: OutputSelectors::all(),
        ..GenerationConfig::default()
    }
}

/// Benchmarks unit computation alone, on the calling thread.
fn bench_process_unit(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_unit");
    group.throughput(Throughput::Elements(TOTAL_INDICES));

    for high_precision in [false, true] {
        let config = GenerationConfig {
            high_precision,
            ..lottery_profile()
        };
        group.bench_function(
            format!("elems/{TOTAL_INDICES}/high_precision/{high_precision}"),
            |b| {
                b.iter(|| {
                    let result = process_unit(Unit::new(0, TOTAL_INDICES - 1), &config).unwrap();
                    black_box(result);
                });
            },
        );
    }

    group.finish();
}

/// Benchmarks a whole run into memory with varying worker counts.
fn bench_collector(c: &mut Criterion) {
    let mut group = c.benchmark_group("collector");
    group.sample_size(10);
    group.sampling_mode(criterion::SamplingMode::Flat);

    for num_workers in [1, 2, 4, 8] {
        group.throughput(Throughput::Elements(TOTAL_INDICES));
        group.bench_function(
            format!("elems/{TOTAL_INDICES}/workers/{num_workers}"),
            |b| {
                let rt = Builder::new_multi_thread().enable_all().build().unwrap();

                b.to_async(&rt).iter_custom(move |iters| async move {
                    let start = Instant::now();

                    for _ in 0..iters {
                        let mut config = CollectorConfig::new(TOTAL_INDICES, 50, lottery_profile());
                        config.num_workers = num_workers;
                        let report = Collector::new(config)
                            .run_with_sink(MemorySink::new())
                            .await
                            .unwrap();
                        assert!(report.is_success());
                        black_box(report);
                    }

                    start.elapsed()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_process_unit, bench_collector);
criterion_main!(benches);
