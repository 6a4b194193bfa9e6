use criterion::{black_box, BatchSize, BenchmarkId, Criterion};
use criterion::{criterion_group, criterion_main};
use rust_decimal::Decimal;

use depthsync::{DiffEvent, MemoryHistory, PriceLevel, ReconciliationEngine, Snapshot, StopCondition};

const DIFFS_PER_ITER: u64 = 10_000;

fn snapshot(depth: u32) -> Snapshot {
    let level = |offset: i64, size: i64| PriceLevel::new(Decimal::new(offset, 2), Decimal::new(size, 3));
    Snapshot {
        last_update_id: 1,
        event_time_ms: 0,
        bids: (0..depth as i64).map(|i| level(10_000 - i, 1_000 + i)).collect(),
        asks: (0..depth as i64).map(|i| level(10_001 + i, 1_000 + i)).collect(),
    }
}

fn diffs(depth: u32) -> Vec<DiffEvent> {
    (0..DIFFS_PER_ITER)
        .map(|i| {
            let id = i + 2;
            let tick = (i % depth as u64) as i64;
            let size = if i % 7 == 0 { 0 } else { 500 + tick };
            DiffEvent::new(id, id, id)
                .with_bids([PriceLevel::new(Decimal::new(10_000 - tick, 2), Decimal::new(size, 3))])
                .with_asks([PriceLevel::new(Decimal::new(10_001 + tick, 2), Decimal::new(size, 3))])
        })
        .collect()
}

fn bench_apply_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_diff");
    for &depth in &[20_u32, 100, 1000] {
        let events = diffs(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter_batched(
                || {
                    let mut engine =
                        ReconciliationEngine::new(MemoryHistory::new(), StopCondition::never())
                            .with_progress_interval(0);
                    engine.apply_snapshot(&snapshot(depth)).expect("snapshot");
                    engine
                },
                |mut engine| {
                    for event in &events {
                        engine.apply_diff(black_box(event)).expect("apply");
                    }
                    engine
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_apply_diff);
criterion_main!(benches);
