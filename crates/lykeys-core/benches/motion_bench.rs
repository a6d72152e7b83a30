//! Criterion benchmarks for the motion planners.
//!
//! The planners compute each step on demand between deadlines, so the time
//! to produce a step must be negligible next to the 10 ms step spacing.
//!
//! Run with:
//! ```bash
//! cargo bench --package lykeys-core --bench motion_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lykeys_core::timing::motion::{AbsoluteGlide, Orbit, RelativeGlide};

// ── Benchmarks: glides ───────────────────────────────────────────────────────

fn bench_relative_glide(c: &mut Criterion) {
    let mut group = c.benchmark_group("relative_glide");

    for (dx, dy) in [(100, 100), (-1920, 37)] {
        group.bench_with_input(
            BenchmarkId::new("plan_10_steps", format!("{dx},{dy}")),
            &(dx, dy),
            |b, &(dx, dy)| b.iter(|| RelativeGlide::new(black_box(dx), black_box(dy)).count()),
        );
    }

    group.finish();
}

fn bench_absolute_glide(c: &mut Criterion) {
    c.bench_function("absolute_glide_plan_20_steps", |b| {
        b.iter(|| {
            AbsoluteGlide::new(black_box((0, 0)), black_box((1919, 1079)))
                .last()
        })
    });
}

// ── Benchmarks: orbit ────────────────────────────────────────────────────────

fn bench_orbit(c: &mut Criterion) {
    let mut group = c.benchmark_group("orbit");

    // One tick is the per-16ms cost on the motion worker.
    group.bench_function("single_tick", |b| {
        let mut orbit = Orbit::new((960, 540), 10.0, 100.0);
        b.iter(|| orbit.next())
    });

    // One minute of ticks.
    group.bench_function("ticks_3750", |b| {
        b.iter(|| {
            Orbit::new(black_box((960, 540)), black_box(10.0), black_box(100.0))
                .take(3750)
                .count()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_relative_glide, bench_absolute_glide, bench_orbit);
criterion_main!(benches);
