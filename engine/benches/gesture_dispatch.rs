//! Micro-benchmarks for gesture dispatch
//!
//! These benchmarks measure the per-event cost of the gesture engine:
//! - Mouse drag move handling
//! - Two-finger pinch move handling
//! - Handle resize geometry
//!
//! Run with: cargo bench --bench gesture_dispatch

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use overlay_engine::geometry::{ContainerRect, DevicePoint};
use overlay_engine::gesture::{
    DeviceClass, GestureMachine, GestureSettings, HitTarget, PointerInput, PointerKind,
    ResizeHandle, SizeBounds, resize_from_handle,
};
use overlay_engine::store::{Geometry, Position, Size};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::time::Instant;

fn container() -> ContainerRect {
    ContainerRect::new(0.0, 0.0, 1920.0, 1080.0)
}

/// Random pointer path inside the container
fn generate_path(count: usize, seed: u64) -> Vec<DevicePoint> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| DevicePoint::new(rng.random_range(0.0..1920.0), rng.random_range(0.0..1080.0)))
        .collect()
}

fn machine(settings: GestureSettings) -> GestureMachine {
    GestureMachine::new(
        "bench",
        Geometry::new(Position::new(20.0, 20.0), Size::new(20.0, 10.0)),
        settings,
    )
}

fn bench_drag_moves(c: &mut Criterion) {
    let mut group = c.benchmark_group("drag_moves");
    let rect = container();

    for count in [100, 1_000, 10_000] {
        let path = generate_path(count, 42);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("mouse", count), &path, |b, path| {
            b.iter(|| {
                let now = Instant::now();
                let mut m = machine(GestureSettings::default());
                m.handle(
                    PointerInput::Down {
                        pointer: 1,
                        kind: PointerKind::Mouse,
                        at: DevicePoint::new(480.0, 270.0),
                        target: HitTarget::Body,
                    },
                    &rect,
                    now,
                );
                for at in path {
                    black_box(m.handle(PointerInput::Move { pointer: 1, at: *at }, &rect, now));
                }
                m.handle(PointerInput::Up { pointer: 1 }, &rect, now)
            })
        });
    }

    group.finish();
}

fn bench_pinch_moves(c: &mut Criterion) {
    let mut group = c.benchmark_group("pinch_moves");
    let rect = container();
    let settings = GestureSettings::for_device(DeviceClass::Mobile);

    for count in [100, 1_000] {
        let path = generate_path(count, 7);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("touch", count), &path, |b, path| {
            b.iter(|| {
                let now = Instant::now();
                let mut m = machine(settings);
                m.select();
                for (pointer, x) in [(1, 400.0), (2, 600.0)] {
                    m.handle(
                        PointerInput::Down {
                            pointer,
                            kind: PointerKind::Touch,
                            at: DevicePoint::new(x, 300.0),
                            target: HitTarget::Body,
                        },
                        &rect,
                        now,
                    );
                }
                for at in path {
                    black_box(m.handle(PointerInput::Move { pointer: 2, at: *at }, &rect, now));
                }
                m.geometry()
            })
        });
    }

    group.finish();
}

fn bench_handle_resize(c: &mut Criterion) {
    let anchor = Geometry::new(Position::new(30.0, 30.0), Size::new(20.0, 10.0));
    let bounds = SizeBounds::DESKTOP;

    c.bench_function("resize_from_handle_all", |b| {
        b.iter(|| {
            for handle in ResizeHandle::ALL {
                black_box(resize_from_handle(
                    black_box(anchor),
                    handle,
                    black_box(7.5),
                    black_box(-3.25),
                    &bounds,
                ));
            }
        })
    });
}

criterion_group!(benches, bench_drag_moves, bench_pinch_moves, bench_handle_resize);
criterion_main!(benches);
