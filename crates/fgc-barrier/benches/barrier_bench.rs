//! Barrier Fast-Path Benchmarks
//!
//! Measures the per-call cost of the entries generated code hits most.
//! Run with: `cargo bench --package fgc-barrier`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use fgc_barrier::object::HEADER_WORDS;
use fgc_barrier::util::Alignment;
use fgc_barrier::{BarrierConfig, BarrierRuntime, ObjectReference};

fn create_runtime(compressed_refs: bool) -> BarrierRuntime {
    fgc_barrier::init_with_config(BarrierConfig {
        heap_size: 16 * 1024 * 1024,
        region_size: 256 * 1024,
        compressed_refs,
        ..Default::default()
    })
    .unwrap()
}

fn leaf(runtime: &BarrierRuntime) -> ObjectReference {
    runtime.heap().allocate(HEADER_WORDS + 1, 0).unwrap()
}

fn array(runtime: &BarrierRuntime, len: usize) -> ObjectReference {
    let heap = runtime.heap();
    let words = HEADER_WORDS + Alignment::bytes_to_words(len * heap.slot_width().bytes());
    let array = heap.allocate(words.max(HEADER_WORDS + 1), len).unwrap();
    let value = leaf(runtime);
    for i in 0..len {
        heap.store_ref(heap.ref_slot(array, i), Some(value));
    }
    array
}

fn bench_field_pre(c: &mut Criterion) {
    let mut group = c.benchmark_group("field_pre");
    let runtime = create_runtime(true);
    let mut thread = runtime.attach_thread().unwrap();
    let obj = leaf(&runtime);

    group.bench_function("inactive", |b| {
        b.iter(|| runtime.write_ref_field_pre(black_box(obj), &mut thread))
    });

    runtime.barrier_set().start_marking();
    let queue_set = runtime.barrier_set().satb_queue_set();
    group.bench_function("marking", |b| {
        b.iter(|| {
            runtime.write_ref_field_pre(black_box(obj), &mut thread);
            if queue_set.completed_buffers_num() > 64 {
                while queue_set.apply_closure_to_completed_buffer(|obj| {
                    black_box(obj);
                }) {}
            }
        })
    });
    runtime.barrier_set().finish_marking();
    group.finish();
}

fn bench_write_barrier(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_barrier");
    let runtime = create_runtime(true);
    let plain = leaf(&runtime);
    let from = leaf(&runtime);
    let to = leaf(&runtime);
    runtime.heap().header(from).try_install_forwarding(to).unwrap();

    group.bench_function("idle", |b| {
        b.iter(|| runtime.write_barrier_jrt(black_box(Some(plain))))
    });

    runtime
        .barrier_set()
        .set_gc_state(fgc_barrier::GcStateFlags::HAS_FORWARDED, true);
    group.bench_function("not_forwarded", |b| {
        b.iter(|| runtime.write_barrier_jrt(black_box(Some(plain))))
    });
    group.bench_function("forwarded", |b| {
        b.iter(|| runtime.write_barrier_irt(black_box(Some(from))))
    });
    group.finish();
}

fn bench_array_pre(c: &mut Criterion) {
    let mut group = c.benchmark_group("array_pre");

    for (name, compressed) in [("oop", false), ("narrow_oop", true)] {
        let runtime = create_runtime(compressed);
        let mut thread = runtime.attach_thread().unwrap();
        let array = array(&runtime, 128);
        let dst = runtime.heap().ref_slots(array).0;

        group.throughput(Throughput::Elements(128));
        group.bench_function(format!("{}_inactive", name), |b| {
            b.iter(|| {
                if compressed {
                    runtime.write_ref_array_pre_narrow_oop(&mut thread, dst as *const u32, 128)
                } else {
                    runtime.write_ref_array_pre_oop(&mut thread, dst as *const usize, 128)
                }
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_field_pre, bench_write_barrier, bench_array_pre);
criterion_main!(benches);
