// Reference counting benchmarks for the Finch runtime
//
// Measures the inc/dec pair on one thread, contended inc/dec across four
// threads, and full allocate-then-release cycles.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use finch::{Class, Str};
use std::thread;

fn bench_inc_dec(c: &mut Criterion) {
    let obj = Class::singleton("BenchRefcount", &Class::root()).make_obj();

    c.bench_function("inc_dec_ref", |b| {
        b.iter(|| {
            let extra = black_box(obj.inc_ref());
            extra.dec_ref();
        });
    });
}

fn bench_contended_inc_dec(c: &mut Criterion) {
    let obj = Class::singleton("BenchRefcountShared", &Class::root()).make_obj();

    c.bench_function("contended_inc_dec_4_threads", |b| {
        b.iter(|| {
            thread::scope(|scope| {
                for _ in 0..4 {
                    scope.spawn(|| {
                        for _ in 0..1_000 {
                            drop(black_box(obj.clone()));
                        }
                    });
                }
            });
        });
    });
}

fn bench_alloc_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("alloc_release");

    let class = Class::singleton("BenchAlloc", &Class::root());
    group.bench_function("plain_object", |b| {
        b.iter(|| drop(black_box(class.make_obj())));
    });

    group.bench_function("string", |b| {
        b.iter(|| drop(black_box(Str::new("benchmark text"))));
    });

    group.finish();
}

criterion_group!(benches, bench_inc_dec, bench_contended_inc_dec, bench_alloc_release);
criterion_main!(benches);
