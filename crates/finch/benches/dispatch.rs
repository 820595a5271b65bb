// Dispatch benchmarks for the Finch runtime
//
// Every call copies the entry out of the class table under a read lock, so
// these measure that path for root, overridden and inherited entries, plus
// the cost of a trapped abstract fault.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use finch::{Class, ClassBuilder, Imp, Object, Str, trap};

fn constant_to_i64(_obj: &Object) -> finch::Result<i64> {
    Ok(7)
}

fn bench_root_dispatch(c: &mut Criterion) {
    let obj = Class::singleton("BenchDispatchRoot", &Class::root()).make_obj();
    let other = Class::singleton("BenchDispatchRoot", &Class::root()).make_obj();

    let mut group = c.benchmark_group("root_dispatch");
    group.bench_function("equals", |b| b.iter(|| black_box(obj.equals(&other))));
    group.bench_function("hash_sum", |b| b.iter(|| black_box(obj.hash_sum())));
    group.bench_function("to_str", |b| b.iter(|| black_box(obj.to_str())));
    group.finish();
}

fn bench_override_depth(c: &mut Criterion) {
    let mut builder = ClassBuilder::new("BenchDispatchBase", &Class::root());
    builder.add_method(Imp::ToI64(constant_to_i64));
    let base = builder.register().unwrap();

    let mut group = c.benchmark_group("inherited_to_i64");
    for depth in [0usize, 4, 16] {
        let mut class = base;
        for level in 0..depth {
            class = Class::singleton(&format!("BenchDispatchDepth_{depth}_{level}"), &class);
        }
        let obj = class.make_obj();

        group.bench_with_input(BenchmarkId::from_parameter(depth), &obj, |b, obj| {
            b.iter(|| black_box(obj.to_i64()));
        });
    }
    group.finish();
}

fn bench_string_dispatch(c: &mut Criterion) {
    let a = Str::new("the quick brown fox");
    let b_str = Str::new("the quick brown fox");

    let mut group = c.benchmark_group("string_dispatch");
    group.bench_function("equals", |b| b.iter(|| black_box(a.equals(&b_str))));
    group.bench_function("hash_sum", |b| b.iter(|| black_box(a.hash_sum())));
    group.bench_function("compare_to", |b| b.iter(|| black_box(a.compare_to(&b_str))));
    group.finish();
}

fn bench_trapped_fault(c: &mut Criterion) {
    let obj = Class::singleton("BenchDispatchTrap", &Class::root()).make_obj();

    c.bench_function("trap_abstract_clone", |b| {
        b.iter(|| black_box(trap(|| obj.clone_obj().map(drop))));
    });
}

criterion_group!(
    benches,
    bench_root_dispatch,
    bench_override_depth,
    bench_string_dispatch,
    bench_trapped_fault
);
criterion_main!(benches);
