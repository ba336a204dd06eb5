use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndops::{view, Arg, BinaryOp, OpKind, Ops, StridedView, Variant};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn random_image(rng: &mut StdRng, size: usize) -> StridedView<'static, f32> {
    let data = (0..size * size).map(|_| rng.gen::<f32>()).collect();
    match view(data, &[size, size]) {
        Ok(v) => v,
        Err(err) => panic!("view failed: {err}"),
    }
}

fn bench_add(c: &mut Criterion) {
    let ops = Ops::new();
    let mut rng = StdRng::seed_from_u64(0);
    let mut group = c.benchmark_group("add");
    for size in [64usize, 256, 1024] {
        group.throughput(Throughput::Elements((size * size) as u64));
        let a = random_image(&mut rng, size);
        let b = random_image(&mut rng, size);
        let dst = StridedView::<f32>::zeros(&[size, size]);
        let bt = match b.transpose(&[1, 0]) {
            Ok(t) => t,
            Err(err) => panic!("transpose failed: {err}"),
        };

        group.bench_with_input(BenchmarkId::new("contiguous", size), &size, |bench, _| {
            bench.iter(|| ops.binary(BinaryOp::Add, &dst, &a, &b))
        });
        group.bench_with_input(BenchmarkId::new("transposed", size), &size, |bench, _| {
            bench.iter(|| ops.binary(BinaryOp::Add, &dst, &a, &bt))
        });

        let add = match ops.get(OpKind::Binary(BinaryOp::Add), Variant::Plain) {
            Ok(op) => op,
            Err(err) => panic!("missing operator: {err}"),
        };
        let args = [Arg::from(&dst), Arg::from(&a), Arg::from(&b)];
        let baked = match add.bake(&args) {
            Ok(baked) => baked,
            Err(err) => panic!("bake failed: {err}"),
        };
        group.bench_with_input(BenchmarkId::new("baked", size), &size, |bench, _| {
            bench.iter(|| baked.call(black_box(&args)))
        });
    }
    group.finish();
}

fn bench_reductions(c: &mut Criterion) {
    let ops = Ops::new();
    let mut rng = StdRng::seed_from_u64(1);
    let mut group = c.benchmark_group("reduce");
    for size in [256usize, 1024] {
        group.throughput(Throughput::Elements((size * size) as u64));
        let a = random_image(&mut rng, size);
        group.bench_with_input(BenchmarkId::new("sum", size), &size, |bench, _| {
            bench.iter(|| ops.sum(&a))
        });
        group.bench_with_input(BenchmarkId::new("median", size), &size, |bench, _| {
            bench.iter(|| ops.median(&a))
        });
        group.bench_with_input(BenchmarkId::new("histogram", size), &size, |bench, _| {
            bench.iter(|| ops.histogram(&a, 0.01, 0.0, 1.0))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_add, bench_reductions);
criterion_main!(benches);
