use criterion::{black_box, criterion_group, criterion_main, Criterion};
use matrix::svd_r;
use nalgebra::DMatrix;

fn bench_svd_r(c: &mut Criterion) {
    let b = DMatrix::from_fn(32, 16, |i, j| ((i + 1) * (j + 2)) as f64);
    c.bench_function("svd_r 32x16 rank 4", |bencher| {
        bencher.iter(|| svd_r(black_box(&b), black_box(4)).unwrap())
    });
}

criterion_group!(benches, bench_svd_r);
criterion_main!(benches);
