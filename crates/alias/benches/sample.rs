use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

use alias::AliasTable;

fn bench_sample(c: &mut Criterion) {
    let weights: Vec<f64> = (1..=64).map(|w| w as f64).collect();
    let table = AliasTable::new(&weights).unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    c.bench_function("alias sample 64 outcomes", |bencher| {
        bencher.iter(|| black_box(table.sample(&mut rng)))
    });
}

criterion_group!(benches, bench_sample);
criterion_main!(benches);
