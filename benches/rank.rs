use std::env;
use std::time::Instant;

use bbhash::{RankedBitVector, RankedBitVectorAccess};

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::prelude::SliceRandom;
use rand::random;

pub fn benchmark(c: &mut Criterion) {
    let n: u64 = env::var("N").unwrap_or("1000000".to_string()).parse().unwrap();
    let query_n: usize = env::var("QN").unwrap_or("1000000".to_string()).parse().unwrap();

    let t0 = Instant::now();
    let mut bits = RankedBitVector::new(n);
    for _ in 0..n / 2 {
        bits.set(random::<u64>() % n);
    }
    let ones = bits.build_ranks(0);
    let mut positions: Vec<u64> = (0..=n).collect();
    positions.shuffle(&mut rand::thread_rng());
    println!("bit vector construction took: {:?}, {} bits set", t0.elapsed(), ones);

    let mut group = c.benchmark_group("ranked_bit_vector");
    group.throughput(Throughput::Elements(query_n as u64));
    group.bench_function("rank", |b| {
        b.iter(|| {
            for &pos in positions.iter().take(query_n) {
                black_box(bits.rank(black_box(pos)));
            }
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
