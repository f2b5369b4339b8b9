//! Benchmark for the pricing hot paths
//!
//! Swap pricing, weight solving and a full swap-with-reweight on the
//! reference pool

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use longshort_amm::{Balances, PoolState, Token, WeightSolver, WeightedMath};

fn bench_out_given_in(c: &mut Criterion) {
    c.bench_function("out_given_in", |b| {
        b.iter(|| {
            WeightedMath::out_given_in(
                black_box(1000.0),
                black_box(1.0 / 22.0),
                black_box(10000.0),
                black_box(10.0 / 11.0),
                black_box(100.0),
                black_box(0.003),
            )
        })
    });
}

fn bench_weight_solver(c: &mut Criterion) {
    let balances = Balances::new(10000.0, 1000.0, 1000.0);

    c.bench_function("weight_solver", |b| {
        b.iter(|| WeightSolver::solve(black_box(&balances), black_box(0.5), black_box(100.0)))
    });
}

fn bench_pool_swap(c: &mut Criterion) {
    let pool = PoolState::new(Balances::new(10000.0, 1000.0, 1000.0), 0.5, 100.0)
        .expect("reference pool");
    let mut group = c.benchmark_group("pool_swap");

    for reweight in [false, true] {
        group.bench_with_input(BenchmarkId::new("coin_to_long", reweight), &reweight, |b, &rw| {
            b.iter(|| {
                let mut amm = pool.clone();
                amm.swap(Token::Coin, black_box(250.0), Token::Long, rw)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_out_given_in, bench_weight_solver, bench_pool_swap);
criterion_main!(benches);
