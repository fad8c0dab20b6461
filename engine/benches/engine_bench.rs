//! Performance benchmarks for the matching core

// Benchmarks are not production code - unwrap/expect are acceptable here
#![allow(clippy::unwrap_used, clippy::expect_used)]

use book::{Order, OrderBook, OrderPool};
use common::{OrderId, OrderType, Px, Qty, Side, Symbol};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use engine::{EngineConfig, MatchingEngine, OrderCommand, OrderRequest, SpscRing};

fn bench_config() -> EngineConfig {
    EngineConfig {
        pool_capacity: 65_536,
        ring_capacity: 4096,
        level_reserve: 1024,
        order_index_reserve: 16_384,
        ..EngineConfig::default()
    }
}

fn resting_ladder(n: u64) -> Vec<OrderCommand> {
    // Alternating non-crossing bids and asks across a price ladder.
    (1..=n)
        .map(|id| {
            let side = if id % 2 == 0 { Side::Sell } else { Side::Buy };
            let tick = (id % 64) as f64 * 0.01;
            let price = if side == Side::Buy {
                99.0 - tick
            } else {
                101.0 + tick
            };
            OrderCommand::Add(OrderRequest {
                id: OrderId::new(id),
                symbol: Symbol::new(1),
                side,
                order_type: OrderType::Limit,
                price: Px::new(price),
                quantity: Qty::new(100),
            })
        })
        .collect()
}

fn bench_spsc_ring(c: &mut Criterion) {
    let mut group = c.benchmark_group("spsc_ring");

    group.bench_function("push_pop", |b| {
        let ring: SpscRing<u64> = SpscRing::with_capacity(1024);
        b.iter(|| {
            ring.try_push(black_box(42)).unwrap();
            black_box(ring.try_pop().unwrap());
        });
    });

    group.finish();
}

fn bench_order_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_pool");

    group.bench_function("allocate_release", |b| {
        let pool = OrderPool::new(4096);
        b.iter(|| {
            let slot = pool.allocate().unwrap();
            black_box(slot);
            pool.release(slot);
        });
    });

    group.finish();
}

fn bench_book_add_remove(c: &mut Criterion) {
    const N: u64 = 1000;
    let mut group = c.benchmark_group("order_book");
    group.throughput(Throughput::Elements(N));

    group.bench_function("add_remove_1000", |b| {
        b.iter_batched(
            || (OrderPool::new(2048), OrderBook::new(Symbol::new(1))),
            |(mut pool, mut book)| {
                for id in 1..=N {
                    let slot = pool.allocate().unwrap();
                    let tick = (id % 64) as f64 * 0.01;
                    *pool.get_mut(slot) = Order::new(
                        OrderId::new(id),
                        Symbol::new(1),
                        Side::Buy,
                        OrderType::Limit,
                        Px::new(99.0 - tick),
                        Qty::new(100),
                        common::Ts::from_nanos(id),
                    );
                    book.add(&mut pool, slot);
                }
                for id in 1..=N {
                    let slot = book.remove(&mut pool, OrderId::new(id)).unwrap();
                    pool.release(slot);
                }
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_engine_throughput(c: &mut Criterion) {
    const N: u64 = 1000;
    let mut group = c.benchmark_group("engine");
    group.throughput(Throughput::Elements(N));

    group.bench_function("submit_drain_1000_resting", |b| {
        b.iter_batched(
            || {
                (
                    MatchingEngine::new(bench_config()).unwrap(),
                    resting_ladder(N),
                )
            },
            |(mut engine, commands)| {
                for command in commands {
                    assert!(engine.submit(command));
                }
                engine.drain();
                while let Some(result) = engine.poll_result() {
                    black_box(result);
                }
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("submit_drain_1000_crossing", |b| {
        b.iter_batched(
            || {
                // Every pair crosses at 100.0: half makers, half takers.
                let commands: Vec<OrderCommand> = (1..=N)
                    .map(|id| {
                        let side = if id % 2 == 0 { Side::Buy } else { Side::Sell };
                        OrderCommand::Add(OrderRequest {
                            id: OrderId::new(id),
                            symbol: Symbol::new(1),
                            side,
                            order_type: OrderType::Limit,
                            price: Px::new(100.0),
                            quantity: Qty::new(100),
                        })
                    })
                    .collect();
                (MatchingEngine::new(bench_config()).unwrap(), commands)
            },
            |(mut engine, commands)| {
                for command in commands {
                    assert!(engine.submit(command));
                }
                engine.drain();
                while let Some(result) = engine.poll_result() {
                    black_box(result);
                }
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_spsc_ring,
    bench_order_pool,
    bench_book_add_remove,
    bench_engine_throughput
);
criterion_main!(benches);
