//! End-to-end engine scenarios: submit → drain → poll, asserting book
//! state and structural invariants after every command.

use common::{ManualClock, OrderId, OrderType, Px, Qty, Side, Symbol};
use engine::{
    EngineConfig, MatchResult, MatchStatus, MatchingEngine, OrderCommand, OrderRequest,
};

const SYM: Symbol = Symbol(1);

fn test_engine() -> MatchingEngine<ManualClock> {
    let config = EngineConfig {
        pool_capacity: 1024,
        ring_capacity: 256,
        level_reserve: 64,
        order_index_reserve: 64,
        ..EngineConfig::default()
    };
    MatchingEngine::with_clock(config, ManualClock::starting_at(1)).expect("valid config")
}

fn add(id: u64, side: Side, order_type: OrderType, price: f64, qty: u64) -> OrderCommand {
    OrderCommand::Add(OrderRequest {
        id: OrderId::new(id),
        symbol: SYM,
        side,
        order_type,
        price: Px::new(price),
        quantity: Qty::new(qty),
    })
}

fn limit(id: u64, side: Side, price: f64, qty: u64) -> OrderCommand {
    add(id, side, OrderType::Limit, price, qty)
}

/// Run one command and return its result, asserting the invariants the
/// book must satisfy after every command.
fn run(engine: &mut MatchingEngine<ManualClock>, command: OrderCommand) -> MatchResult {
    assert!(engine.submit(command), "input ring full in test");
    assert_eq!(engine.drain(), 1);
    let result = engine.poll_result().expect("exactly one result per command");
    if let Some(book) = engine.book(SYM) {
        book.check_invariants(engine.pool());
    }
    result
}

#[test]
fn scenario_simple_cross() {
    let mut engine = test_engine();

    let r1 = run(&mut engine, limit(1, Side::Buy, 100.50, 1000));
    assert_eq!(r1.status, MatchStatus::Added);
    assert!(r1.trades.is_empty());

    let r2 = run(&mut engine, limit(2, Side::Sell, 100.40, 800));
    assert_eq!(r2.status, MatchStatus::Matched);
    assert_eq!(r2.trades.len(), 1);
    let trade = &r2.trades[0];
    assert_eq!(trade.maker_order_id, OrderId::new(1));
    assert_eq!(trade.taker_order_id, OrderId::new(2));
    assert_eq!(trade.price, Px::new(100.50), "maker price, not taker");
    assert_eq!(trade.quantity, Qty::new(800));

    let book = engine.book(SYM).unwrap();
    assert_eq!(book.best_bid(), Some(Px::new(100.50)));
    assert_eq!(
        book.level(Side::Buy, Px::new(100.50)).unwrap().total_quantity(),
        Qty::new(200)
    );
    assert!(!book.has_best_ask());
    assert_eq!(book.order_count(), 1);
}

#[test]
fn scenario_price_time_priority() {
    let mut engine = test_engine();

    run(&mut engine, limit(1, Side::Buy, 100.00, 500));
    run(&mut engine, limit(2, Side::Buy, 100.00, 300));
    let r3 = run(&mut engine, limit(3, Side::Sell, 100.00, 600));

    assert_eq!(r3.status, MatchStatus::Matched);
    assert_eq!(r3.trades.len(), 2);
    assert_eq!(r3.trades[0].maker_order_id, OrderId::new(1));
    assert_eq!(r3.trades[0].quantity, Qty::new(500));
    assert_eq!(r3.trades[0].price, Px::new(100.00));
    assert_eq!(r3.trades[1].maker_order_id, OrderId::new(2));
    assert_eq!(r3.trades[1].quantity, Qty::new(100));

    let book = engine.book(SYM).unwrap();
    assert_eq!(book.best_bid(), Some(Px::new(100.00)));
    assert_eq!(
        book.level(Side::Buy, Px::new(100.00)).unwrap().total_quantity(),
        Qty::new(200)
    );
    assert!(!book.has_best_ask());
    let survivor = book.order(engine.pool(), OrderId::new(2)).unwrap();
    assert_eq!(survivor.remaining_quantity, Qty::new(200));
}

#[test]
fn scenario_ioc_partial_fill() {
    let mut engine = test_engine();

    run(&mut engine, limit(1, Side::Sell, 101.00, 200));
    let r2 = run(
        &mut engine,
        add(2, Side::Buy, OrderType::ImmediateOrCancel, 101.00, 500),
    );

    assert_eq!(r2.status, MatchStatus::Matched);
    assert_eq!(r2.trades.len(), 1);
    assert_eq!(r2.trades[0].maker_order_id, OrderId::new(1));
    assert_eq!(r2.trades[0].quantity, Qty::new(200));
    assert_eq!(r2.trades[0].price, Px::new(101.00));

    // The IOC remainder (300) is discarded, never rested.
    let book = engine.book(SYM).unwrap();
    assert_eq!(book.order_count(), 0);
    assert!(!book.has_best_bid());
    assert!(!book.has_best_ask());
    assert_eq!(engine.pool().in_use(), 0);
}

#[test]
fn scenario_fok_rejection() {
    let mut engine = test_engine();

    run(&mut engine, limit(1, Side::Sell, 101.00, 100));
    let before_bids = engine.book(SYM).unwrap().bid_levels(8);
    let before_asks = engine.book(SYM).unwrap().ask_levels(8);

    let r2 = run(
        &mut engine,
        add(2, Side::Buy, OrderType::FillOrKill, 101.00, 500),
    );
    assert_eq!(r2.status, MatchStatus::Rejected);
    assert!(r2.trades.is_empty());

    let book = engine.book(SYM).unwrap();
    assert_eq!(book.bid_levels(8), before_bids);
    assert_eq!(book.ask_levels(8), before_asks);
    assert_eq!(book.order_count(), 1);
}

#[test]
fn scenario_modify_preserves_priority() {
    let mut engine = test_engine();

    run(&mut engine, limit(1, Side::Buy, 100.00, 500));
    run(&mut engine, limit(2, Side::Buy, 100.00, 500));
    let rm = run(
        &mut engine,
        OrderCommand::Modify {
            id: OrderId::new(1),
            symbol: SYM,
            new_quantity: Qty::new(200),
        },
    );
    assert_eq!(rm.status, MatchStatus::Modified);

    let r3 = run(&mut engine, limit(3, Side::Sell, 100.00, 300));
    assert_eq!(r3.trades.len(), 2);
    assert_eq!(r3.trades[0].maker_order_id, OrderId::new(1));
    assert_eq!(r3.trades[0].quantity, Qty::new(200));
    assert_eq!(r3.trades[1].maker_order_id, OrderId::new(2));
    assert_eq!(r3.trades[1].quantity, Qty::new(100));

    let book = engine.book(SYM).unwrap();
    let survivor = book.order(engine.pool(), OrderId::new(2)).unwrap();
    assert_eq!(survivor.remaining_quantity, Qty::new(400));
}

#[test]
fn scenario_cancel_updates_best() {
    let mut engine = test_engine();

    run(&mut engine, limit(1, Side::Buy, 99.00, 100));
    run(&mut engine, limit(2, Side::Buy, 100.00, 100));
    assert_eq!(engine.book(SYM).unwrap().best_bid(), Some(Px::new(100.00)));

    let rc = run(
        &mut engine,
        OrderCommand::Cancel {
            id: OrderId::new(2),
            symbol: SYM,
        },
    );
    assert_eq!(rc.status, MatchStatus::Cancelled);
    assert_eq!(engine.book(SYM).unwrap().best_bid(), Some(Px::new(99.00)));
}

#[test]
fn round_trip_add_then_cancel_restores_empty_book() {
    let mut engine = test_engine();

    for id in 1..=20u64 {
        let side = if id % 2 == 0 { Side::Sell } else { Side::Buy };
        let price = if side == Side::Buy {
            99.0 - (id as f64) * 0.01
        } else {
            101.0 + (id as f64) * 0.01
        };
        run(&mut engine, limit(id, side, price, 10 * id));
    }
    assert_eq!(engine.total_resting_orders(), 20);

    for id in 1..=20u64 {
        let rc = run(
            &mut engine,
            OrderCommand::Cancel {
                id: OrderId::new(id),
                symbol: SYM,
            },
        );
        assert_eq!(rc.status, MatchStatus::Cancelled);
    }

    let book = engine.book(SYM).unwrap();
    assert_eq!(book.order_count(), 0);
    assert!(!book.has_best_bid());
    assert!(!book.has_best_ask());
    assert!(book.bid_levels(32).is_empty());
    assert!(book.ask_levels(32).is_empty());
    assert_eq!(engine.pool().in_use(), 0);
}

#[test]
fn round_trip_modify_to_same_quantity_is_a_noop() {
    let mut engine = test_engine();
    run(&mut engine, limit(1, Side::Buy, 100.00, 500));
    run(&mut engine, limit(2, Side::Buy, 100.00, 300));

    let before = {
        let book = engine.book(SYM).unwrap();
        (
            book.best_bid(),
            book.bid_levels(8),
            book.order_count(),
            book.order(engine.pool(), OrderId::new(1))
                .unwrap()
                .remaining_quantity,
        )
    };

    let rm = run(
        &mut engine,
        OrderCommand::Modify {
            id: OrderId::new(1),
            symbol: SYM,
            new_quantity: Qty::new(500),
        },
    );
    assert_eq!(rm.status, MatchStatus::Modified);

    let book = engine.book(SYM).unwrap();
    assert_eq!(book.best_bid(), before.0);
    assert_eq!(book.bid_levels(8), before.1);
    assert_eq!(book.order_count(), before.2);
    assert_eq!(
        book.order(engine.pool(), OrderId::new(1))
            .unwrap()
            .remaining_quantity,
        before.3
    );

    // Priority unchanged: order #1 still fills first.
    let r3 = run(&mut engine, limit(3, Side::Sell, 100.00, 100));
    assert_eq!(r3.trades[0].maker_order_id, OrderId::new(1));
}

#[test]
fn cancel_after_full_fill_is_rejected() {
    let mut engine = test_engine();
    run(&mut engine, limit(1, Side::Sell, 101.00, 100));
    run(&mut engine, limit(2, Side::Buy, 101.00, 100)); // fills #1

    let rc = run(
        &mut engine,
        OrderCommand::Cancel {
            id: OrderId::new(1),
            symbol: SYM,
        },
    );
    assert_eq!(rc.status, MatchStatus::Rejected);
}

#[test]
fn independent_symbols_never_cross() {
    let mut engine = test_engine();
    run(&mut engine, limit(1, Side::Sell, 100.00, 100));

    let other = OrderCommand::Add(OrderRequest {
        id: OrderId::new(2),
        symbol: Symbol(2),
        side: Side::Buy,
        order_type: OrderType::Limit,
        price: Px::new(105.00),
        quantity: Qty::new(100),
    });
    assert!(engine.submit(other));
    engine.drain();
    let r2 = engine.poll_result().unwrap();
    assert_eq!(r2.status, MatchStatus::Added, "no cross across books");
    assert_eq!(engine.book_count(), 2);
    assert_eq!(engine.total_resting_orders(), 2);
}

#[test]
fn three_thread_pipeline_preserves_command_order() {
    let config = EngineConfig {
        pool_capacity: 4096,
        ring_capacity: 64, // small on purpose: exercise full-ring paths
        level_reserve: 64,
        order_index_reserve: 64,
        ..EngineConfig::default()
    };
    let mut engine = MatchingEngine::new(config).expect("valid config");
    let (sender, receiver) = engine.handles();
    engine.start();

    const ORDERS: u64 = 2000;

    let producer = std::thread::spawn(move || {
        for id in 1..=ORDERS {
            let side = if id % 2 == 0 { Side::Sell } else { Side::Buy };
            // Sells priced above buys: everything rests, nothing crosses.
            let price = if side == Side::Buy { 99.0 } else { 101.0 };
            let command = OrderCommand::Add(OrderRequest {
                id: OrderId::new(id),
                symbol: SYM,
                side,
                order_type: OrderType::Limit,
                price: Px::new(price),
                quantity: Qty::new(1),
            });
            while !sender.submit(command) {
                std::thread::yield_now();
            }
        }
    });

    let consumer_done = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
    let done_flag = std::sync::Arc::clone(&consumer_done);
    let consumer = std::thread::spawn(move || {
        let mut seen = Vec::with_capacity(ORDERS as usize);
        while seen.len() < ORDERS as usize {
            match receiver.poll() {
                Some(result) => seen.push(result),
                None => std::thread::yield_now(),
            }
        }
        done_flag.store(true, std::sync::atomic::Ordering::Release);
        seen
    });

    // Keep draining until the consumer has every result: a held
    // backpressure result is only flushed by another drain call.
    while !consumer_done.load(std::sync::atomic::Ordering::Acquire) {
        engine.drain();
        std::thread::yield_now();
    }
    producer.join().unwrap();
    let results = consumer.join().unwrap();
    engine.stop();

    assert_eq!(results.len(), ORDERS as usize);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(
            result.order_id,
            OrderId::new(i as u64 + 1),
            "results must come back in submission order"
        );
        assert_eq!(result.status, MatchStatus::Added);
    }
    engine.book(SYM).unwrap().check_invariants(engine.pool());
}
