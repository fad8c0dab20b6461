//! SPSC ring law under real threads: for any interleaving of
//! single-producer pushes and single-consumer pops, the popped sequence
//! is exactly the pushed sequence, in order.

use engine::SpscRing;
use std::sync::Arc;
use std::thread;

#[test]
fn concurrent_push_pop_is_a_fifo_prefix() {
    const ITEMS: u64 = 200_000;
    let ring: Arc<SpscRing<u64>> = Arc::new(SpscRing::with_capacity(1024));

    let producer_ring = Arc::clone(&ring);
    let producer = thread::spawn(move || {
        for i in 0..ITEMS {
            let mut value = i;
            loop {
                match producer_ring.try_push(value) {
                    Ok(()) => break,
                    Err(v) => {
                        value = v;
                        thread::yield_now();
                    }
                }
            }
        }
    });

    let consumer_ring = Arc::clone(&ring);
    let consumer = thread::spawn(move || {
        let mut expected = 0u64;
        while expected < ITEMS {
            match consumer_ring.try_pop() {
                Some(value) => {
                    assert_eq!(value, expected, "ordering violated");
                    expected += 1;
                }
                None => thread::yield_now(),
            }
        }
    });

    producer.join().unwrap();
    consumer.join().unwrap();
    assert!(ring.is_empty());
}

#[test]
fn concurrent_batch_pop_preserves_order() {
    const ITEMS: u64 = 100_000;
    let ring: Arc<SpscRing<u64>> = Arc::new(SpscRing::with_capacity(256));

    let producer_ring = Arc::clone(&ring);
    let producer = thread::spawn(move || {
        for i in 0..ITEMS {
            let mut value = i;
            loop {
                match producer_ring.try_push(value) {
                    Ok(()) => break,
                    Err(v) => {
                        value = v;
                        thread::yield_now();
                    }
                }
            }
        }
    });

    let consumer_ring = Arc::clone(&ring);
    let consumer = thread::spawn(move || {
        let mut expected = 0u64;
        while expected < ITEMS {
            let before = expected;
            consumer_ring.try_pop_batch(
                |value| {
                    assert_eq!(value, expected, "batch ordering violated");
                    expected += 1;
                },
                64,
            );
            if expected == before {
                thread::yield_now();
            }
        }
    });

    producer.join().unwrap();
    consumer.join().unwrap();
    assert!(ring.is_empty());
}
