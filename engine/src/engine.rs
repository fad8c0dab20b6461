//! Single-writer matching engine.
//!
//! One matcher thread owns every book and the order pool; producers and
//! consumers talk to it exclusively through the SPSC rings. Each drained
//! command mutates at most one book and produces exactly one result.

use crate::command::{MatchResult, MatchStatus, OrderCommand, OrderRequest, Trade, TradeList};
use crate::config::{EngineConfig, EngineConfigError};
use crate::ring::SpscRing;
use book::{Order, OrderBook, OrderPool};
use common::{Clock, MonotonicClock, OrderId, Qty, Side, Symbol};
use fxhash::FxHashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Producer-side handle: enqueue commands onto the input ring.
///
/// Single-producer: exactly one thread may hold and use a sender at a
/// time.
pub struct CommandSender {
    ring: Arc<SpscRing<OrderCommand>>,
}

impl CommandSender {
    /// Enqueue a command. Returns `false` iff the input ring is full;
    /// the producer decides whether to spin, drop, or backpressure.
    #[inline]
    #[must_use]
    pub fn submit(&self, command: OrderCommand) -> bool {
        self.ring.try_push(command).is_ok()
    }
}

/// Consumer-side handle: dequeue results from the output ring.
///
/// Single-consumer: exactly one thread may hold and use a receiver at a
/// time.
pub struct ResultReceiver {
    ring: Arc<SpscRing<MatchResult>>,
}

impl ResultReceiver {
    /// Dequeue one result, if any.
    #[inline]
    #[must_use]
    pub fn poll(&self) -> Option<MatchResult> {
        self.ring.try_pop()
    }

    /// Dequeue up to `max` results into `sink`, FIFO.
    pub fn poll_batch<F: FnMut(MatchResult)>(&self, sink: F, max: usize) -> usize {
        self.ring.try_pop_batch(sink, max)
    }
}

/// The matching core: books, pool, and the ring pair.
///
/// Thread roles: a producer calls [`submit`](Self::submit) (or uses a
/// [`CommandSender`]), the matcher thread owns the engine value and calls
/// [`drain`](Self::drain), a consumer calls
/// [`poll_result`](Self::poll_result) (or uses a [`ResultReceiver`]).
/// Book and pool state never leave the matcher thread.
pub struct MatchingEngine<C: Clock = MonotonicClock> {
    config: EngineConfig,
    books: FxHashMap<Symbol, OrderBook>,
    pool: OrderPool,
    input: Arc<SpscRing<OrderCommand>>,
    output: Arc<SpscRing<MatchResult>>,
    /// Result that could not be published on a saturated output ring;
    /// flushed before any further input is drained.
    pending: Option<MatchResult>,
    clock: C,
    running: AtomicBool,
    processed: AtomicU64,
}

impl MatchingEngine<MonotonicClock> {
    /// Create an engine on the OS monotonic clock.
    pub fn new(config: EngineConfig) -> Result<Self, EngineConfigError> {
        Self::with_clock(config, MonotonicClock::new())
    }
}

impl<C: Clock> MatchingEngine<C> {
    /// Create an engine with an injected clock (deterministic tests).
    pub fn with_clock(config: EngineConfig, clock: C) -> Result<Self, EngineConfigError> {
        config.validate()?;
        let pool = OrderPool::new(config.pool_capacity);
        let input = Arc::new(SpscRing::with_capacity(config.ring_capacity));
        let output = Arc::new(SpscRing::with_capacity(config.ring_capacity));
        Ok(Self {
            config,
            books: FxHashMap::default(),
            pool,
            input,
            output,
            pending: None,
            clock,
            running: AtomicBool::new(false),
            processed: AtomicU64::new(0),
        })
    }

    /// Ring handles for the producer and consumer threads.
    ///
    /// The rings are SPSC: hand each handle to exactly one thread, and
    /// do not mix handle use with direct [`submit`](Self::submit) /
    /// [`poll_result`](Self::poll_result) calls from other threads.
    #[must_use]
    pub fn handles(&self) -> (CommandSender, ResultReceiver) {
        (
            CommandSender {
                ring: Arc::clone(&self.input),
            },
            ResultReceiver {
                ring: Arc::clone(&self.output),
            },
        )
    }

    /// Enqueue a command (producer side). Returns `false` iff the input
    /// ring is full.
    #[inline]
    #[must_use]
    pub fn submit(&self, command: OrderCommand) -> bool {
        self.input.try_push(command).is_ok()
    }

    /// Dequeue one result (consumer side).
    #[inline]
    #[must_use]
    pub fn poll_result(&self) -> Option<MatchResult> {
        self.output.try_pop()
    }

    /// Process queued commands until the input ring is empty or the
    /// output ring saturates. Returns the number of commands processed.
    ///
    /// When the output ring is full the unpublished result is held and
    /// re-offered on the next call; no result is ever dropped and input
    /// is not consumed past it.
    pub fn drain(&mut self) -> usize {
        if let Some(result) = self.pending.take() {
            if let Err(result) = self.output.try_push(result) {
                self.pending = Some(result);
                return 0;
            }
        }

        let mut processed = 0usize;
        while let Some(command) = self.input.try_pop() {
            let result = self.process(command);
            self.processed.fetch_add(1, Ordering::Relaxed);
            processed += 1;
            if let Err(result) = self.output.try_push(result) {
                warn!("output ring saturated; pausing drain with a pending result");
                self.pending = Some(result);
                break;
            }
        }
        processed
    }

    fn process(&mut self, command: OrderCommand) -> MatchResult {
        match command {
            OrderCommand::Add(request) => self.process_add(request),
            OrderCommand::Cancel { id, symbol } => self.process_cancel(id, symbol),
            OrderCommand::Modify {
                id,
                symbol,
                new_quantity,
            } => self.process_modify(id, symbol, new_quantity),
        }
    }

    /// Match the incoming order, then rest or discard the remainder
    /// according to its type. All rejection conditions are checked
    /// before the book is touched, so a `Rejected` result never
    /// partially mutates state.
    fn process_add(&mut self, request: OrderRequest) -> MatchResult {
        let order_id = request.id;
        if request.quantity.is_zero() {
            return MatchResult::rejected(order_id);
        }

        let (level_reserve, order_reserve) =
            (self.config.level_reserve, self.config.order_index_reserve);
        let book = self.books.entry(request.symbol).or_insert_with(|| {
            debug!("creating order book for {}", request.symbol);
            OrderBook::with_capacity(request.symbol, level_reserve, order_reserve)
        });

        if book.order_slot(order_id).is_some() {
            return MatchResult::rejected(order_id);
        }
        if request.order_type.is_fill_or_kill() && !fok_can_fill(book, &request) {
            return MatchResult::rejected(order_id);
        }

        let Some(slot) = self.pool.allocate() else {
            warn!("order pool exhausted; rejecting {}", order_id);
            return MatchResult::rejected(order_id);
        };
        *self.pool.get_mut(slot) = Order::new(
            order_id,
            request.symbol,
            request.side,
            request.order_type,
            request.price,
            request.quantity,
            self.clock.now(),
        );

        let mut trades = TradeList::new();
        execute_match(book, &mut self.pool, &self.clock, slot, &mut trades);

        let remaining = self.pool.get(slot).remaining_quantity;
        let status = if remaining.is_zero() {
            self.pool.release(slot);
            MatchStatus::Matched
        } else if request.order_type.is_fill_or_kill() {
            // Precheck guarantees a full fill; reaching here means the
            // book changed underneath us mid-command.
            debug_assert!(false, "fill-or-kill left a remainder after precheck");
            trades.clear();
            self.pool.release(slot);
            MatchStatus::Rejected
        } else if request.order_type.is_immediate() {
            // Market / IOC: the remainder is discarded, never rested.
            self.pool.release(slot);
            if !trades.is_empty() {
                MatchStatus::Matched
            } else if request.order_type.is_market() && self.config.reject_market_when_empty {
                MatchStatus::Rejected
            } else {
                MatchStatus::Cancelled
            }
        } else {
            let added = book.add(&mut self.pool, slot);
            debug_assert!(added, "duplicate id was checked before matching");
            if trades.is_empty() {
                MatchStatus::Added
            } else {
                MatchStatus::Matched
            }
        };

        MatchResult {
            status,
            order_id,
            trades,
        }
    }

    /// Cancels are ordinary commands, strictly ordered with the rest of
    /// the ring. Cancelling an id that already left the book (filled, or
    /// never known) is `Rejected`.
    fn process_cancel(&mut self, id: OrderId, symbol: Symbol) -> MatchResult {
        let Some(book) = self.books.get_mut(&symbol) else {
            return MatchResult::rejected(id);
        };
        match book.remove(&mut self.pool, id) {
            Some(slot) => {
                self.pool.release(slot);
                MatchResult::new(MatchStatus::Cancelled, id)
            }
            None => MatchResult::rejected(id),
        }
    }

    /// `new_quantity` is the new total, not a delta: the open remainder
    /// becomes `new_quantity - filled_so_far`, and a total at or below
    /// the filled quantity cancels the order. Price changes are not
    /// supported; cancel and re-add instead.
    fn process_modify(&mut self, id: OrderId, symbol: Symbol, new_quantity: Qty) -> MatchResult {
        let Some(book) = self.books.get_mut(&symbol) else {
            return MatchResult::rejected(id);
        };
        let Some(slot) = book.order_slot(id) else {
            return MatchResult::rejected(id);
        };

        let (old_remaining, filled) = {
            let order = self.pool.get(slot);
            (order.remaining_quantity, order.filled_quantity())
        };

        if new_quantity <= filled {
            let freed = book
                .remove(&mut self.pool, id)
                .expect("slot was just resolved from the id index");
            self.pool.release(freed);
            return MatchResult::new(MatchStatus::Cancelled, id);
        }

        let new_remaining = new_quantity - filled;
        if self.config.modify_forfeits_priority && new_remaining > old_remaining {
            book.requeue_to_tail(&mut self.pool, id);
        }
        {
            let order = self.pool.get_mut(slot);
            order.original_quantity = new_quantity;
            order.remaining_quantity = new_remaining;
        }
        book.update_quantity(&self.pool, id, old_remaining);
        MatchResult::new(MatchStatus::Modified, id)
    }

    /// Mark the engine running (advisory flag for the host's drive loop).
    pub fn start(&self) {
        self.running.store(true, Ordering::Release);
        info!("matching engine started");
    }

    /// Mark the engine stopped.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        info!("matching engine stopped");
    }

    /// Whether the engine is marked running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Book for `symbol`, if one has been created.
    #[must_use]
    pub fn book(&self, symbol: Symbol) -> Option<&OrderBook> {
        self.books.get(&symbol)
    }

    /// The order pool (diagnostics and invariant checks).
    #[must_use]
    pub fn pool(&self) -> &OrderPool {
        &self.pool
    }

    /// Number of books created so far.
    #[must_use]
    pub fn book_count(&self) -> usize {
        self.books.len()
    }

    /// Resting orders across all books.
    #[must_use]
    pub fn total_resting_orders(&self) -> usize {
        self.books.values().map(OrderBook::order_count).sum()
    }

    /// Pool slots still available.
    #[must_use]
    pub fn available_order_capacity(&self) -> usize {
        self.pool.available()
    }

    /// Commands processed since construction (or the last clear).
    #[must_use]
    pub fn processed_orders(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Drop every book, releasing all resting orders back to the pool.
    pub fn clear_all_books(&mut self) {
        for book in self.books.values_mut() {
            book.clear(&self.pool);
        }
        self.books.clear();
        self.processed.store(0, Ordering::Relaxed);
    }
}

/// Non-mutating fill-or-kill precheck: sums opposite-side liquidity at
/// prices satisfying the limit, stopping as soon as the order's quantity
/// is covered. The sum is order-independent, so the hash-map walk needs
/// no price sorting.
fn fok_can_fill(book: &OrderBook, request: &OrderRequest) -> bool {
    let needed = request.quantity.as_u64();
    let mut available = 0u64;
    for level in book.levels(request.side.opposite()) {
        let acceptable = match request.side {
            Side::Buy => level.price() <= request.price,
            Side::Sell => level.price() >= request.price,
        };
        if acceptable {
            available += level.total_quantity().as_u64();
            if available >= needed {
                return true;
            }
        }
    }
    false
}

/// Sweep the opposite side best-first while the incoming order crosses,
/// filling FIFO within each level, always at the maker's resting price.
fn execute_match<C: Clock>(
    book: &mut OrderBook,
    pool: &mut OrderPool,
    clock: &C,
    taker_slot: u32,
    trades: &mut TradeList,
) {
    let (side, symbol, limit, is_market, taker_id) = {
        let taker = pool.get(taker_slot);
        (
            taker.side,
            taker.symbol,
            taker.price,
            taker.order_type.is_market(),
            taker.id,
        )
    };
    let opposite = side.opposite();

    loop {
        let taker_remaining = pool.get(taker_slot).remaining_quantity;
        if taker_remaining.is_zero() {
            break;
        }
        let Some(best) = book.best_price(opposite) else {
            break;
        };
        let crosses = is_market
            || match side {
                Side::Buy => limit >= best,
                Side::Sell => limit <= best,
            };
        if !crosses {
            break;
        }

        let maker_slot = book
            .level(opposite, best)
            .and_then(book::PriceLevel::head_slot)
            .expect("book corrupt: cached best price has no resting head");
        let (maker_id, maker_remaining) = {
            let maker = pool.get(maker_slot);
            (maker.id, maker.remaining_quantity)
        };

        let fill = taker_remaining.min(maker_remaining);
        debug_assert!(!fill.is_zero(), "zero-quantity fill");

        trades.push(Trade {
            maker_order_id: maker_id,
            taker_order_id: taker_id,
            symbol,
            price: best,
            quantity: fill,
            timestamp: clock.now(),
        });

        pool.get_mut(maker_slot).fill(fill);
        pool.get_mut(taker_slot).fill(fill);

        if pool.get(maker_slot).is_filled() {
            let freed = book
                .remove(pool, maker_id)
                .expect("maker was resting a moment ago");
            debug_assert_eq!(freed, maker_slot);
            pool.release(freed);
        } else {
            // Maker keeps its queue position; only the aggregate moves.
            book.update_quantity(pool, maker_id, maker_remaining);
        }
    }
}
