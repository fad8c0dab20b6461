//! Per-symbol limit order book.
//!
//! Both sides are hash maps keyed by raw price — not ordered structures —
//! so the best bid/ask are cached and updated eagerly: O(1) on the
//! insert/fill path, an O(L) rescan only when a removal takes out the
//! cached best. Exactness of the cached bests after every mutation is the
//! contract; see `check_invariants`.

use crate::level::PriceLevel;
use crate::pool::OrderPool;
use common::{OrderId, Px, Qty, Side, Symbol};
use fxhash::{FxBuildHasher, FxHashMap};

/// Default hash-bucket reservation for price levels per side.
pub const DEFAULT_LEVEL_RESERVE: usize = 1024;
/// Default hash-bucket reservation for the id index.
pub const DEFAULT_ORDER_RESERVE: usize = 16_384;

/// Single-writer order book for one instrument.
///
/// Owned exclusively by the matcher thread; not thread-safe by design.
#[derive(Debug)]
pub struct OrderBook {
    symbol: Symbol,
    buy_levels: FxHashMap<i64, PriceLevel>,
    sell_levels: FxHashMap<i64, PriceLevel>,
    /// Resting order id -> pool slot.
    orders: FxHashMap<OrderId, u32>,
    best_bid: Option<Px>,
    best_ask: Option<Px>,
}

impl OrderBook {
    /// Create a book with default map reservations.
    #[must_use]
    pub fn new(symbol: Symbol) -> Self {
        Self::with_capacity(symbol, DEFAULT_LEVEL_RESERVE, DEFAULT_ORDER_RESERVE)
    }

    /// Create a book with explicit map reservations, suppressing
    /// rehashes on the mutation path.
    #[must_use]
    pub fn with_capacity(symbol: Symbol, level_buckets: usize, order_buckets: usize) -> Self {
        Self {
            symbol,
            buy_levels: FxHashMap::with_capacity_and_hasher(level_buckets, FxBuildHasher::default()),
            sell_levels: FxHashMap::with_capacity_and_hasher(
                level_buckets,
                FxBuildHasher::default(),
            ),
            orders: FxHashMap::with_capacity_and_hasher(order_buckets, FxBuildHasher::default()),
            best_bid: None,
            best_ask: None,
        }
    }

    /// Instrument this book serves.
    #[must_use]
    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    /// Insert the order in `slot` as resting liquidity.
    ///
    /// Returns `false` (book untouched) if the order's id already rests
    /// here. The cached best on the order's side is raised/lowered when
    /// the new price is strictly more aggressive.
    pub fn add(&mut self, pool: &mut OrderPool, slot: u32) -> bool {
        let (id, side, price, remaining) = {
            let order = pool.get(slot);
            (order.id, order.side, order.price, order.remaining_quantity)
        };
        debug_assert!(!remaining.is_zero(), "resting order with zero quantity");

        if self.orders.contains_key(&id) {
            return false;
        }
        self.orders.insert(id, slot);

        let levels = match side {
            Side::Buy => &mut self.buy_levels,
            Side::Sell => &mut self.sell_levels,
        };
        levels
            .entry(price.as_i64())
            .or_insert_with(|| PriceLevel::new(price))
            .push_back(pool, slot);

        match side {
            Side::Buy => {
                if self.best_bid.map_or(true, |best| price > best) {
                    self.best_bid = Some(price);
                }
            }
            Side::Sell => {
                if self.best_ask.map_or(true, |best| price < best) {
                    self.best_ask = Some(price);
                }
            }
        }
        true
    }

    /// Unlink a resting order and hand back its slot for release.
    ///
    /// Returns `None` if the id is unknown. An emptied level is erased
    /// from its side map; if the removed price was the cached best, the
    /// best is recomputed by scanning the side's remaining levels.
    pub fn remove(&mut self, pool: &mut OrderPool, id: OrderId) -> Option<u32> {
        let slot = self.orders.remove(&id)?;
        let (side, price) = {
            let order = pool.get(slot);
            (order.side, order.price)
        };

        let levels = match side {
            Side::Buy => &mut self.buy_levels,
            Side::Sell => &mut self.sell_levels,
        };
        let level = levels
            .get_mut(&price.as_i64())
            .unwrap_or_else(|| panic!("book corrupt: resting order {id} has no level"));
        level.unlink(pool, slot);

        if level.is_empty() {
            levels.remove(&price.as_i64());
            match side {
                Side::Buy => {
                    if self.best_bid == Some(price) {
                        self.best_bid = Self::scan_best(&self.buy_levels, Side::Buy);
                    }
                }
                Side::Sell => {
                    if self.best_ask == Some(price) {
                        self.best_ask = Self::scan_best(&self.sell_levels, Side::Sell);
                    }
                }
            }
        }
        Some(slot)
    }

    /// Propagate an in-place quantity change (partial fill or modify) to
    /// the order's level aggregate. Queue position is preserved.
    ///
    /// Returns `false` if the id is not resting here.
    pub fn update_quantity(&mut self, pool: &OrderPool, id: OrderId, old_remaining: Qty) -> bool {
        let Some(&slot) = self.orders.get(&id) else {
            return false;
        };
        let (side, price, new_remaining) = {
            let order = pool.get(slot);
            (order.side, order.price, order.remaining_quantity)
        };

        let levels = match side {
            Side::Buy => &mut self.buy_levels,
            Side::Sell => &mut self.sell_levels,
        };
        let level = levels
            .get_mut(&price.as_i64())
            .unwrap_or_else(|| panic!("book corrupt: resting order {id} has no level"));
        level.update_quantity(old_remaining, new_remaining);
        true
    }

    /// Move a resting order to the tail of its level, forfeiting its
    /// time priority. Used when a size increase is configured to requeue.
    ///
    /// Returns `false` if the id is not resting here.
    pub fn requeue_to_tail(&mut self, pool: &mut OrderPool, id: OrderId) -> bool {
        let Some(&slot) = self.orders.get(&id) else {
            return false;
        };
        let (side, price) = {
            let order = pool.get(slot);
            (order.side, order.price)
        };

        let levels = match side {
            Side::Buy => &mut self.buy_levels,
            Side::Sell => &mut self.sell_levels,
        };
        let level = levels
            .get_mut(&price.as_i64())
            .unwrap_or_else(|| panic!("book corrupt: resting order {id} has no level"));
        level.unlink(pool, slot);
        level.push_back(pool, slot);
        true
    }

    fn scan_best(levels: &FxHashMap<i64, PriceLevel>, side: Side) -> Option<Px> {
        let keys = levels.keys().copied();
        let raw = match side {
            Side::Buy => keys.max(),
            Side::Sell => keys.min(),
        };
        raw.map(Px::from_i64)
    }

    /// Highest resting buy price, if any.
    #[inline]
    #[must_use]
    pub fn best_bid(&self) -> Option<Px> {
        self.best_bid
    }

    /// Lowest resting sell price, if any.
    #[inline]
    #[must_use]
    pub fn best_ask(&self) -> Option<Px> {
        self.best_ask
    }

    /// Whether any buy liquidity rests.
    #[inline]
    #[must_use]
    pub fn has_best_bid(&self) -> bool {
        self.best_bid.is_some()
    }

    /// Whether any sell liquidity rests.
    #[inline]
    #[must_use]
    pub fn has_best_ask(&self) -> bool {
        self.best_ask.is_some()
    }

    /// Best resting price on the given side.
    #[inline]
    #[must_use]
    pub fn best_price(&self, side: Side) -> Option<Px> {
        match side {
            Side::Buy => self.best_bid,
            Side::Sell => self.best_ask,
        }
    }

    /// Level at an exact price on the given side.
    #[must_use]
    pub fn level(&self, side: Side, price: Px) -> Option<&PriceLevel> {
        let levels = match side {
            Side::Buy => &self.buy_levels,
            Side::Sell => &self.sell_levels,
        };
        levels.get(&price.as_i64())
    }

    /// Iterate the side's levels in arbitrary (hash) order. All levels
    /// are non-empty by construction.
    pub fn levels(&self, side: Side) -> impl Iterator<Item = &PriceLevel> {
        let levels = match side {
            Side::Buy => &self.buy_levels,
            Side::Sell => &self.sell_levels,
        };
        levels.values()
    }

    /// Pool slot of a resting order.
    #[must_use]
    pub fn order_slot(&self, id: OrderId) -> Option<u32> {
        self.orders.get(&id).copied()
    }

    /// Resting order by id.
    #[must_use]
    pub fn order<'p>(&self, pool: &'p OrderPool, id: OrderId) -> Option<&'p crate::Order> {
        self.order_slot(id).map(|slot| pool.get(slot))
    }

    /// Number of resting orders across both sides.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Top `depth` bid levels, most aggressive (highest) first.
    ///
    /// Off the hot path; allocates.
    #[must_use]
    pub fn bid_levels(&self, depth: usize) -> Vec<(Px, Qty)> {
        let mut all: Vec<(Px, Qty)> = self
            .buy_levels
            .values()
            .map(|l| (l.price(), l.total_quantity()))
            .collect();
        all.sort_by(|a, b| b.0.cmp(&a.0));
        all.truncate(depth);
        all
    }

    /// Top `depth` ask levels, most aggressive (lowest) first.
    ///
    /// Off the hot path; allocates.
    #[must_use]
    pub fn ask_levels(&self, depth: usize) -> Vec<(Px, Qty)> {
        let mut all: Vec<(Px, Qty)> = self
            .sell_levels
            .values()
            .map(|l| (l.price(), l.total_quantity()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all.truncate(depth);
        all
    }

    /// Remove everything, releasing every resting slot back to `pool`.
    pub fn clear(&mut self, pool: &OrderPool) {
        for (_, slot) in self.orders.drain() {
            pool.release(slot);
        }
        self.buy_levels.clear();
        self.sell_levels.clear();
        self.best_bid = None;
        self.best_ask = None;
    }

    /// Assert the book's structural invariants; panics on violation.
    ///
    /// Intended for tests and post-mortem diagnostics — it walks every
    /// chain and is far too slow for the command path.
    pub fn check_invariants(&self, pool: &OrderPool) {
        let mut seen = 0usize;
        for (side, levels) in [(Side::Buy, &self.buy_levels), (Side::Sell, &self.sell_levels)] {
            for (&raw, level) in levels {
                assert!(!level.is_empty(), "empty level left in {side} map");
                assert_eq!(level.price().as_i64(), raw, "level keyed under wrong price");

                let mut chain_total = Qty::ZERO;
                let mut chain_count = 0u32;
                for slot in level.slots(pool) {
                    let order = pool.get(slot);
                    assert_eq!(order.side, side, "order on the wrong side");
                    assert_eq!(order.price, level.price(), "order at the wrong level");
                    assert!(
                        !order.remaining_quantity.is_zero(),
                        "filled order still resting"
                    );
                    assert!(
                        order.remaining_quantity <= order.original_quantity,
                        "remaining exceeds original"
                    );
                    assert_eq!(
                        self.orders.get(&order.id),
                        Some(&slot),
                        "chain member missing from id index"
                    );
                    chain_total += order.remaining_quantity;
                    chain_count += 1;
                    seen += 1;
                }
                assert_eq!(chain_count, level.order_count(), "level count drifted");
                assert_eq!(
                    chain_total,
                    level.total_quantity(),
                    "level aggregate drifted"
                );
            }

            let expected_best = Self::scan_best(levels, side);
            let cached = match side {
                Side::Buy => self.best_bid,
                Side::Sell => self.best_ask,
            };
            assert_eq!(cached, expected_best, "cached best wrong on {side}");
        }
        assert_eq!(seen, self.orders.len(), "id index has orphan entries");

        if let (Some(bid), Some(ask)) = (self.best_bid, self.best_ask) {
            assert!(bid < ask, "crossed book: bid {bid} >= ask {ask}");
        }
    }
}
