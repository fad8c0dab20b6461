//! Order record stored in the pool slab.
//!
//! Orders are plain values inside an indexed slab; the intrusive
//! `prev`/`next` fields are slot indices into the same slab, forming the
//! FIFO chain of the price level the order rests in. One cache line per
//! order.

use common::{OrderId, OrderType, Px, Qty, Side, Symbol, Ts};

/// Sentinel slot index: "no neighbour" / end of chain.
pub const NIL: u32 = u32::MAX;

/// A single order, aligned to the cache line.
///
/// While resting, an order is referenced by exactly one price level
/// (through the intrusive chain) and one id index entry. Invariant:
/// `remaining_quantity <= original_quantity`, and a fully filled order
/// (`remaining_quantity == 0`) must not remain in any book.
#[repr(align(64))]
#[derive(Debug, Clone)]
pub struct Order {
    /// Producer-assigned identifier, unique per engine lifetime.
    pub id: OrderId,
    /// Instrument key.
    pub symbol: Symbol,
    /// Limit price; ignored for market orders.
    pub price: Px,
    /// Quantity at submission (or after a modify).
    pub original_quantity: Qty,
    /// Quantity still open.
    pub remaining_quantity: Qty,
    /// Stamped by the matcher on construction.
    pub timestamp: Ts,
    /// Buy or sell.
    pub side: Side,
    /// Limit / Market / ImmediateOrCancel / FillOrKill.
    pub order_type: OrderType,
    pub(crate) prev: u32,
    pub(crate) next: u32,
}

impl Order {
    /// Construct a fresh, unlinked order.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        id: OrderId,
        symbol: Symbol,
        side: Side,
        order_type: OrderType,
        price: Px,
        quantity: Qty,
        timestamp: Ts,
    ) -> Self {
        Self {
            id,
            symbol,
            price,
            original_quantity: quantity,
            remaining_quantity: quantity,
            timestamp,
            side,
            order_type,
            prev: NIL,
            next: NIL,
        }
    }

    /// Whether this is a buy order.
    #[inline]
    #[must_use]
    pub const fn is_buy(&self) -> bool {
        matches!(self.side, Side::Buy)
    }

    /// Whether the order has no open quantity left.
    #[inline]
    #[must_use]
    pub const fn is_filled(&self) -> bool {
        self.remaining_quantity.is_zero()
    }

    /// Quantity consumed so far.
    #[inline]
    #[must_use]
    pub fn filled_quantity(&self) -> Qty {
        self.original_quantity - self.remaining_quantity
    }

    /// Consume `quantity` from the open remainder.
    #[inline]
    pub fn fill(&mut self, quantity: Qty) {
        debug_assert!(quantity <= self.remaining_quantity);
        self.remaining_quantity -= quantity;
    }
}

impl Default for Order {
    fn default() -> Self {
        Self::new(
            OrderId::new(0),
            Symbol::new(0),
            Side::Buy,
            OrderType::Limit,
            Px::ZERO,
            Qty::ZERO,
            Ts::from_nanos(0),
        )
    }
}
