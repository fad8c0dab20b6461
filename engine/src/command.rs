//! Command and result records carried on the rings.

use common::{OrderId, OrderType, Px, Qty, Side, Symbol, Ts};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Payload of an Add command. The matcher assigns the timestamp and
/// constructs the pooled order from this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Producer-assigned order id, unique per engine lifetime.
    pub id: OrderId,
    /// Instrument key.
    pub symbol: Symbol,
    /// Buy or sell.
    pub side: Side,
    /// Limit / Market / ImmediateOrCancel / FillOrKill.
    pub order_type: OrderType,
    /// Limit price; ignored for market orders.
    pub price: Px,
    /// Quantity in base units; zero is rejected.
    pub quantity: Qty,
}

/// One command on the input ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    /// Submit a new order.
    Add(OrderRequest),
    /// Cancel a resting order by id.
    Cancel {
        /// Id of the order to cancel.
        id: OrderId,
        /// Book the order rests in.
        symbol: Symbol,
    },
    /// Change a resting order's total quantity in place. Price changes
    /// are not supported; cancel and re-add instead.
    Modify {
        /// Id of the order to modify.
        id: OrderId,
        /// Book the order rests in.
        symbol: Symbol,
        /// New total quantity (not a delta).
        new_quantity: Qty,
    },
}

/// Outcome classification of one processed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    /// Limit order rested without trading.
    Added,
    /// The incoming order traded (fully, or partially before resting /
    /// being discarded).
    Matched,
    /// Order cancelled — explicitly, or an unfilled Market/IOC, or a
    /// modify below the filled quantity.
    Cancelled,
    /// Resting order's quantity changed in place.
    Modified,
    /// Command refused: duplicate or unknown id, zero quantity, pool
    /// exhaustion, or failed fill-or-kill precheck. The book is
    /// untouched.
    Rejected,
}

/// One fill between a resting maker and an incoming taker.
///
/// The price is always the maker's resting price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Resting side of the fill.
    pub maker_order_id: OrderId,
    /// Aggressing side of the fill.
    pub taker_order_id: OrderId,
    /// Instrument traded.
    pub symbol: Symbol,
    /// Execution price (the maker's resting price).
    pub price: Px,
    /// Filled quantity; never zero.
    pub quantity: Qty,
    /// Matcher clock at fill time.
    pub timestamp: Ts,
}

/// Trades attached to a result; inline storage for the common case so
/// result construction stays off the heap.
pub type TradeList = SmallVec<[Trade; 4]>;

/// One result on the output ring. Every command produces exactly one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// What happened to the command.
    pub status: MatchStatus,
    /// The order the command addressed.
    pub order_id: OrderId,
    /// Fills produced by an Add, oldest first. Empty for everything
    /// else.
    pub trades: TradeList,
}

impl MatchResult {
    /// Result with the given status and no trades.
    #[must_use]
    pub fn new(status: MatchStatus, order_id: OrderId) -> Self {
        Self {
            status,
            order_id,
            trades: TradeList::new(),
        }
    }

    /// Rejection result for `order_id`.
    #[must_use]
    pub fn rejected(order_id: OrderId) -> Self {
        Self::new(MatchStatus::Rejected, order_id)
    }
}
