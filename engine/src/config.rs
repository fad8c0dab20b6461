//! Engine configuration.

use thiserror::Error;

/// Default capacity for both rings (slots; usable capacity is one less).
pub const DEFAULT_RING_CAPACITY: usize = 65_536;

/// Matching engine configuration.
///
/// The two policy switches resolve behaviours that differ between
/// venues; both default to the reference behaviour.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Order pool slots (resting-order ceiling across all books).
    pub pool_capacity: usize,
    /// Input and output ring slots; must be a power of two.
    pub ring_capacity: usize,
    /// Hash-bucket reservation per side of each new book.
    pub level_reserve: usize,
    /// Hash-bucket reservation for each new book's id index.
    pub order_index_reserve: usize,
    /// When `true`, a Modify that increases the open quantity re-queues
    /// the order at the tail of its level (loses time priority). The
    /// default keeps priority.
    pub modify_forfeits_priority: bool,
    /// When `true`, a market order finding no opposite liquidity is
    /// `Rejected` instead of silently `Cancelled`.
    pub reject_market_when_empty: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_capacity: book::DEFAULT_POOL_CAPACITY,
            ring_capacity: DEFAULT_RING_CAPACITY,
            level_reserve: book::DEFAULT_LEVEL_RESERVE,
            order_index_reserve: book::DEFAULT_ORDER_RESERVE,
            modify_forfeits_priority: false,
            reject_market_when_empty: false,
        }
    }
}

impl EngineConfig {
    /// Check the configuration for values the engine cannot run with.
    pub fn validate(&self) -> Result<(), EngineConfigError> {
        if self.pool_capacity == 0 {
            return Err(EngineConfigError::ZeroPoolCapacity);
        }
        if self.ring_capacity < 2 {
            return Err(EngineConfigError::RingCapacityTooSmall {
                capacity: self.ring_capacity,
            });
        }
        if !self.ring_capacity.is_power_of_two() {
            return Err(EngineConfigError::RingCapacityNotPowerOfTwo {
                capacity: self.ring_capacity,
            });
        }
        Ok(())
    }
}

/// Configuration values the engine refuses to start with.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineConfigError {
    /// Ring capacity must be a power of two for index masking.
    #[error("ring capacity {capacity} is not a power of two")]
    RingCapacityNotPowerOfTwo {
        /// The offending capacity.
        capacity: usize,
    },

    /// Rings need at least one usable slot.
    #[error("ring capacity {capacity} is below the minimum of 2")]
    RingCapacityTooSmall {
        /// The offending capacity.
        capacity: usize,
    },

    /// A pool with no slots can never accept an order.
    #[error("order pool capacity must be non-zero")]
    ZeroPoolCapacity,
}
