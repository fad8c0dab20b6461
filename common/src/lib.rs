//! Shared types for the VeloMatch matching core
//!
//! Fixed-point price and quantity newtypes, identifier types, and the
//! injectable monotonic clock. Everything here is `Copy`, integer-backed,
//! and deterministic: no floats cross component boundaries.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod time;
pub mod types;

pub use time::{Clock, ManualClock, MonotonicClock};
pub use types::{OrderId, OrderType, Px, Qty, Side, Symbol, Ts, PX_SCALE};
