//! Per-instrument limit order book for the VeloMatch matching core
//!
//! The book keeps strict price-time priority with O(1) amortized
//! add/remove and O(1) best-bid/best-ask:
//! - orders live in a pre-allocated, cache-line-aligned slab
//!   ([`OrderPool`]) with a lock-free free list — no heap allocation on
//!   the mutation path;
//! - each price level ([`PriceLevel`]) is an intrusive FIFO chain of
//!   slab indices;
//! - each side of the [`OrderBook`] is a hash map keyed by raw price
//!   with a cached best, rescanned only when a removal takes the best
//!   out.
//!
//! Everything here is single-writer: the matcher thread owns the book
//! and the pool exclusively.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod book;
pub mod level;
pub mod order;
pub mod pool;

pub use book::{OrderBook, DEFAULT_LEVEL_RESERVE, DEFAULT_ORDER_RESERVE};
pub use level::PriceLevel;
pub use order::{Order, NIL};
pub use pool::{OrderPool, DEFAULT_POOL_CAPACITY};
