//! VeloMatch matching engine
//!
//! Single-writer limit-order matching core: one matcher thread owns the
//! per-symbol books and the order pool, and talks to the outside world
//! through a pair of lock-free SPSC rings.
//!
//! - NO allocation on the Add/Cancel/Modify/match path (pooled orders,
//!   inline trade lists)
//! - NO locks — the only shared state is the two rings
//! - Strict price-time priority; trades always print at the maker's
//!   resting price
//! - Limit / Market / Immediate-or-Cancel / Fill-or-Kill semantics with
//!   a non-mutating FOK precheck
//!
//! # Usage
//! ```
//! use engine::{EngineConfig, MatchingEngine, OrderCommand, OrderRequest};
//! use common::{OrderId, OrderType, Px, Qty, Side, Symbol};
//!
//! let config = EngineConfig {
//!     pool_capacity: 1024,
//!     ring_capacity: 256,
//!     ..EngineConfig::default()
//! };
//! let mut engine = MatchingEngine::new(config).unwrap();
//! engine.start();
//!
//! assert!(engine.submit(OrderCommand::Add(OrderRequest {
//!     id: OrderId::new(1),
//!     symbol: Symbol::new(1),
//!     side: Side::Buy,
//!     order_type: OrderType::Limit,
//!     price: Px::new(100.50),
//!     quantity: Qty::new(1000),
//! })));
//! engine.drain();
//! let result = engine.poll_result().unwrap();
//! assert!(result.trades.is_empty());
//! ```

#![warn(missing_docs)]

pub mod command;
pub mod config;
pub mod engine;
pub mod ring;

pub use command::{MatchResult, MatchStatus, OrderCommand, OrderRequest, Trade, TradeList};
pub use config::{EngineConfig, EngineConfigError, DEFAULT_RING_CAPACITY};
pub use engine::{CommandSender, MatchingEngine, ResultReceiver};
pub use ring::SpscRing;
