//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! handler(args)
//!     → key.rs (prefix + canonical args → sha256 key)
//!     → store.rs (hit: return value / miss: run operation)
//!     → store.rs (set with ttl on success)
//!
//! Periodically:
//!     lifecycle::maintenance → TtlCache::sweep_expired
//! ```
//!
//! # Entry lifecycle
//! ```text
//! absent → present(valid)       set
//! present(valid) → expired      time passes (no explicit transition)
//! expired → absent              next get or sweep_expired (counted as eviction)
//! present(*) → absent           delete, clear
//! ```
//!
//! # Design Decisions
//! - No operation fails: misses and expiry are `None`
//! - Counters survive `clear`
//! - Optional entry cap evicts expired entries first, then the one nearest expiry

pub mod key;
pub mod memoize;
pub mod store;

pub use key::{key_for, make_key, CacheKey};
pub use memoize::{memoize, memoize_async, MemoizeConfig};
pub use store::{CacheStats, TtlCache};
