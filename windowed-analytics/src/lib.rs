//! Sharded, thread-safe, bounded-memory time-window analytics core.
//!
//! This crate is the one reusable subsystem every domain tracker in this workspace builds on:
//! a lock-striped ring-buffer aggregator ([`RingBuffer`]/[`AtomicBucket`]), a rolling
//! Count-Min Sketch for approximate per-key frequency over a window ([`RollingCMS`]), a rolling
//! HyperLogLog for approximate distinct-count over a window ([`RollingHLL`]), and a bounded
//! top-K tracker ([`BoundedTopK`]), combined behind the [`Analytics`] façade.
//!
//! Memory is bounded by configuration, never by ingest volume: a cold key can linger in a
//! sketch until its era rolls off the ring, but the ring itself never grows.

mod atomic_bucket;
mod audit;
mod cms;
mod config;
mod decimal;
mod dedup;
mod error;
mod facade;
mod hll;
mod intern;
mod ring_buffer;
mod rolling_cms;
mod rolling_hll;
mod shard;
mod topk;

pub use atomic_bucket::AtomicBucket;
pub use audit::{AuditEntry, AuditLog, OpKind};
pub use cms::CountMinSketch;
pub use config::AnalyticsConfig;
pub use decimal::Tick;
pub use dedup::DedupCache;
pub use error::ConfigError;
pub use facade::Analytics;
pub use hll::HyperLogLog;
pub use intern::{Interned, Interner};
pub use ring_buffer::RingBuffer;
pub use rolling_cms::RollingCMS;
pub use rolling_hll::RollingHLL;
pub use shard::ShardedLockMap;
pub use topk::BoundedTopK;
