//! # meshsink-analytics
//!
//! Topology analytics over the persisted record set: relay-candidate
//! matching and multi-source hop-distance computation.
//!
//! Both algorithms are read-only and recomputed per call from a
//! point-in-time snapshot of the store (a fetched slice of records);
//! nothing here caches across calls or writes back.

mod hops;
mod relay;

pub use hops::{HopGraph, HopNode, HopReport};
pub use relay::{relay_stats, relay_stats_for_node, RelayStat};
