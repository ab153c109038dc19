//! # meshsink-store
//!
//! SQLite persistence for the meshsink capture pipeline: append-only
//! packet records, upserted node records, retention sweeps, and the
//! filtered read interface consumed by downstream reporting.
//!
//! All access to a [`Store`] serializes through one mutex around the
//! SQLite connection. Readers take point-in-time snapshots; writers
//! hold the lock only for their own statement.

mod error;
mod node_id;
mod records;
mod store;

pub use error::StoreError;
pub use node_id::{format_node_id, parse_node_id};
pub use records::{NodePatch, NodeRecord, PacketRecord};
pub use store::{PacketFilter, RetentionSweep, SortDir, SortKey, Store};
