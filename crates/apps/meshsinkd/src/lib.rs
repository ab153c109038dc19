//! Capture daemon internals: configuration, MQTT session, ingestion.
//!
//! The binary entry point lives in `src/bin/meshsinkd.rs`; these
//! modules are a library so integration tests can drive the ingest
//! path without a broker.

pub mod config;
pub mod ingest;
pub mod session;
