//! # meshsink-proto
//!
//! Wire protocol envelope, channel key derivation, and payload decryption
//! for the meshsink telemetry capture pipeline.
//!
//! This crate implements the binary envelope published by mesh gateways
//! over MQTT. An envelope carries the sender, destination, and packet
//! identity plus reception metadata, and either a plaintext application
//! payload or an encrypted segment. Channel-encrypted segments are
//! AES-256-CTR, keyed per channel name (see [`keys`]) with a nonce built
//! from the packet and sender identities (see [`crypt`]).
//!
//! ## Wire Format v1
//!
//! ```text
//! [version:1][flags:1][from:4][to:4][packet_id:4][gateway:4]
//! [relay:0|1][rssi:0|2][snr:0|4][hops:0|2]
//! [body: port:2 + len:2 + bytes  |  len:2 + encrypted bytes]
//! ```
//!
//! All multi-byte integers are little-endian. Flag bits select which
//! optional reception-metadata fields are present and whether the body
//! is an encrypted segment.

pub mod crypt;
pub mod decode;
pub mod keys;
pub mod payload;
pub mod ports;
pub mod topic;
pub mod wire;

pub use decode::{decode_body, DecodedBody};
pub use ports::PortNum;
pub use wire::{Envelope, EnvelopeBody, WireError};

/// Current wire format version.
pub const WIRE_VERSION: u8 = 0x01;

/// Reserved destination meaning "all nodes".
pub const BROADCAST_ADDR: u32 = 0xFFFF_FFFF;
