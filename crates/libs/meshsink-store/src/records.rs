//! Persisted record types.

use meshsink_proto::PortNum;
use serde::Serialize;

/// One observed wire message, as persisted. Immutable once stored;
/// removed only by retention.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketRecord {
    /// Receive timestamp, unix seconds. Non-negative.
    pub rx_time: i64,
    /// MQTT topic the envelope arrived on.
    pub topic: String,
    pub from_node: u32,
    pub to_node: u32,
    #[serde(skip)]
    pub port: PortNum,
    /// Symbolic port name, for the read interface.
    pub port_name: String,
    /// Node whose direct reception delivered this packet to us.
    pub gateway: u32,
    /// Channel name; empty for the primary channel.
    pub channel: String,
    /// Low 8 bits of the relaying node's identity, when one relayed.
    pub relay_node: Option<u8>,
    /// Payload bytes: decoded plaintext, or the ciphertext when decode
    /// failed.
    pub payload: Vec<u8>,
    pub decoded: bool,
    /// Wire-level packet identity. With `from_node`, this is the dedup
    /// key and the decryption nonce input.
    pub packet_id: u32,
    pub rssi: Option<i32>,
    pub snr: Option<f32>,
    pub hop_start: Option<u8>,
    pub hop_limit: Option<u8>,
}

impl PacketRecord {
    /// Whether the gateway heard the sender directly (no relay hop).
    pub fn heard_directly(&self) -> bool {
        self.relay_node.is_none()
    }

    /// Text content for display, truncated to the read-interface
    /// limit. `None` for non-text or undecoded packets; storage keeps
    /// the full payload either way.
    pub fn display_text(&self) -> Option<String> {
        if self.port != PortNum::TextMessage || !self.decoded {
            return None;
        }
        std::str::from_utf8(&self.payload)
            .ok()
            .map(meshsink_proto::payload::truncate_text)
    }
}

/// One known node. Created when first referenced; mutable fields are
/// refreshed in place as packets reveal metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    pub num: u32,
    pub hex_id: String,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub hw_model: Option<u8>,
    pub role: Option<u8>,
    pub first_seen: i64,
    pub updated: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<i32>,
}

impl NodeRecord {
    /// Low 8 bits of the identity; the relay-byte matching key.
    pub fn low_byte(&self) -> u8 {
        (self.num & 0xFF) as u8
    }
}

/// Partial node update carried by a packet. Absent fields leave the
/// stored values untouched.
#[derive(Debug, Clone, Default)]
pub struct NodePatch {
    pub num: u32,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub hw_model: Option<u8>,
    pub role: Option<u8>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<i32>,
}

impl NodePatch {
    pub fn seen(num: u32) -> Self {
        Self { num, ..Self::default() }
    }
}
