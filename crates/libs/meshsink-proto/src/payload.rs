//! Structured application payloads extracted from decoded data frames.

use crate::ports::PortNum;

/// Display truncation limit for text payloads, in code points.
pub const TEXT_DISPLAY_LIMIT: usize = 100;

/// Structured content extracted from a decoded data frame.
///
/// Parsing is best-effort: a payload that does not match its port's
/// expected shape yields `None` and the raw bytes stay on the packet
/// record. Ports without structured extraction (telemetry, routing)
/// always yield `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum AppPayload {
    Text(String),
    Position(Position),
    NodeInfo(NodeInfo),
    Traceroute(RouteDiscovery),
}

/// Last-known position report. Coordinates are integer degrees scaled
/// by 1e7, as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub latitude_i: i32,
    pub longitude_i: i32,
    pub altitude: i32,
}

impl Position {
    pub fn latitude(&self) -> f64 {
        f64::from(self.latitude_i) / 1e7
    }

    pub fn longitude(&self) -> f64 {
        f64::from(self.longitude_i) / 1e7
    }
}

/// Node metadata broadcast by the node itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    pub long_name: String,
    pub short_name: String,
    pub hw_model: u8,
    pub role: u8,
}

/// An observed route between two nodes, with per-hop SNR where the
/// intermediate radios reported it. SNR is carried as quarter-dB.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDiscovery {
    pub route: Vec<u32>,
    pub snr_towards: Vec<f32>,
}

impl AppPayload {
    /// Parse the structured content for a port, if the port has one and
    /// the bytes match its shape.
    pub fn parse(port: PortNum, data: &[u8]) -> Option<Self> {
        match port {
            PortNum::TextMessage => {
                String::from_utf8(data.to_vec()).ok().map(AppPayload::Text)
            }
            PortNum::Position => parse_position(data).map(AppPayload::Position),
            PortNum::NodeInfo => parse_node_info(data).map(AppPayload::NodeInfo),
            PortNum::Traceroute => parse_route_discovery(data).map(AppPayload::Traceroute),
            PortNum::Routing | PortNum::Telemetry | PortNum::Unknown => None,
        }
    }
}

fn parse_position(data: &[u8]) -> Option<Position> {
    if data.len() != 12 {
        return None;
    }
    Some(Position {
        latitude_i: i32::from_le_bytes(data[0..4].try_into().ok()?),
        longitude_i: i32::from_le_bytes(data[4..8].try_into().ok()?),
        altitude: i32::from_le_bytes(data[8..12].try_into().ok()?),
    })
}

fn parse_node_info(data: &[u8]) -> Option<NodeInfo> {
    let (long_name, rest) = take_string(data)?;
    let (short_name, rest) = take_string(rest)?;
    if rest.len() != 2 {
        return None;
    }
    Some(NodeInfo { long_name, short_name, hw_model: rest[0], role: rest[1] })
}

fn parse_route_discovery(data: &[u8]) -> Option<RouteDiscovery> {
    let (&count, rest) = data.split_first()?;
    let route_len = usize::from(count) * 4;
    if rest.len() < route_len {
        return None;
    }
    let (route_bytes, rest) = rest.split_at(route_len);
    let route = route_bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    let (&snr_count, snr_bytes) = rest.split_first()?;
    if snr_bytes.len() != usize::from(snr_count) {
        return None;
    }
    let snr_towards = snr_bytes.iter().map(|&b| f32::from(b as i8) / 4.0).collect();

    Some(RouteDiscovery { route, snr_towards })
}

fn take_string(data: &[u8]) -> Option<(String, &[u8])> {
    let (&len, rest) = data.split_first()?;
    if rest.len() < usize::from(len) {
        return None;
    }
    let (bytes, rest) = rest.split_at(usize::from(len));
    Some((String::from_utf8(bytes.to_vec()).ok()?, rest))
}

/// Encode helpers for the structured payloads. Used by test fixtures
/// and replay tooling; the capture pipeline itself only decodes.
pub mod encode {
    use super::{NodeInfo, Position, RouteDiscovery};

    pub fn position(pos: &Position) -> Vec<u8> {
        let mut buf = Vec::with_capacity(12);
        buf.extend_from_slice(&pos.latitude_i.to_le_bytes());
        buf.extend_from_slice(&pos.longitude_i.to_le_bytes());
        buf.extend_from_slice(&pos.altitude.to_le_bytes());
        buf
    }

    pub fn node_info(info: &NodeInfo) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(info.long_name.len() as u8);
        buf.extend_from_slice(info.long_name.as_bytes());
        buf.push(info.short_name.len() as u8);
        buf.extend_from_slice(info.short_name.as_bytes());
        buf.push(info.hw_model);
        buf.push(info.role);
        buf
    }

    pub fn route_discovery(rd: &RouteDiscovery) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.push(rd.route.len() as u8);
        for hop in &rd.route {
            buf.extend_from_slice(&hop.to_le_bytes());
        }
        buf.push(rd.snr_towards.len() as u8);
        for snr in &rd.snr_towards {
            buf.push((snr * 4.0) as i8 as u8);
        }
        buf
    }
}

/// Truncate a text payload for display. Storage keeps full content;
/// this is applied by readers only.
pub fn truncate_text(text: &str) -> String {
    if text.chars().count() <= TEXT_DISPLAY_LIMIT {
        return text.to_string();
    }
    let mut out: String = text.chars().take(TEXT_DISPLAY_LIMIT).collect();
    out.push('…');
    out
}
