//! Application port numbers carried by decoded payloads.

/// Application ports observed on the mesh.
///
/// Only the ports the capture pipeline extracts structured content from
/// get their own variant; everything else is kept as `Unknown` with the
/// raw bytes preserved in the owning packet record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PortNum {
    Unknown = 0,
    TextMessage = 1,
    Position = 3,
    NodeInfo = 4,
    Routing = 5,
    Telemetry = 67,
    Traceroute = 70,
}

impl PortNum {
    /// Convert from the raw wire value. Unrecognized ports map to
    /// `Unknown` rather than failing; the capture pipeline stores them
    /// with their raw payload.
    pub fn from_wire(value: u16) -> Self {
        match value {
            1 => Self::TextMessage,
            3 => Self::Position,
            4 => Self::NodeInfo,
            5 => Self::Routing,
            67 => Self::Telemetry,
            70 => Self::Traceroute,
            _ => Self::Unknown,
        }
    }

    /// Symbolic name used by the read interface.
    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::TextMessage => "text",
            Self::Position => "position",
            Self::NodeInfo => "nodeinfo",
            Self::Routing => "routing",
            Self::Telemetry => "telemetry",
            Self::Traceroute => "traceroute",
        }
    }
}
