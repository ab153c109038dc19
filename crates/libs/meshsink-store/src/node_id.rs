//! Node identity string handling.
//!
//! Nodes are addressed by a 32-bit integer; the wire and the read
//! interface also use the `!xxxxxxxx` hexadecimal form.

use crate::error::StoreError;

/// Canonical hexadecimal form of a node identity.
pub fn format_node_id(num: u32) -> String {
    format!("!{num:08x}")
}

/// Parse a node identity in decimal or `!hex` form.
///
/// Malformed input is a typed rejection so callers can distinguish bad
/// requests from unknown-but-valid identities.
pub fn parse_node_id(input: &str) -> Result<u32, StoreError> {
    let bad = || StoreError::BadNodeId(input.to_string());

    if let Some(hex) = input.strip_prefix('!') {
        if hex.is_empty() || hex.len() > 8 {
            return Err(bad());
        }
        return u32::from_str_radix(hex, 16).map_err(|_| bad());
    }
    input.parse::<u32>().map_err(|_| bad())
}
