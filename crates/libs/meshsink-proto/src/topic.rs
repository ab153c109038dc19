//! Channel-name extraction from MQTT delivery topics.

/// Extract the channel name from a delivery topic.
///
/// Topics follow `prefix/region/version/{e|c}/channel-name/!nodehex`.
/// The fifth segment (index 4) is the candidate channel name, unless it
/// is one of the reserved mode tokens ("e"/"c") or starts with the
/// node-identity marker '!' — then the packet belongs to the primary
/// (unnamed) channel. Shorter topics are primary as well.
///
/// The token rule is a positional heuristic inherited from the gateway
/// firmware; it is preserved as-is rather than generalized.
pub fn channel_from_topic(topic: &str) -> &str {
    let segments: Vec<&str> = topic.split('/').collect();
    if segments.len() < 5 {
        return "";
    }
    let candidate = segments[4];
    if candidate == "e" || candidate == "c" || candidate.starts_with('!') {
        return "";
    }
    candidate
}
