//! Publish handling: envelope decode, record mapping, node upserts.

use log::debug;
use meshsink_proto::payload::AppPayload;
use meshsink_proto::{decode_body, Envelope};
use meshsink_store::{NodePatch, PacketRecord, Store, StoreError};

/// What became of one inbound publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Stored { decoded: bool },
    /// Redelivery of an already-stored wire packet.
    Duplicate,
    /// The envelope itself did not parse; nothing to store.
    Unparseable,
}

/// Ingest one inbound MQTT publish.
///
/// Decode failures of any kind degrade rather than error: an envelope
/// that parses but whose payload cannot be decoded is stored with
/// `decoded = false`; an envelope that does not parse at all is
/// dropped with a debug log. Only storage failures propagate.
pub fn handle_publish(
    store: &Store,
    channel_key: &str,
    topic: &str,
    bytes: &[u8],
    now: i64,
) -> Result<IngestOutcome, StoreError> {
    let envelope = match Envelope::decode(bytes) {
        Ok(envelope) => envelope,
        Err(err) => {
            debug!("unparseable envelope on {topic} ({err}): {}", hex_snippet(bytes, 16));
            return Ok(IngestOutcome::Unparseable);
        }
    };

    let body = decode_body(&envelope, topic, channel_key);
    if !body.decoded {
        debug!(
            "undecoded payload from !{:08x} id {} on {topic}",
            envelope.from_node, envelope.packet_id
        );
    }

    let record = PacketRecord {
        rx_time: now,
        topic: topic.to_string(),
        from_node: envelope.from_node,
        to_node: envelope.to_node,
        port: body.port,
        port_name: body.port.name().to_string(),
        gateway: envelope.gateway,
        channel: body.channel,
        relay_node: envelope.relay_node,
        payload: body.payload.clone(),
        decoded: body.decoded,
        packet_id: envelope.packet_id,
        rssi: envelope.rssi.map(i32::from),
        snr: envelope.snr,
        hop_start: envelope.hops.map(|(start, _)| start),
        hop_limit: envelope.hops.map(|(_, limit)| limit),
    };

    if !store.insert_packet(&record)? {
        debug!("duplicate packet !{:08x}/{}", record.from_node, record.packet_id);
        return Ok(IngestOutcome::Duplicate);
    }

    store.upsert_node(&sender_patch(&record, body.decoded), now)?;
    if envelope.gateway != envelope.from_node {
        store.upsert_node(&NodePatch::seen(envelope.gateway), now)?;
    }

    Ok(IngestOutcome::Stored { decoded: body.decoded })
}

/// Node metadata revealed by the packet, beyond the bare sighting.
fn sender_patch(record: &PacketRecord, decoded: bool) -> NodePatch {
    let mut patch = NodePatch::seen(record.from_node);
    if !decoded {
        return patch;
    }
    match AppPayload::parse(record.port, &record.payload) {
        Some(AppPayload::NodeInfo(info)) => {
            patch.long_name = Some(info.long_name);
            patch.short_name = Some(info.short_name);
            patch.hw_model = Some(info.hw_model);
            patch.role = Some(info.role);
        }
        Some(AppPayload::Position(pos)) => {
            patch.latitude = Some(pos.latitude());
            patch.longitude = Some(pos.longitude());
            patch.altitude = Some(pos.altitude);
        }
        _ => {}
    }
    patch
}

fn hex_snippet(data: &[u8], max: usize) -> String {
    if data.len() <= max {
        hex::encode(data)
    } else {
        format!("{}…", hex::encode(&data[..max]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_truncates_long_payloads() {
        assert_eq!(hex_snippet(&[0xAB, 0xCD], 16), "abcd");
        let long = vec![0u8; 40];
        let snippet = hex_snippet(&long, 16);
        assert_eq!(snippet.chars().count(), 33);
        assert!(snippet.ends_with('…'));
    }
}
