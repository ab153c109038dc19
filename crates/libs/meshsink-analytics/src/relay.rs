//! Relay-candidate matching.
//!
//! Packets record only the low 8 bits of the node that relayed them.
//! Grouping those bytes and matching them against known node
//! identities narrows each group to a list of candidate relays.

use std::collections::{BTreeMap, BTreeSet};

use meshsink_store::{NodeRecord, PacketRecord};
use serde::Serialize;

/// Aggregate statistics for one relay-byte value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayStat {
    pub relay_byte: u8,
    pub count: u64,
    pub mean_rssi: Option<f64>,
    pub mean_snr: Option<f64>,
    /// Known nodes whose identity ends in `relay_byte` and for which
    /// zero-hop evidence exists, ascending by identity.
    pub candidates: Vec<u32>,
}

#[derive(Default)]
struct Accumulator {
    count: u64,
    rssi_sum: f64,
    rssi_n: u64,
    snr_sum: f64,
    snr_n: u64,
}

/// Compute relay statistics over a snapshot of the record set.
///
/// Groups are ordered by descending count, then ascending relay byte,
/// so repeated calls on unchanged data return identical output.
pub fn relay_stats(packets: &[PacketRecord], nodes: &[NodeRecord]) -> Vec<RelayStat> {
    let mut groups: BTreeMap<u8, Accumulator> = BTreeMap::new();
    for packet in packets {
        let Some(byte) = packet.relay_node else { continue };
        let acc = groups.entry(byte).or_default();
        acc.count += 1;
        if let Some(rssi) = packet.rssi {
            acc.rssi_sum += f64::from(rssi);
            acc.rssi_n += 1;
        }
        if let Some(snr) = packet.snr {
            acc.snr_sum += f64::from(snr);
            acc.snr_n += 1;
        }
    }

    // Zero-hop corroboration: senders we have heard without any relay.
    let direct_senders: BTreeSet<u32> =
        packets.iter().filter(|p| p.heard_directly()).map(|p| p.from_node).collect();

    let mut stats: Vec<RelayStat> = groups
        .into_iter()
        .map(|(relay_byte, acc)| {
            let candidates = nodes
                .iter()
                .filter(|node| node.low_byte() == relay_byte)
                .filter(|node| direct_senders.contains(&node.num))
                .map(|node| node.num)
                .collect::<BTreeSet<u32>>()
                .into_iter()
                .collect();
            RelayStat {
                relay_byte,
                count: acc.count,
                mean_rssi: mean(acc.rssi_sum, acc.rssi_n),
                mean_snr: mean(acc.snr_sum, acc.snr_n),
                candidates,
            }
        })
        .collect();

    stats.sort_by(|a, b| b.count.cmp(&a.count).then(a.relay_byte.cmp(&b.relay_byte)));
    stats
}

/// Relay statistics restricted to one node: the groups whose relay
/// byte equals the node's low identity byte.
pub fn relay_stats_for_node(
    packets: &[PacketRecord],
    nodes: &[NodeRecord],
    node_num: u32,
) -> Vec<RelayStat> {
    let byte = (node_num & 0xFF) as u8;
    relay_stats(packets, nodes)
        .into_iter()
        .filter(|stat| stat.relay_byte == byte)
        .collect()
}

fn mean(sum: f64, n: u64) -> Option<f64> {
    (n > 0).then(|| sum / n as f64)
}
