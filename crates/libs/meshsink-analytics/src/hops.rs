//! Hop-distance graph: inferred links plus multi-source BFS.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use meshsink_proto::payload::AppPayload;
use meshsink_proto::PortNum;
use meshsink_store::{NodeRecord, PacketRecord};
use serde::Serialize;

/// Undirected unit-weight link graph inferred from the record set.
#[derive(Debug, Clone, Default)]
pub struct HopGraph {
    adjacency: BTreeMap<u32, BTreeSet<u32>>,
}

/// One node of a hop report. `distance` is `None` when no path to any
/// source exists; a synthetic distance is never reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HopNode {
    pub num: u32,
    pub distance: Option<u32>,
}

/// Graph data for map rendering: node set, edge set, per-node minimum
/// hop count to any designated source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HopReport {
    pub nodes: Vec<HopNode>,
    pub edges: Vec<(u32, u32)>,
}

impl HopGraph {
    /// Build the link graph from a snapshot of the record set.
    ///
    /// Edges come from two observations:
    /// - traceroute route adjacencies: consecutive pairs along
    ///   sender → intermediates → destination;
    /// - direct reception: a gateway heard the sender with no relay.
    ///
    /// Only links between known nodes count; a route hop through an
    /// identity we have no node record for breaks the chain there.
    /// Every known node is registered even when no link survives, so
    /// reports carry an explicit no-path entry instead of omitting the
    /// node.
    pub fn from_records(packets: &[PacketRecord], nodes: &[NodeRecord]) -> Self {
        let known: BTreeSet<u32> = nodes.iter().map(|n| n.num).collect();
        let mut graph = Self::default();
        for &num in &known {
            graph.adjacency.entry(num).or_default();
        }

        for packet in packets {
            if packet.heard_directly() && packet.gateway != packet.from_node {
                graph.add_known_edge(packet.gateway, packet.from_node, &known);
            }

            if packet.port != PortNum::Traceroute || !packet.decoded {
                continue;
            }
            let Some(AppPayload::Traceroute(rd)) =
                AppPayload::parse(PortNum::Traceroute, &packet.payload)
            else {
                continue;
            };

            let mut chain = Vec::with_capacity(rd.route.len() + 2);
            chain.push(packet.from_node);
            chain.extend_from_slice(&rd.route);
            chain.push(packet.to_node);
            for pair in chain.windows(2) {
                graph.add_known_edge(pair[0], pair[1], &known);
            }
        }
        graph
    }

    pub fn add_edge(&mut self, a: u32, b: u32) {
        if a == b {
            return;
        }
        self.adjacency.entry(a).or_default().insert(b);
        self.adjacency.entry(b).or_default().insert(a);
    }

    fn add_known_edge(&mut self, a: u32, b: u32, known: &BTreeSet<u32>) {
        if known.contains(&a) && known.contains(&b) {
            self.add_edge(a, b);
        }
    }

    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Edges as ordered pairs (low identity first), deduplicated.
    pub fn edges(&self) -> Vec<(u32, u32)> {
        let mut edges = Vec::new();
        for (&a, neighbors) in &self.adjacency {
            for &b in neighbors {
                if a < b {
                    edges.push((a, b));
                }
            }
        }
        edges
    }

    /// Minimum hop count from any source, for every reachable node.
    ///
    /// One breadth-first traversal seeded with all sources at distance
    /// zero, rather than one traversal per node; the batched pass is
    /// what keeps large record sets tractable. Nodes absent from the
    /// result have no path to any source.
    pub fn distances_from(&self, sources: &[u32]) -> HashMap<u32, u32> {
        let mut distances: HashMap<u32, u32> = HashMap::new();
        let mut frontier: VecDeque<u32> = VecDeque::new();

        for &source in sources {
            if distances.insert(source, 0).is_none() {
                frontier.push_back(source);
            }
        }

        while let Some(current) = frontier.pop_front() {
            let next_distance = distances[&current] + 1;
            let Some(neighbors) = self.adjacency.get(&current) else { continue };
            for &neighbor in neighbors {
                if !distances.contains_key(&neighbor) {
                    distances.insert(neighbor, next_distance);
                    frontier.push_back(neighbor);
                }
            }
        }
        distances
    }

    /// Full report over the graph's node set plus the sources.
    pub fn report(&self, sources: &[u32]) -> HopReport {
        let distances = self.distances_from(sources);

        let mut nums: BTreeSet<u32> = self.adjacency.keys().copied().collect();
        nums.extend(sources.iter().copied());

        let nodes = nums
            .into_iter()
            .map(|num| HopNode { num, distance: distances.get(&num).copied() })
            .collect();
        HopReport { nodes, edges: self.edges() }
    }
}
