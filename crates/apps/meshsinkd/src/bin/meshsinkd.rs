use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};

use meshsink_analytics::{relay_stats, HopGraph};
use meshsink_store::{PacketFilter, Store};

use meshsinkd::config::CaptureConfig;
use meshsinkd::session::{self, CaptureSession, SessionOutcome};

#[derive(Parser, Debug)]
#[command(name = "meshsinkd", version, about = "Mesh telemetry capture daemon")]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/meshsink/config.toml")]
    config: PathBuf,

    /// Database path (overrides the configured one)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = match CaptureConfig::from_path(&args.config) {
        Ok(config) => config,
        Err(err) => {
            error!("cannot load config {}: {err}", args.config.display());
            std::process::exit(2);
        }
    };

    let db_path = args.db.unwrap_or_else(|| config.db_path.clone());
    let store = match Store::open(&db_path) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            error!("cannot open database {}: {err}", db_path.display());
            std::process::exit(2);
        }
    };
    info!("capture database at {}", db_path.display());

    spawn_retention_task(
        Arc::clone(&store),
        config.retention_hours,
        config.sweep_interval_secs,
    );

    let session = CaptureSession::new(config.mqtt, config.channel_key, Arc::clone(&store));
    match session.run().await {
        SessionOutcome::CleanShutdown => info!("session closed cleanly"),
        SessionOutcome::GivenUp => {
            // Terminal for this session; let the supervisor restart us.
            std::process::exit(1);
        }
    }
}

fn spawn_retention_task(store: Arc<Store>, retention_hours: u64, sweep_interval_secs: u64) {
    if retention_hours == 0 {
        info!("retention disabled (window = 0)");
        return;
    }

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(sweep_interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.retain(retention_hours, session::unix_now()) {
                Ok(sweep) => {
                    info!(
                        "retention sweep: {} packets, {} nodes deleted",
                        sweep.packets_deleted, sweep.nodes_deleted
                    );
                    log_topology_summary(&store);
                }
                Err(err) => warn!("retention sweep failed: {err}"),
            }
        }
    });
}

/// Post-sweep snapshot of what the analytics see, for the operator log.
fn log_topology_summary(store: &Store) {
    let packets = match store.query_packets(&PacketFilter::default()) {
        Ok(packets) => packets,
        Err(err) => {
            warn!("topology summary skipped: {err}");
            return;
        }
    };
    let nodes = match store.list_nodes() {
        Ok(nodes) => nodes,
        Err(err) => {
            warn!("topology summary skipped: {err}");
            return;
        }
    };

    let gateways: Vec<u32> = {
        let mut seen: Vec<u32> = packets.iter().map(|p| p.gateway).collect();
        seen.sort_unstable();
        seen.dedup();
        seen
    };
    let graph = HopGraph::from_records(&packets, &nodes);
    let reachable = graph.distances_from(&gateways).len();

    let stats = relay_stats(&packets, &nodes);
    let top_relay = stats
        .first()
        .map(|s| format!("0x{:02x} ({} packets)", s.relay_byte, s.count))
        .unwrap_or_else(|| "none".to_string());

    info!(
        "topology: {} packets, {} nodes, {} reachable from {} gateway(s), top relay byte {}",
        packets.len(),
        nodes.len(),
        reachable,
        gateways.len(),
        top_relay
    );
}
