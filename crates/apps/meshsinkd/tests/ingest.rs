use std::sync::Arc;

use meshsink_proto::payload::{encode, NodeInfo, Position};
use meshsink_proto::wire::{DataFrame, Envelope, EnvelopeBody};
use meshsink_proto::{crypt, keys, PortNum, BROADCAST_ADDR, WIRE_VERSION};
use meshsink_store::{PacketFilter, Store};
use meshsinkd::ingest::{handle_publish, IngestOutcome};

const KEY_B64: &str = "AQIDBAUGBwgJCgsMDQ4PEBESExQVFhcYGRobHB0eHyA=";
const TOPIC: &str = "msh/EU_868/2/e/LongFast/!0badcafe";

fn envelope(from_node: u32, packet_id: u32, body: EnvelopeBody) -> Envelope {
    Envelope {
        version: WIRE_VERSION,
        from_node,
        to_node: BROADCAST_ADDR,
        packet_id,
        gateway: 0x0BAD_CAFE,
        relay_node: None,
        rssi: Some(-92),
        snr: Some(4.75),
        hops: Some((3, 3)),
        body,
    }
}

fn text_body(text: &str) -> EnvelopeBody {
    EnvelopeBody::Data(DataFrame {
        port: PortNum::TextMessage as u16,
        payload: text.as_bytes().to_vec(),
    })
}

fn encrypted_body(env: &Envelope, frame: &DataFrame, channel: &str) -> EnvelopeBody {
    let key = keys::derive_channel_key(KEY_B64, channel);
    EnvelopeBody::Encrypted(crypt::encrypt(
        &frame.encode(),
        u64::from(env.packet_id),
        u64::from(env.from_node),
        &key,
    ))
}

#[test]
fn plaintext_publish_is_stored_decoded() {
    let store = Arc::new(Store::in_memory().expect("store"));
    let env = envelope(0x7AA6_FBEC, 1, text_body("hello mesh"));

    let outcome =
        handle_publish(&store, KEY_B64, TOPIC, &env.encode(), 1_000).expect("ingest");
    assert_eq!(outcome, IngestOutcome::Stored { decoded: true });

    let packets = store.query_packets(&PacketFilter::default()).expect("query");
    assert_eq!(packets.len(), 1);
    let packet = &packets[0];
    assert!(packet.decoded);
    assert_eq!(packet.port, PortNum::TextMessage);
    assert_eq!(packet.payload, b"hello mesh");
    assert_eq!(packet.channel, "LongFast");
    assert_eq!(packet.rssi, Some(-92));

    // Sender and gateway both get node records.
    assert!(store.get_node("!7aa6fbec").expect("get").is_some());
    assert!(store.get_node("!0badcafe").expect("get").is_some());
}

#[test]
fn encrypted_publish_decrypts_and_stores_plaintext() {
    let store = Arc::new(Store::in_memory().expect("store"));
    let mut env = envelope(0x7AA6_FBEC, 7, text_body(""));
    let frame =
        DataFrame { port: PortNum::TextMessage as u16, payload: b"secret route".to_vec() };
    env.body = encrypted_body(&env, &frame, "LongFast");

    let outcome =
        handle_publish(&store, KEY_B64, TOPIC, &env.encode(), 1_000).expect("ingest");
    assert_eq!(outcome, IngestOutcome::Stored { decoded: true });

    let packets = store.query_packets(&PacketFilter::default()).expect("query");
    assert_eq!(packets[0].payload, b"secret route");
}

#[test]
fn wrong_key_stores_undecoded_ciphertext() {
    let store = Arc::new(Store::in_memory().expect("store"));
    let mut env = envelope(0x7AA6_FBEC, 9, text_body(""));
    let frame = DataFrame { port: PortNum::TextMessage as u16, payload: b"secret".to_vec() };
    env.body = encrypted_body(&env, &frame, "LongFast");

    let wrong_key = "////////////////////////////////////////////";
    let outcome =
        handle_publish(&store, wrong_key, TOPIC, &env.encode(), 1_000).expect("ingest");
    assert_eq!(outcome, IngestOutcome::Stored { decoded: false });

    let packets = store.query_packets(&PacketFilter::default()).expect("query");
    assert!(!packets[0].decoded);
    assert_eq!(packets[0].port, PortNum::Unknown);
    assert_eq!(packets[0].port_name, "unknown");
}

#[test]
fn garbage_bytes_are_dropped_not_fatal() {
    let store = Arc::new(Store::in_memory().expect("store"));
    let outcome =
        handle_publish(&store, KEY_B64, TOPIC, &[0xFF, 0x00, 0x01], 1_000).expect("ingest");
    assert_eq!(outcome, IngestOutcome::Unparseable);
    assert!(store.query_packets(&PacketFilter::default()).expect("query").is_empty());

    // The pipeline keeps working afterwards.
    let env = envelope(1, 2, text_body("still alive"));
    let outcome = handle_publish(&store, KEY_B64, TOPIC, &env.encode(), 1_001).expect("ingest");
    assert_eq!(outcome, IngestOutcome::Stored { decoded: true });
}

#[test]
fn redelivery_is_deduplicated() {
    let store = Arc::new(Store::in_memory().expect("store"));
    let env = envelope(0x7AA6_FBEC, 42, text_body("once"));

    assert_eq!(
        handle_publish(&store, KEY_B64, TOPIC, &env.encode(), 1_000).expect("ingest"),
        IngestOutcome::Stored { decoded: true }
    );
    assert_eq!(
        handle_publish(&store, KEY_B64, TOPIC, &env.encode(), 1_005).expect("ingest"),
        IngestOutcome::Duplicate
    );
    assert_eq!(store.query_packets(&PacketFilter::default()).expect("query").len(), 1);
}

#[test]
fn node_info_payload_refreshes_node_metadata() {
    let store = Arc::new(Store::in_memory().expect("store"));
    let info = NodeInfo {
        long_name: "Hilltop Repeater".to_string(),
        short_name: "HILL".to_string(),
        hw_model: 9,
        role: 2,
    };
    let env = envelope(
        0x7AA6_FBEC,
        50,
        EnvelopeBody::Data(DataFrame {
            port: PortNum::NodeInfo as u16,
            payload: encode::node_info(&info),
        }),
    );
    handle_publish(&store, KEY_B64, TOPIC, &env.encode(), 1_000).expect("ingest");

    let node = store.get_node("!7aa6fbec").expect("get").expect("exists");
    assert_eq!(node.long_name.as_deref(), Some("Hilltop Repeater"));
    assert_eq!(node.short_name.as_deref(), Some("HILL"));
    assert_eq!(node.hw_model, Some(9));
}

#[test]
fn position_payload_updates_last_known_position() {
    let store = Arc::new(Store::in_memory().expect("store"));
    let pos = Position { latitude_i: 520_817_000, longitude_i: 44_210_000, altitude: 12 };
    let env = envelope(
        0x7AA6_FBEC,
        51,
        EnvelopeBody::Data(DataFrame {
            port: PortNum::Position as u16,
            payload: encode::position(&pos),
        }),
    );
    handle_publish(&store, KEY_B64, TOPIC, &env.encode(), 1_000).expect("ingest");

    let node = store.get_node("!7aa6fbec").expect("get").expect("exists");
    let latitude = node.latitude.expect("latitude");
    assert!((latitude - 52.0817).abs() < 1e-6);
    assert_eq!(node.altitude, Some(12));
}
