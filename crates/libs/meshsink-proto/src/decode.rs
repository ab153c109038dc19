//! Envelope body decoding: plaintext first, then decrypt-and-reparse.

use crate::crypt;
use crate::keys;
use crate::ports::PortNum;
use crate::topic::channel_from_topic;
use crate::wire::{DataFrame, Envelope, EnvelopeBody};

/// Result of running the decode pipeline over an envelope body.
///
/// `decoded == false` is a normal outcome (wrong key, unknown port,
/// malformed inner frame); the payload then holds whatever bytes we
/// have, possibly still encrypted.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBody {
    pub port: PortNum,
    pub payload: Vec<u8>,
    pub decoded: bool,
    /// Channel name the key was derived from; empty for primary.
    pub channel: String,
}

/// Decode an envelope body.
///
/// Plaintext data frames are taken as-is. Encrypted segments get a key
/// derived from the topic's channel name and are decrypted and reparsed
/// as a data frame. Every failure path degrades to an undecoded body
/// rather than an error; ingestion never stops on a bad packet.
pub fn decode_body(envelope: &Envelope, topic: &str, base_key_b64: &str) -> DecodedBody {
    let channel = channel_from_topic(topic).to_string();

    match &envelope.body {
        EnvelopeBody::Data(frame) => {
            let port = PortNum::from_wire(frame.port);
            DecodedBody {
                port,
                payload: frame.payload.clone(),
                decoded: port != PortNum::Unknown,
                channel,
            }
        }
        EnvelopeBody::Encrypted(ciphertext) => {
            let key = keys::derive_channel_key(base_key_b64, &channel);
            let plaintext = crypt::decrypt(
                ciphertext,
                u64::from(envelope.packet_id),
                u64::from(envelope.from_node),
                &key,
            );

            match DataFrame::decode(&plaintext) {
                Ok(frame) => {
                    let port = PortNum::from_wire(frame.port);
                    DecodedBody {
                        port,
                        payload: frame.payload,
                        decoded: port != PortNum::Unknown,
                        channel,
                    }
                }
                // Wrong key or garbage: keep the ciphertext for the record.
                Err(_) => DecodedBody {
                    port: PortNum::Unknown,
                    payload: ciphertext.clone(),
                    decoded: false,
                    channel,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WIRE_VERSION;

    const KEY_B64: &str = "AQIDBAUGBwgJCgsMDQ4PEBESExQVFhcYGRobHB0eHyA=";
    const TOPIC: &str = "msh/EU_868/2/e/LongFast/!7aa6fbec";

    fn envelope(body: EnvelopeBody) -> Envelope {
        Envelope {
            version: WIRE_VERSION,
            from_node: 0x7AA6_FBEC,
            to_node: crate::BROADCAST_ADDR,
            packet_id: 42,
            gateway: 0x0BAD_CAFE,
            relay_node: None,
            rssi: None,
            snr: None,
            hops: None,
            body,
        }
    }

    fn encrypted_text(text: &str, env: &Envelope, channel: &str) -> Vec<u8> {
        let frame = DataFrame { port: PortNum::TextMessage as u16, payload: text.into() };
        let key = keys::derive_channel_key(KEY_B64, channel);
        crypt::encrypt(&frame.encode(), u64::from(env.packet_id), u64::from(env.from_node), &key)
    }

    #[test]
    fn plaintext_frame_decodes_directly() {
        let env = envelope(EnvelopeBody::Data(DataFrame {
            port: PortNum::TextMessage as u16,
            payload: b"hello".to_vec(),
        }));
        let body = decode_body(&env, TOPIC, KEY_B64);
        assert!(body.decoded);
        assert_eq!(body.port, PortNum::TextMessage);
        assert_eq!(body.payload, b"hello");
        assert_eq!(body.channel, "LongFast");
    }

    #[test]
    fn plaintext_unknown_port_is_undecoded() {
        let env = envelope(EnvelopeBody::Data(DataFrame { port: 999, payload: vec![1, 2] }));
        let body = decode_body(&env, TOPIC, KEY_B64);
        assert!(!body.decoded);
        assert_eq!(body.port, PortNum::Unknown);
        assert_eq!(body.payload, vec![1, 2]);
    }

    #[test]
    fn encrypted_frame_decrypts_with_channel_key() {
        let mut env = envelope(EnvelopeBody::Encrypted(Vec::new()));
        let ciphertext = encrypted_text("över bergen", &env, "LongFast");
        env.body = EnvelopeBody::Encrypted(ciphertext);

        let body = decode_body(&env, TOPIC, KEY_B64);
        assert!(body.decoded);
        assert_eq!(body.port, PortNum::TextMessage);
        assert_eq!(body.payload, "över bergen".as_bytes());
    }

    #[test]
    fn primary_channel_topic_uses_base_key() {
        let mut env = envelope(EnvelopeBody::Encrypted(Vec::new()));
        let ciphertext = encrypted_text("direct", &env, "");
        env.body = EnvelopeBody::Encrypted(ciphertext);

        let body = decode_body(&env, "msh/EU_868/2/e/!7aa6fbec", KEY_B64);
        assert!(body.decoded);
        assert_eq!(body.channel, "");
        assert_eq!(body.payload, b"direct");
    }

    #[test]
    fn wrong_key_degrades_to_undecoded_ciphertext() {
        let mut env = envelope(EnvelopeBody::Encrypted(Vec::new()));
        let ciphertext = encrypted_text("secret", &env, "LongFast");
        env.body = EnvelopeBody::Encrypted(ciphertext.clone());

        let wrong = "////////////////////////////////////////////";
        let body = decode_body(&env, TOPIC, wrong);
        assert!(!body.decoded);
        assert_eq!(body.port, PortNum::Unknown);
        assert_eq!(body.payload, ciphertext);
    }

    #[test]
    fn wrong_channel_key_fails_decode() {
        // Encrypted for LongFast but delivered on a primary-channel topic.
        let mut env = envelope(EnvelopeBody::Encrypted(Vec::new()));
        let ciphertext = encrypted_text("secret", &env, "LongFast");
        env.body = EnvelopeBody::Encrypted(ciphertext);

        let body = decode_body(&env, "msh/EU_868/2/e/!7aa6fbec", KEY_B64);
        assert!(!body.decoded);
    }

    #[test]
    fn empty_ciphertext_is_undecoded() {
        let env = envelope(EnvelopeBody::Encrypted(Vec::new()));
        let body = decode_body(&env, TOPIC, KEY_B64);
        assert!(!body.decoded);
        assert!(body.payload.is_empty());
    }
}
