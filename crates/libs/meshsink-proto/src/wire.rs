//! Meshsink wire envelope encode/decode.
//!
//! One envelope per MQTT publish. The fixed header carries the packet
//! identities and the gateway that heard it; flag bits select the
//! optional reception-metadata fields; the body is either a plaintext
//! application data frame or an opaque encrypted segment.

use crate::WIRE_VERSION;

/// Fixed header size: version + flags + from + to + packet_id + gateway.
const HEADER_SIZE: usize = 1 + 1 + 4 + 4 + 4 + 4;

const FLAG_RELAY: u8 = 0x01;
const FLAG_RSSI: u8 = 0x02;
const FLAG_SNR: u8 = 0x04;
const FLAG_HOPS: u8 = 0x08;
const FLAG_ENCRYPTED: u8 = 0x10;
const FLAG_MASK: u8 = 0x1F;

/// Errors from envelope codec operations.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("envelope too short: {0} bytes (minimum {HEADER_SIZE})")]
    TooShort(usize),

    #[error("unsupported wire version: {0}")]
    UnsupportedVersion(u8),

    #[error("unknown flag bits: 0x{0:02x}")]
    UnknownFlags(u8),

    #[error("envelope truncated while reading {0}")]
    Truncated(&'static str),

    #[error("{0} trailing bytes after body")]
    TrailingBytes(usize),
}

/// A plaintext application data frame: port number plus payload bytes.
///
/// The same framing appears in the clear inside an unencrypted envelope
/// body and as the plaintext of an encrypted segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    pub port: u16,
    pub payload: Vec<u8>,
}

impl DataFrame {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.payload.len());
        buf.extend_from_slice(&self.port.to_le_bytes());
        buf.extend_from_slice(&(self.payload.len() as u16).to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        if data.len() < 4 {
            return Err(WireError::Truncated("data frame header"));
        }
        let port = u16::from_le_bytes([data[0], data[1]]);
        let len = u16::from_le_bytes([data[2], data[3]]) as usize;
        let rest = &data[4..];
        if rest.len() < len {
            return Err(WireError::Truncated("data frame payload"));
        }
        if rest.len() > len {
            return Err(WireError::TrailingBytes(rest.len() - len));
        }
        Ok(Self { port, payload: rest[..len].to_vec() })
    }
}

/// Envelope body: decoded application data or an encrypted segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeBody {
    Data(DataFrame),
    Encrypted(Vec<u8>),
}

/// One observed wire message as published by a gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub version: u8,
    pub from_node: u32,
    pub to_node: u32,
    pub packet_id: u32,
    pub gateway: u32,
    /// Low 8 bits of the relaying node's identity, when one relayed.
    pub relay_node: Option<u8>,
    pub rssi: Option<i16>,
    pub snr: Option<f32>,
    /// (hop_start, hop_limit) as set by the sender and seen on receipt.
    pub hops: Option<(u8, u8)>,
    pub body: EnvelopeBody,
}

impl Envelope {
    /// Encode to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut flags = 0u8;
        if self.relay_node.is_some() {
            flags |= FLAG_RELAY;
        }
        if self.rssi.is_some() {
            flags |= FLAG_RSSI;
        }
        if self.snr.is_some() {
            flags |= FLAG_SNR;
        }
        if self.hops.is_some() {
            flags |= FLAG_HOPS;
        }
        if matches!(self.body, EnvelopeBody::Encrypted(_)) {
            flags |= FLAG_ENCRYPTED;
        }

        let mut buf = Vec::with_capacity(HEADER_SIZE + 16);
        buf.push(self.version);
        buf.push(flags);
        buf.extend_from_slice(&self.from_node.to_le_bytes());
        buf.extend_from_slice(&self.to_node.to_le_bytes());
        buf.extend_from_slice(&self.packet_id.to_le_bytes());
        buf.extend_from_slice(&self.gateway.to_le_bytes());

        if let Some(relay) = self.relay_node {
            buf.push(relay);
        }
        if let Some(rssi) = self.rssi {
            buf.extend_from_slice(&rssi.to_le_bytes());
        }
        if let Some(snr) = self.snr {
            buf.extend_from_slice(&snr.to_le_bytes());
        }
        if let Some((start, limit)) = self.hops {
            buf.push(start);
            buf.push(limit);
        }

        match &self.body {
            EnvelopeBody::Data(frame) => buf.extend_from_slice(&frame.encode()),
            EnvelopeBody::Encrypted(bytes) => {
                buf.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
                buf.extend_from_slice(bytes);
            }
        }
        buf
    }

    /// Decode from wire bytes.
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        if data.len() < HEADER_SIZE {
            return Err(WireError::TooShort(data.len()));
        }

        let version = data[0];
        if version != WIRE_VERSION {
            return Err(WireError::UnsupportedVersion(version));
        }

        let flags = data[1];
        if flags & !FLAG_MASK != 0 {
            return Err(WireError::UnknownFlags(flags & !FLAG_MASK));
        }

        let from_node = u32::from_le_bytes([data[2], data[3], data[4], data[5]]);
        let to_node = u32::from_le_bytes([data[6], data[7], data[8], data[9]]);
        let packet_id = u32::from_le_bytes([data[10], data[11], data[12], data[13]]);
        let gateway = u32::from_le_bytes([data[14], data[15], data[16], data[17]]);

        let mut rest = &data[HEADER_SIZE..];

        let relay_node = if flags & FLAG_RELAY != 0 {
            let (byte, tail) = take(rest, 1, "relay byte")?;
            rest = tail;
            Some(byte[0])
        } else {
            None
        };
        let rssi = if flags & FLAG_RSSI != 0 {
            let (bytes, tail) = take(rest, 2, "rssi")?;
            rest = tail;
            Some(i16::from_le_bytes([bytes[0], bytes[1]]))
        } else {
            None
        };
        let snr = if flags & FLAG_SNR != 0 {
            let (bytes, tail) = take(rest, 4, "snr")?;
            rest = tail;
            Some(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        } else {
            None
        };
        let hops = if flags & FLAG_HOPS != 0 {
            let (bytes, tail) = take(rest, 2, "hops")?;
            rest = tail;
            Some((bytes[0], bytes[1]))
        } else {
            None
        };

        let body = if flags & FLAG_ENCRYPTED != 0 {
            let (len_bytes, tail) = take(rest, 2, "encrypted length")?;
            let len = u16::from_le_bytes([len_bytes[0], len_bytes[1]]) as usize;
            if tail.len() < len {
                return Err(WireError::Truncated("encrypted segment"));
            }
            if tail.len() > len {
                return Err(WireError::TrailingBytes(tail.len() - len));
            }
            EnvelopeBody::Encrypted(tail[..len].to_vec())
        } else {
            EnvelopeBody::Data(DataFrame::decode(rest)?)
        };

        Ok(Self {
            version,
            from_node,
            to_node,
            packet_id,
            gateway,
            relay_node,
            rssi,
            snr,
            hops,
            body,
        })
    }
}

fn take<'a>(
    data: &'a [u8],
    n: usize,
    field: &'static str,
) -> Result<(&'a [u8], &'a [u8]), WireError> {
    if data.len() < n {
        return Err(WireError::Truncated(field));
    }
    Ok(data.split_at(n))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Envelope {
        Envelope {
            version: WIRE_VERSION,
            from_node: 0x7AA6_FBEC,
            to_node: crate::BROADCAST_ADDR,
            packet_id: 0x1234_5678,
            gateway: 0x0BAD_CAFE,
            relay_node: Some(0x88),
            rssi: Some(-97),
            snr: Some(-3.25),
            hops: Some((3, 1)),
            body: EnvelopeBody::Data(DataFrame { port: 1, payload: b"hi mesh".to_vec() }),
        }
    }

    #[test]
    fn roundtrip_full_envelope() {
        let env = sample();
        let decoded = Envelope::decode(&env.encode()).expect("decode");
        assert_eq!(decoded, env);
    }

    #[test]
    fn roundtrip_minimal_envelope() {
        let env = Envelope {
            relay_node: None,
            rssi: None,
            snr: None,
            hops: None,
            ..sample()
        };
        let decoded = Envelope::decode(&env.encode()).expect("decode");
        assert_eq!(decoded, env);
    }

    #[test]
    fn roundtrip_encrypted_body() {
        let env = Envelope {
            body: EnvelopeBody::Encrypted(vec![0xDE, 0xAD, 0xBE, 0xEF]),
            ..sample()
        };
        let decoded = Envelope::decode(&env.encode()).expect("decode");
        assert_eq!(decoded, env);
    }

    #[test]
    fn rejects_short_envelope() {
        assert!(matches!(Envelope::decode(&[0u8; 4]), Err(WireError::TooShort(4))));
    }

    #[test]
    fn rejects_unknown_version() {
        let mut bytes = sample().encode();
        bytes[0] = 0x7F;
        assert!(matches!(Envelope::decode(&bytes), Err(WireError::UnsupportedVersion(0x7F))));
    }

    #[test]
    fn rejects_unknown_flags() {
        let mut bytes = sample().encode();
        bytes[1] |= 0x80;
        assert!(matches!(Envelope::decode(&bytes), Err(WireError::UnknownFlags(0x80))));
    }

    #[test]
    fn rejects_truncated_metadata() {
        let bytes = sample().encode();
        // Cut into the optional-field region.
        assert!(Envelope::decode(&bytes[..HEADER_SIZE + 1]).is_err());
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut bytes = sample().encode();
        bytes.push(0);
        assert!(matches!(Envelope::decode(&bytes), Err(WireError::TrailingBytes(1))));
    }
}
