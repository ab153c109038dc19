//! Channel payload encryption reversal.
//!
//! Channel traffic is AES-256-CTR. The counter block is built from the
//! packet identity and the sender identity, so every (sender, packet)
//! pair keys a distinct keystream under the shared channel key.

use aes::cipher::{KeyIvInit, StreamCipher};
use aes::Aes256;

use crate::keys::KEY_SIZE;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Nonce size for the CTR counter block.
pub const NONCE_SIZE: usize = 16;

/// Build the 16-byte CTR nonce: packet id then sender id, both
/// little-endian u64. Stable for the lifetime of the packet.
pub fn build_nonce(packet_id: u64, from_node: u64) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    nonce[..8].copy_from_slice(&packet_id.to_le_bytes());
    nonce[8..].copy_from_slice(&from_node.to_le_bytes());
    nonce
}

/// Decrypt a channel-encrypted payload.
///
/// Returns the plaintext, or an empty vec on any failure. A wrong key
/// is the common case here (packets for channels we do not hold keys
/// for), so failure is a normal negative result and never panics or
/// surfaces an error to the caller. Empty input yields empty output
/// without touching the cipher.
pub fn decrypt(ciphertext: &[u8], packet_id: u64, from_node: u64, key: &[u8; KEY_SIZE]) -> Vec<u8> {
    apply_ctr(ciphertext, packet_id, from_node, key)
}

/// Encrypt a payload with the same parameters. CTR mode is symmetric;
/// this exists for test fixtures and replay tooling.
pub fn encrypt(plaintext: &[u8], packet_id: u64, from_node: u64, key: &[u8; KEY_SIZE]) -> Vec<u8> {
    apply_ctr(plaintext, packet_id, from_node, key)
}

fn apply_ctr(input: &[u8], packet_id: u64, from_node: u64, key: &[u8; KEY_SIZE]) -> Vec<u8> {
    if input.is_empty() {
        return Vec::new();
    }

    let nonce = build_nonce(packet_id, from_node);
    let mut cipher = Aes256Ctr::new(key.into(), &nonce.into());

    let mut buf = input.to_vec();
    match cipher.try_apply_keystream(&mut buf) {
        Ok(()) => buf,
        Err(_) => Vec::new(),
    }
}
