// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/provmark

//! Key handling and bit-stream derivation.
//!
//! Two deterministic streams come out of the key material:
//!
//! - **Watermark bits**: `SHA-256(message || key_bytes)` expanded to 256
//!   bits, MSB-first per byte. The hex digest of the same hash is what the
//!   ledger stores in the `watermark` field.
//! - **Mask bits**: a ChaCha20 keystream seeded with the raw 32-byte key,
//!   one bit per candidate, MSB-first per keystream byte. ChaCha20 is used
//!   for the same reason as in the coefficient permutation of our sibling
//!   engine: the stream is portable and reproducible from the key alone.
//!   The generator is identified in ledger records as
//!   [`MASK_ALGORITHM`] so a future generator change cannot silently break
//!   extraction of old images.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::error::WmError;

/// Secret key length in bytes.
pub const KEY_LEN: usize = 32;

/// Watermark length in bits (SHA-256 output).
pub const WATERMARK_BITS: usize = 256;

/// Identifier of the mask-stream generator, stored in every embed record.
pub const MASK_ALGORITHM: &str = "chacha20-msb";

/// A 256-bit secret key. The raw bytes are wiped on drop.
#[derive(Clone)]
pub struct SecretKey {
    bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl SecretKey {
    /// Generate a fresh random key from the OS-seeded thread RNG.
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        rand::thread_rng().fill_bytes(&mut *bytes);
        Self { bytes }
    }

    /// Decode a key from 64 hex digits.
    ///
    /// # Errors
    /// [`WmError::BadKey`] if the string is not exactly 32 bytes of hex.
    pub fn from_hex(s: &str) -> Result<Self, WmError> {
        let decoded = hex::decode(s).map_err(|_| WmError::BadKey)?;
        let raw: [u8; KEY_LEN] = decoded.try_into().map_err(|_| WmError::BadKey)?;
        Ok(Self {
            bytes: Zeroizing::new(raw),
        })
    }

    /// Hex form, 64 lowercase digits.
    pub fn to_hex(&self) -> String {
        hex::encode(*self.bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl core::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// Derive the 256 watermark bits from a message and key.
///
/// # Errors
/// [`WmError::EmptyMessage`] for a zero-length message (disallowed).
pub fn watermark_bits(message: &[u8], key: &SecretKey) -> Result<Vec<u8>, WmError> {
    Ok(bytes_to_bits(&watermark_digest(message, key)?))
}

/// Hex digest of the watermark, as stored in ledger records.
pub fn watermark_hex(message: &[u8], key: &SecretKey) -> Result<String, WmError> {
    Ok(hex::encode(watermark_digest(message, key)?))
}

fn watermark_digest(message: &[u8], key: &SecretKey) -> Result<[u8; 32], WmError> {
    if message.is_empty() {
        return Err(WmError::EmptyMessage);
    }
    let mut hasher = Sha256::new();
    hasher.update(message);
    hasher.update(key.as_bytes());
    Ok(hasher.finalize().into())
}

/// Draw `count` mask bits from the keyed ChaCha20 stream.
///
/// Exactly `ceil(count / 8)` keystream bytes are consumed; bit `i` is bit
/// `7 - (i % 8)` of byte `i / 8`. Two calls with the same key produce
/// identical prefixes, so the embedder and extractor agree bit-for-bit.
pub fn mask_bits(key: &SecretKey, count: usize) -> Vec<u8> {
    let mut rng = ChaCha20Rng::from_seed(*key.as_bytes());
    let mut stream = vec![0u8; count.div_ceil(8)];
    rng.fill_bytes(&mut stream);
    let mut bits = bytes_to_bits(&stream);
    bits.truncate(count);
    bits
}

/// Expand bytes to bits, MSB first within each byte.
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        for pos in (0..8).rev() {
            bits.push((byte >> pos) & 1);
        }
    }
    bits
}

/// Decode a hex string to bits, MSB first per nibble.
///
/// Returns `None` on non-hex input; ledger records with an unreadable
/// watermark field are skipped rather than failing the whole scan.
pub fn hex_to_bits(hex_str: &str) -> Option<Vec<u8>> {
    let bytes = hex::decode(hex_str).ok()?;
    Some(bytes_to_bits(&bytes))
}

/// Pack bits (MSB first) into a hex string, zero-padding the final nibble.
pub fn bits_to_hex(bits: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(bits.len().div_ceil(8));
    for chunk in bits.chunks(8) {
        let mut byte = 0u8;
        for (i, &bit) in chunk.iter().enumerate() {
            byte |= (bit & 1) << (7 - i);
        }
        bytes.push(byte);
    }
    hex::encode(bytes)
}

/// Bit error rate of `extracted` against a cyclically repeated `reference`.
///
/// Mismatches are counted over `extracted.len()`, comparing position `i`
/// with `reference[i % reference.len()]`: the watermark repeats every 256
/// bits in the carrier, so the reference tiles the same way. Returns 1.0
/// when either sequence is empty.
pub fn bit_error_rate(extracted: &[u8], reference: &[u8]) -> f64 {
    if extracted.is_empty() || reference.is_empty() {
        return 1.0;
    }
    let mismatches = extracted
        .iter()
        .enumerate()
        .filter(|(i, &bit)| bit != reference[i % reference.len()])
        .count();
    mismatches as f64 / extracted.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(fill: u8) -> SecretKey {
        SecretKey::from_hex(&hex::encode([fill; KEY_LEN])).unwrap()
    }

    #[test]
    fn key_hex_roundtrip() {
        let key = SecretKey::generate();
        let hex = key.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(SecretKey::from_hex(&hex).unwrap().as_bytes(), key.as_bytes());
    }

    #[test]
    fn short_key_rejected() {
        assert!(matches!(SecretKey::from_hex("abcd"), Err(WmError::BadKey)));
    }

    #[test]
    fn non_hex_key_rejected() {
        let bad = "zz".repeat(32);
        assert!(matches!(SecretKey::from_hex(&bad), Err(WmError::BadKey)));
    }

    #[test]
    fn watermark_is_deterministic() {
        let key = test_key(7);
        let a = watermark_bits(b"hello", &key).unwrap();
        let b = watermark_bits(b"hello", &key).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), WATERMARK_BITS);
        assert!(a.iter().all(|&bit| bit <= 1));
    }

    #[test]
    fn watermark_differs_by_key_and_message() {
        let k1 = test_key(1);
        let k2 = test_key(2);
        assert_ne!(
            watermark_bits(b"msg", &k1).unwrap(),
            watermark_bits(b"msg", &k2).unwrap()
        );
        assert_ne!(
            watermark_bits(b"msg", &k1).unwrap(),
            watermark_bits(b"other", &k1).unwrap()
        );
    }

    #[test]
    fn empty_message_rejected() {
        let key = test_key(0);
        assert!(matches!(watermark_bits(b"", &key), Err(WmError::EmptyMessage)));
        assert!(matches!(watermark_hex(b"", &key), Err(WmError::EmptyMessage)));
    }

    #[test]
    fn watermark_hex_matches_bits() {
        let key = test_key(9);
        let bits = watermark_bits(b"hello", &key).unwrap();
        let hex = watermark_hex(b"hello", &key).unwrap();
        assert_eq!(hex_to_bits(&hex).unwrap(), bits);
    }

    #[test]
    fn mask_prefix_property() {
        let key = test_key(42);
        let long = mask_bits(&key, 1000);
        let short = mask_bits(&key, 100);
        assert_eq!(&long[..100], &short[..]);
        assert_eq!(long.len(), 1000);
    }

    #[test]
    fn mask_differs_by_key() {
        let a = mask_bits(&test_key(1), 256);
        let b = mask_bits(&test_key(2), 256);
        assert_ne!(a, b);
    }

    #[test]
    fn mask_has_both_values() {
        let bits = mask_bits(&test_key(3), 512);
        assert!(bits.contains(&0));
        assert!(bits.contains(&1));
    }

    #[test]
    fn bits_hex_roundtrip() {
        let bits = vec![1u8, 0, 1, 1, 0, 0, 1, 0, 1, 1, 1, 1];
        let hex = bits_to_hex(&bits);
        // 10110010 1111(0000) -> b2f0
        assert_eq!(hex, "b2f0");
        assert_eq!(&hex_to_bits(&hex).unwrap()[..12], &bits[..]);
    }

    #[test]
    fn bytes_to_bits_msb_first() {
        assert_eq!(bytes_to_bits(&[0b1000_0001]), vec![1, 0, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn ber_exact_match_is_zero() {
        let reference = vec![1u8, 0, 1, 0];
        let extracted = vec![1u8, 0, 1, 0, 1, 0];
        // Cyclic: positions 4, 5 compare against reference 0, 1 again.
        assert_eq!(bit_error_rate(&extracted, &reference), 0.0);
    }

    #[test]
    fn ber_counts_mismatches() {
        let reference = vec![1u8, 1, 1, 1];
        let extracted = vec![1u8, 0, 1, 0];
        assert_eq!(bit_error_rate(&extracted, &reference), 0.5);
    }

    #[test]
    fn ber_empty_is_worst_case() {
        assert_eq!(bit_error_rate(&[], &[1, 0]), 1.0);
        assert_eq!(bit_error_rate(&[1, 0], &[]), 1.0);
    }
}
