// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/provmark

//! Canonical image digest.
//!
//! The digest is SHA-256 over a pinned pixel-array encoding, not over file
//! bytes: container metadata (comments, timestamps, compression choices)
//! varies between writers, while the pixel array is what the codec and the
//! ledger actually reason about.
//!
//! Canonical encoding:
//!
//! ```text
//! [4 bytes] width  (big-endian u32)
//! [4 bytes] height (big-endian u32)
//! [1 byte ] bit depth (8 or 16)
//! [W*H samples] row-major, big-endian, ceil(depth/8) bytes each
//! ```

use sha2::{Digest, Sha256};

use super::{BitDepth, Raster};

/// Compute the canonical SHA-256 digest of a raster, lowercase hex.
pub fn canonical_digest(raster: &Raster) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raster.width().to_be_bytes());
    hasher.update(raster.height().to_be_bytes());
    hasher.update([raster.depth().bits()]);
    match raster.depth() {
        BitDepth::Eight => {
            let mut row = Vec::with_capacity(raster.width() as usize);
            for chunk in raster.samples().chunks(raster.width() as usize) {
                row.clear();
                row.extend(chunk.iter().map(|&v| v as u8));
                hasher.update(&row);
            }
        }
        BitDepth::Sixteen => {
            let mut row = Vec::with_capacity(raster.width() as usize * 2);
            for chunk in raster.samples().chunks(raster.width() as usize) {
                row.clear();
                for &v in chunk {
                    row.extend_from_slice(&v.to_be_bytes());
                }
                hasher.update(&row);
            }
        }
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny(depth: BitDepth, data: Vec<u16>) -> Raster {
        Raster::from_vec(2, 2, depth, data).unwrap()
    }

    #[test]
    fn digest_is_stable() {
        let r = tiny(BitDepth::Eight, vec![1, 2, 3, 4]);
        assert_eq!(canonical_digest(&r), canonical_digest(&r));
    }

    #[test]
    fn digest_changes_with_pixel() {
        let a = tiny(BitDepth::Eight, vec![1, 2, 3, 4]);
        let b = tiny(BitDepth::Eight, vec![1, 2, 3, 5]);
        assert_ne!(canonical_digest(&a), canonical_digest(&b));
    }

    #[test]
    fn digest_changes_with_depth() {
        let a = tiny(BitDepth::Eight, vec![1, 2, 3, 4]);
        let b = tiny(BitDepth::Sixteen, vec![1, 2, 3, 4]);
        assert_ne!(canonical_digest(&a), canonical_digest(&b));
    }

    #[test]
    fn digest_changes_with_shape() {
        let a = Raster::from_vec(4, 1, BitDepth::Eight, vec![1, 2, 3, 4]).unwrap();
        let b = Raster::from_vec(1, 4, BitDepth::Eight, vec![1, 2, 3, 4]).unwrap();
        assert_ne!(canonical_digest(&a), canonical_digest(&b));
    }

    #[test]
    fn known_vector_8bit() {
        // 1x1 image, pixel 0: encoding is
        // 00000001 00000001 08 00 -> sha256 of those 10 bytes.
        let r = Raster::from_vec(1, 1, BitDepth::Eight, vec![0]).unwrap();
        let mut hasher = Sha256::new();
        hasher.update([0, 0, 0, 1, 0, 0, 0, 1, 8, 0]);
        assert_eq!(canonical_digest(&r), hex::encode(hasher.finalize()));
    }

    #[test]
    fn sixteen_bit_is_big_endian() {
        let r = Raster::from_vec(1, 1, BitDepth::Sixteen, vec![0x0102]).unwrap();
        let mut hasher = Sha256::new();
        hasher.update([0, 0, 0, 1, 0, 0, 0, 1, 16, 0x01, 0x02]);
        assert_eq!(canonical_digest(&r), hex::encode(hasher.finalize()));
    }
}
