// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/provmark

//! Watermark extraction and exact pixel restoration.
//!
//! Extraction walks the same row-major candidate order as embedding and
//! inverts it in place. Overflow-map members are skipped before any other
//! logic; mask-off candidates are skipped; a current error `e' < t_hi`
//! marks a non-carrier. For a carrier, `b = e' mod 2` and the pixel
//! restores to `x - (e' + b) / 2`, which exactly inverts the embed shift
//! `x -> x + e + b`.
//!
//! Restoration is sound in place: with `stride >= side` and a zero kernel
//! center, the neighbourhood of a candidate never contains another
//! candidate's center, so restoring one pixel cannot change the prediction
//! at any other.
//!
//! Two callers use this:
//!
//! - **Exact removal** supplies the overflow map from the matched ledger
//!   record; the recovered raster must hash-equal the recorded original.
//! - **Forensic extraction** runs with an empty overflow map over every
//!   plausible ledger record and reports the best watermark match by bit
//!   error rate. Its recovered pixels are best-effort only.

use std::collections::HashSet;

use crate::ledger::Ledger;
use crate::raster::{hash::canonical_digest, Raster};

use super::error::WmError;
use super::kernel::{CandidateGrid, CodecParams, Kernel};
use super::keys::{bit_error_rate, hex_to_bits, mask_bits, SecretKey};
use super::predict::predict;

/// Counters describing one extract run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExtractStats {
    /// Bits recovered from carriers.
    pub extracted_bits: usize,
    /// Candidates skipped because they sit in the overflow map.
    pub skipped_overflow: usize,
}

/// Result of an extract run.
#[derive(Clone, Debug)]
pub struct ExtractOutcome {
    pub recovered: Raster,
    pub bits: Vec<u8>,
    pub stats: ExtractStats,
}

/// Recover watermark bits and original pixels from a marked raster.
///
/// `mask` holds one bit per candidate; `overflow_map` lists candidate
/// indices the embedder clamped (empty for forensic extraction).
///
/// # Errors
/// - [`WmError::DimensionTooSmall`] if the image fits no candidate.
/// - [`WmError::ConfigInvalid`] on a mask-length mismatch.
pub fn extract(
    marked: &Raster,
    params: &CodecParams,
    mask: &[u8],
    overflow_map: &[u64],
) -> Result<ExtractOutcome, WmError> {
    let grid = CandidateGrid::new(marked.width(), marked.height(), &params.kernel, params.stride)?;
    if mask.len() != grid.len() {
        return Err(WmError::ConfigInvalid(format!(
            "mask holds {} bits for {} candidates",
            mask.len(),
            grid.len()
        )));
    }

    let overflow: HashSet<u64> = overflow_map.iter().copied().collect();
    let max = marked.max_value() as i64;
    let mut recovered = marked.clone();
    let mut bits = Vec::new();
    let mut stats = ExtractStats::default();

    for idx in 0..grid.len() {
        if overflow.contains(&(idx as u64)) {
            stats.skipped_overflow += 1;
            continue;
        }
        if mask[idx] == 0 {
            continue;
        }
        let (row, col) = grid.center(idx);
        let x = recovered.get(row, col) as i64;
        let e_w = x - predict(&recovered, &params.kernel, row, col);
        if e_w < params.t_hi {
            continue;
        }

        let bit = (e_w % 2) as u8;
        bits.push(bit);
        stats.extracted_bits += 1;
        // Exact inverse of the embed shift; the clamp only matters in
        // forensic mode, where the image never went through embed.
        let restored = (x - (e_w + bit as i64) / 2).clamp(0, max);
        recovered.set(row, col, restored as u16);
    }

    Ok(ExtractOutcome {
        recovered,
        bits,
        stats,
    })
}

/// Where a forensic scan found its best watermark match.
#[derive(Clone, Debug)]
pub struct ForensicMatch {
    pub block_number: u64,
    pub block_hash: String,
    pub timestamp: u64,
    pub hash_image_wat: String,
}

/// Outcome of a forensic scan over the ledger.
///
/// Never a `NoMatch` failure: when nothing matches well the report simply
/// carries a poor bit error rate and no match.
#[derive(Clone, Debug)]
pub struct ForensicReport {
    /// Best bit error rate found; 1.0 when no record could be tried.
    pub ber: f64,
    /// Block of the best-matching embed record, if any record was tried.
    pub matched: Option<ForensicMatch>,
    /// Bits extracted under the best-matching record's parameters.
    pub bits: Vec<u8>,
}

/// Scan the ledger for the embed record that best explains `image`.
///
/// An exact watermarked-hash hit short-circuits with BER 0. Otherwise every
/// embedder record with matching `data_type` and bit depth is tried: mask
/// bits are re-derived from the record's stored key, extraction runs with
/// an empty overflow map, and the extracted bits are rated against the
/// record's watermark. Records with unreadable parameters are skipped.
pub fn forensic_scan(
    image: &Raster,
    ledger: &Ledger,
    data_type: &str,
) -> Result<ForensicReport, WmError> {
    let digest = canonical_digest(image);

    let mut best = ForensicReport {
        ber: 1.0,
        matched: None,
        bits: Vec::new(),
    };

    for (block, record) in ledger.embedder_records() {
        if record.data_type != data_type || record.bit_depth != image.depth().bits() {
            continue;
        }

        // Exact hash hit: the image is bit-for-bit a recorded output.
        if record.hash_image_wat == digest {
            let outcome = extract_for_record(image, &record)?;
            return Ok(ForensicReport {
                ber: 0.0,
                matched: Some(forensic_match(block, &record)),
                bits: outcome.map(|o| o.bits).unwrap_or_default(),
            });
        }

        let Some(outcome) = extract_for_record(image, &record)? else {
            continue;
        };
        let Some(reference) = hex_to_bits(&record.watermark) else {
            continue;
        };
        let ber = bit_error_rate(&outcome.bits, &reference);
        if ber < best.ber || best.matched.is_none() {
            best = ForensicReport {
                ber,
                matched: Some(forensic_match(block, &record)),
                bits: outcome.bits,
            };
        }
    }

    Ok(best)
}

/// Run extraction under one record's parameters, empty overflow map.
/// Returns `Ok(None)` when the record's parameters cannot apply to this
/// image (bad kernel, bad key, image too small).
fn extract_for_record(
    image: &Raster,
    record: &crate::ledger::EmbedRecord,
) -> Result<Option<ExtractOutcome>, WmError> {
    let Ok(kernel) = Kernel::new(&record.kernel) else {
        return Ok(None);
    };
    let Ok(params) = CodecParams::new(kernel, record.stride, record.t_hi) else {
        return Ok(None);
    };
    let Ok(key) = SecretKey::from_hex(&record.secret_key) else {
        return Ok(None);
    };
    let Ok(grid) = CandidateGrid::new(image.width(), image.height(), &params.kernel, params.stride)
    else {
        return Ok(None);
    };
    let mask = mask_bits(&key, grid.len());
    Ok(Some(extract(image, &params, &mask, &[])?))
}

fn forensic_match(block: &crate::ledger::Block, record: &crate::ledger::EmbedRecord) -> ForensicMatch {
    ForensicMatch {
        block_number: block.header.block_number,
        block_hash: block.hash.clone(),
        timestamp: block.header.timestamp,
        hash_image_wat: record.hash_image_wat.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{BitDepth, Raster};
    use crate::wm::embed::embed;
    use crate::wm::kernel::Kernel;

    fn params() -> CodecParams {
        CodecParams::new(Kernel::four_neighbour(), 3, 0).unwrap()
    }

    fn raster_3x3(center: u16, neighbour: u16, depth: BitDepth) -> Raster {
        let mut data = vec![neighbour; 9];
        data[4] = center;
        Raster::from_vec(3, 3, depth, data).unwrap()
    }

    #[test]
    fn inverts_single_carrier() {
        let cover = raster_3x3(100, 10, BitDepth::Eight);
        for bit in [0u8, 1] {
            let marked = embed(&cover, &params(), &[bit], &[1]).unwrap();
            let out = extract(&marked.marked, &params(), &[1], &marked.overflow_map).unwrap();
            assert_eq!(out.recovered, cover, "bit {bit}");
            assert_eq!(out.bits, vec![bit]);
        }
    }

    #[test]
    fn skips_overflow_candidates() {
        let cover = raster_3x3(255, 10, BitDepth::Eight);
        let marked = embed(&cover, &params(), &[1], &[1]).unwrap();
        assert_eq!(marked.overflow_map, vec![0]);
        let out = extract(&marked.marked, &params(), &[1], &marked.overflow_map).unwrap();
        assert_eq!(out.recovered, cover);
        assert!(out.bits.is_empty());
        assert_eq!(out.stats.skipped_overflow, 1);
    }

    #[test]
    fn low_error_candidate_ignored() {
        let cover = raster_3x3(9, 10, BitDepth::Eight);
        let out = extract(&cover, &params(), &[1], &[]).unwrap();
        assert_eq!(out.recovered, cover);
        assert!(out.bits.is_empty());
    }

    #[test]
    fn roundtrip_multi_candidate() {
        // 9x9 gradient with enough texture to mix carriers and non-carriers.
        let data: Vec<u16> = (0..81u16).map(|i| (i * 3) % 256).collect();
        let cover = Raster::from_vec(9, 9, BitDepth::Eight, data).unwrap();
        let mask = vec![1u8, 0, 1, 1, 0, 1, 1, 1, 0];
        let wm = vec![1u8, 0, 0, 1, 1, 0, 1, 0];

        let marked = embed(&cover, &params(), &wm, &mask).unwrap();
        let out = extract(&marked.marked, &params(), &mask, &marked.overflow_map).unwrap();

        assert_eq!(out.recovered, cover);
        assert_eq!(out.bits.len(), marked.stats.embedded_bits);
        for (k, &bit) in out.bits.iter().enumerate() {
            assert_eq!(bit, wm[k % wm.len()], "carrier {k}");
        }
    }

    #[test]
    fn roundtrip_16bit() {
        let data: Vec<u16> = (0..81u16).map(|i| 60_000 + i * 17).collect();
        let cover = Raster::from_vec(9, 9, BitDepth::Sixteen, data).unwrap();
        let mask = vec![1u8; 9];
        let wm = vec![0u8, 1, 1];

        let marked = embed(&cover, &params(), &wm, &mask).unwrap();
        let out = extract(&marked.marked, &params(), &mask, &marked.overflow_map).unwrap();
        assert_eq!(out.recovered, cover);
    }

    #[test]
    fn mask_length_mismatch_rejected() {
        let cover = raster_3x3(100, 10, BitDepth::Eight);
        assert!(matches!(
            extract(&cover, &params(), &[1, 0], &[]),
            Err(WmError::ConfigInvalid(_))
        ));
    }
}
