// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/provmark

//! Histogram-shift embedding on prediction errors.
//!
//! At every mask-selected candidate the prediction error `e = x - predict`
//! decides the action:
//!
//! - `e < t_hi`: the pixel is not a carrier and stays untouched. No
//!   watermark bit is consumed, and the extractor recognizes the case by
//!   the same comparison on the unchanged error.
//! - `e >= t_hi`: the pixel shifts to `x + e + b` (new error `2e + b`),
//!   where `b` is the next watermark bit. The watermark repeats cyclically
//!   across carriers.
//! - The shift would exceed the dynamic range: the candidate index goes
//!   into the overflow map, the pixel stays untouched, and no bit is
//!   consumed. The extractor skips these indices symmetrically.
//!
//! Embedding is a pure function of its inputs; given the same image, key
//! streams, and parameters it produces the same marked image and overflow
//! map on every platform.

use crate::raster::Raster;

use super::error::WmError;
use super::kernel::{CandidateGrid, CodecParams};
use super::predict::predict;

/// Counters describing one embed run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EmbedStats {
    /// Watermark bits actually written into pixels.
    pub embedded_bits: usize,
    /// Marked candidates left untouched because `e < t_hi`.
    pub skipped_for_low_error: usize,
    /// Marked candidates clamped into the overflow map.
    pub overflowed: usize,
}

/// Result of an embed run.
#[derive(Clone, Debug)]
pub struct EmbedOutcome {
    pub marked: Raster,
    /// Candidate indices skipped for overflow, in ascending order.
    pub overflow_map: Vec<u64>,
    pub stats: EmbedStats,
}

/// Embed watermark bits into a cover raster.
///
/// `watermark` is the 256-bit sequence from `keys::watermark_bits`;
/// `mask` holds one bit per candidate from `keys::mask_bits`.
///
/// # Errors
/// - [`WmError::DimensionTooSmall`] if the image fits no candidate.
/// - [`WmError::ConfigInvalid`] if the mask length does not equal the
///   candidate count or the watermark is empty.
pub fn embed(
    cover: &Raster,
    params: &CodecParams,
    watermark: &[u8],
    mask: &[u8],
) -> Result<EmbedOutcome, WmError> {
    let grid = CandidateGrid::new(cover.width(), cover.height(), &params.kernel, params.stride)?;
    if mask.len() != grid.len() {
        return Err(WmError::ConfigInvalid(format!(
            "mask holds {} bits for {} candidates",
            mask.len(),
            grid.len()
        )));
    }
    if watermark.is_empty() {
        return Err(WmError::ConfigInvalid("empty watermark".into()));
    }

    let max = cover.max_value() as i64;
    let mut marked = cover.clone();
    let mut overflow_map = Vec::new();
    let mut stats = EmbedStats::default();
    let mut bit_idx = 0usize;

    for idx in 0..grid.len() {
        if mask[idx] == 0 {
            continue;
        }
        let (row, col) = grid.center(idx);
        let x = marked.get(row, col) as i64;
        let e = x - predict(&marked, &params.kernel, row, col);
        if e < params.t_hi {
            stats.skipped_for_low_error += 1;
            continue;
        }

        let bit = watermark[bit_idx % watermark.len()] as i64;
        let shifted = x + e + bit;
        if shifted > max {
            overflow_map.push(idx as u64);
            stats.overflowed += 1;
            continue;
        }

        marked.set(row, col, shifted as u16);
        bit_idx += 1;
        stats.embedded_bits += 1;
    }

    Ok(EmbedOutcome {
        marked,
        overflow_map,
        stats,
    })
}
