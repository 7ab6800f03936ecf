// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/provmark

//! Kernel prediction with pinned rounding.
//!
//! The prediction is `round(sum(weight * neighbour))` with half-up rounding:
//! ties go toward positive infinity, so 2.5 predicts 3 and -0.5 predicts 0.
//! The rounding direction decides which pixels are carriers and is therefore
//! part of the codec contract.
//!
//! The accumulation runs in `f64` using only add and multiply. With the
//! default quarter-weight kernel every partial sum is exactly representable,
//! so the result is identical on every platform.

use crate::raster::Raster;

use super::kernel::Kernel;

/// Half-up rounding: `floor(v + 0.5)`, ties toward positive infinity.
pub(crate) fn half_up(v: f64) -> i64 {
    (v + 0.5).floor() as i64
}

/// Predict the pixel at center `(row, col)` from its kernel neighbourhood.
///
/// The center weight is zero by construction, so the prediction never
/// depends on the pixel being predicted. The caller guarantees the full
/// kernel support lies inside the raster; there is no padding.
pub fn predict(raster: &Raster, kernel: &Kernel, row: u32, col: u32) -> i64 {
    let r = kernel.radius() as u32;
    debug_assert!(row >= r && col >= r);
    debug_assert!(row + r < raster.height() && col + r < raster.width());

    let mut acc = 0.0f64;
    for a in 0..kernel.side() {
        for b in 0..kernel.side() {
            let w = kernel.weight(a, b);
            if w == 0.0 {
                continue;
            }
            let y = row - r + a as u32;
            let x = col - r + b as u32;
            acc += w * raster.get(y, x) as f64;
        }
    }
    half_up(acc)
}
