// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/provmark

//! Prediction kernel and candidate-center geometry.
//!
//! A [`Kernel`] is an odd square weight matrix with a zero center summing to
//! one; the prediction at a pixel is the rounded weighted sum of its
//! neighbourhood, independent of the pixel itself. The [`CandidateGrid`]
//! enumerates the pixel centers a kernel/stride pair can operate on, in the
//! fixed row-major order both the embedder and the extractor walk.
//!
//! The `stride >= side` constraint (enforced in [`CodecParams`]) is what
//! makes in-place extraction sound: no candidate's neighbourhood contains
//! another candidate's center, so restoring one pixel never changes the
//! prediction at any other.

use super::error::WmError;

/// Tolerance for the weight-sum-equals-one check. The default kernel uses
/// exact quarter weights; the tolerance only absorbs decimal inputs like
/// 0.1 that have no exact binary form.
const WEIGHT_SUM_TOL: f64 = 1e-9;

/// An odd square prediction kernel with zero center.
#[derive(Clone, Debug, PartialEq)]
pub struct Kernel {
    side: usize,
    weights: Vec<f64>,
}

impl Kernel {
    /// Validate and build a kernel from row vectors.
    ///
    /// # Errors
    /// [`WmError::KernelInvalid`] if the matrix is empty, not square, has an
    /// even side, a nonzero center, or weights that do not sum to 1.
    pub fn new(rows: &[Vec<f64>]) -> Result<Self, WmError> {
        let side = rows.len();
        if side == 0 {
            return Err(WmError::KernelInvalid("empty matrix".into()));
        }
        if side % 2 == 0 {
            return Err(WmError::KernelInvalid(format!("even side {side}")));
        }
        let mut weights = Vec::with_capacity(side * side);
        for row in rows {
            if row.len() != side {
                return Err(WmError::KernelInvalid(format!(
                    "row of length {} in a side-{side} matrix",
                    row.len()
                )));
            }
            weights.extend_from_slice(row);
        }
        let center = weights[(side / 2) * side + side / 2];
        if center != 0.0 {
            return Err(WmError::KernelInvalid(format!(
                "center coefficient must be 0, found {center}"
            )));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOL {
            return Err(WmError::KernelInvalid(format!("weights sum to {sum}, expected 1")));
        }
        Ok(Self { side, weights })
    }

    /// The default kernel: 4-neighbour average, side 3.
    pub fn four_neighbour() -> Self {
        Self::new(&[
            vec![0.0, 0.25, 0.0],
            vec![0.25, 0.0, 0.25],
            vec![0.0, 0.25, 0.0],
        ])
        .expect("default kernel is valid")
    }

    /// Side length (odd).
    pub fn side(&self) -> usize {
        self.side
    }

    /// Radius `(side - 1) / 2`.
    pub fn radius(&self) -> usize {
        (self.side - 1) / 2
    }

    /// Weight at kernel cell `(a, b)`.
    pub fn weight(&self, a: usize, b: usize) -> f64 {
        self.weights[a * self.side + b]
    }

    /// The weight matrix as row vectors, for ledger records.
    pub fn rows(&self) -> Vec<Vec<f64>> {
        self.weights.chunks(self.side).map(|c| c.to_vec()).collect()
    }
}

/// Validated codec parameters shared by embed and extract.
#[derive(Clone, Debug)]
pub struct CodecParams {
    pub kernel: Kernel,
    pub stride: u32,
    pub t_hi: i64,
}

impl CodecParams {
    /// Bundle kernel, stride, and threshold, enforcing `stride >= side` and
    /// `t_hi >= 0`.
    pub fn new(kernel: Kernel, stride: u32, t_hi: i64) -> Result<Self, WmError> {
        if (stride as usize) < kernel.side() {
            return Err(WmError::ConfigInvalid(format!(
                "stride {stride} smaller than kernel side {}",
                kernel.side()
            )));
        }
        if t_hi < 0 {
            return Err(WmError::ConfigInvalid(format!("negative threshold {t_hi}")));
        }
        Ok(Self { kernel, stride, t_hi })
    }
}

/// The candidate centers of an image under a kernel/stride pair.
///
/// Centers are `(r + row * stride, r + col * stride)` for
/// `row in 0..rows`, `col in 0..cols`, enumerated row-major. The flat
/// candidate index is `row * cols + col`; mask bits, watermark bits, and
/// overflow-map entries are all addressed by this index.
#[derive(Clone, Copy, Debug)]
pub struct CandidateGrid {
    rows: u32,
    cols: u32,
    radius: u32,
    stride: u32,
}

impl CandidateGrid {
    /// Compute the grid for an image of `width x height`.
    ///
    /// # Errors
    /// [`WmError::DimensionTooSmall`] when the image cannot fit a single
    /// kernel placement.
    pub fn new(
        width: u32,
        height: u32,
        kernel: &Kernel,
        stride: u32,
    ) -> Result<Self, WmError> {
        let side = kernel.side() as u32;
        if width < side || height < side {
            return Err(WmError::DimensionTooSmall);
        }
        Ok(Self {
            rows: (height - side) / stride + 1,
            cols: (width - side) / stride + 1,
            radius: kernel.radius() as u32,
            stride,
        })
    }

    /// Number of candidate centers.
    pub fn len(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pixel coordinates `(row, col)` of candidate `index`.
    pub fn center(&self, index: usize) -> (u32, u32) {
        debug_assert!(index < self.len());
        let row = (index / self.cols as usize) as u32;
        let col = (index % self.cols as usize) as u32;
        (self.radius + row * self.stride, self.radius + col * self.stride)
    }
}
