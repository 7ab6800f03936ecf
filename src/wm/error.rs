// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/provmark

//! Error types for the watermarking codec and batch driver.

use core::fmt;

use crate::ledger::LedgerError;
use crate::raster::RasterError;

/// Errors that can occur during embedding, extraction, or batch processing.
#[derive(Debug)]
pub enum WmError {
    /// The kernel is structurally invalid (even side, non-square rows,
    /// nonzero center, weights not summing to 1).
    KernelInvalid(String),
    /// A configuration value is out of range or inconsistent.
    ConfigInvalid(String),
    /// The image holds no valid candidate center for this kernel/stride.
    DimensionTooSmall,
    /// The image's bit depth does not match the requested depth.
    BitDepthMismatch,
    /// The secret key is not 32 bytes of hex.
    BadKey,
    /// The watermark message is empty (disallowed by policy).
    EmptyMessage,
    /// No ledger record matches the watermarked-image hash.
    NoMatch,
    /// Exact removal produced pixels whose digest does not equal the
    /// recorded original-image hash.
    RecoveryMismatch,
    /// Every image in the batch failed; no block was appended.
    BatchEmpty,
    /// The operation was cancelled at an image boundary.
    Cancelled,
    /// Underlying filesystem failure.
    Io(std::io::Error),
    /// Pixel source/sink failure.
    Raster(RasterError),
    /// Ledger failure (corruption, lock contention, persistence).
    Ledger(LedgerError),
}

impl fmt::Display for WmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KernelInvalid(msg) => write!(f, "invalid kernel: {msg}"),
            Self::ConfigInvalid(msg) => write!(f, "invalid configuration: {msg}"),
            Self::DimensionTooSmall => write!(f, "image too small for kernel and stride"),
            Self::BitDepthMismatch => write!(f, "pixel data does not match the configured bit depth"),
            Self::BadKey => write!(f, "secret key must be 32 bytes of hex"),
            Self::EmptyMessage => write!(f, "watermark message must not be empty"),
            Self::NoMatch => write!(f, "no ledger record matches this image"),
            Self::RecoveryMismatch => write!(f, "recovered image does not hash to the recorded original"),
            Self::BatchEmpty => write!(f, "no image in the batch could be processed"),
            Self::Cancelled => write!(f, "operation cancelled"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Raster(e) => write!(f, "{e}"),
            Self::Ledger(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for WmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Raster(e) => Some(e),
            Self::Ledger(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for WmError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<RasterError> for WmError {
    fn from(e: RasterError) -> Self {
        Self::Raster(e)
    }
}

impl From<LedgerError> for WmError {
    fn from(e: LedgerError) -> Self {
        Self::Ledger(e)
    }
}
