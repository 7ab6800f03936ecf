// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/provmark

//! Reversible watermarking pipelines.
//!
//! The codec is histogram shifting on prediction errors: a fixed kernel
//! predicts each key-selected pixel from its neighbours, and the prediction
//! error is doubled to make room for one watermark bit. The shift is
//! exactly invertible, so removal restores every pixel bit-for-bit,
//! including pixels near the dynamic-range ceiling, which are sidestepped
//! through the overflow map instead of being distorted.
//!
//! Layering, bottom up:
//!
//! - [`kernel`] / [`predict`]: candidate geometry and the pinned predictor.
//! - [`keys`]: watermark bits and the keyed ChaCha20 mask stream.
//! - [`embed`] / [`extract`]: the two halves of the codec proper.
//! - [`batch`]: directory drivers that tie codec runs to ledger blocks.
//! - [`config`] / [`progress`]: operation records and batch observability.

pub mod batch;
pub mod config;
pub mod embed;
pub mod error;
pub mod extract;
pub mod kernel;
pub mod keys;
pub mod predict;
pub mod progress;

pub use batch::{
    embed_batch, extract_batch, remove_batch, BatchEmbedReport, BatchExtractReport,
    BatchRemoveReport,
};
pub use config::{EmbedConfig, ExtractConfig, RemoveConfig};
pub use embed::{embed, EmbedOutcome, EmbedStats};
pub use error::WmError;
pub use extract::{extract, forensic_scan, ExtractOutcome, ExtractStats, ForensicMatch, ForensicReport};
pub use kernel::{CandidateGrid, CodecParams, Kernel};
pub use keys::{SecretKey, KEY_LEN, MASK_ALGORITHM, WATERMARK_BITS};
