// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/provmark

//! # provmark-core
//!
//! Pure-Rust reversible watermarking engine for grayscale raster images,
//! paired with an append-only, hash-chained audit ledger. Embedding shifts
//! the prediction-error histogram of key-selected pixels; removal restores
//! the original image bit-exactly from the marked image and the secret key.
//! Every batch embed and batch remove is recorded as one ledger block
//! binding the operation parameters to canonical image digests, so a marked
//! image can later be authenticated by hash lookup or by forensic watermark
//! matching.
//!
//! The raster substrate (`raster` module) is zero-dependency apart from the
//! digest; the watermarking layer (`wm` module) derives its bit streams
//! from SHA-256 and a keyed ChaCha20 stream; the ledger (`ledger` module)
//! persists to a single JSON document hashed through a pinned canonical
//! serializer.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use provmark_core::{embed_batch, remove_batch, EmbedConfig, Ledger};
//!
//! let config: EmbedConfig = serde_json::from_str(config_json).unwrap();
//! let mut ledger = Ledger::open(&config.blockchain_path).unwrap();
//! let report = embed_batch(&config, &mut ledger).unwrap();
//! println!("block {} holds {} images", report.block_number, report.processed_images);
//! ```

pub mod ledger;
pub mod raster;
pub mod wm;

pub use ledger::{
    Block, BlockHeader, EmbedRecord, Ledger, LedgerError, RemovalRecord, GENESIS_PREVIOUS_HASH,
};
pub use raster::source::{FormatCodec, PixelSink, PixelSource};
pub use raster::{hash::canonical_digest, pgm, BitDepth, Raster, RasterError};
pub use wm::progress;
pub use wm::{
    embed, embed_batch, extract, extract_batch, forensic_scan, remove_batch, CandidateGrid,
    CodecParams, EmbedConfig, ExtractConfig, ForensicReport, Kernel, RemoveConfig, SecretKey,
    WmError, KEY_LEN, MASK_ALGORITHM, WATERMARK_BITS,
};
