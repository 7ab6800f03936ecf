// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/provmark

//! Block structure and transaction records.
//!
//! A block binds one batch operation to the chain:
//!
//! ```text
//! {
//!   "header": { "timestamp", "previous_hash", "block_number" },
//!   "info":   "genesis" | "embedder" | "remover",
//!   "transaction": { ... batch transaction ... },
//!   "hash":   sha256(canonical_json({header, info, transaction}))
//! }
//! ```
//!
//! The `hash` field itself is excluded from the hashed form; chain
//! verification recomputes it from the other three fields.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use super::canonical::canonical_json;

/// `previous_hash` of the genesis block: 64 zero digits.
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// `info` tag of the genesis block.
pub const INFO_GENESIS: &str = "genesis";
/// `info` tag of blocks appended by the batch embedder.
pub const INFO_EMBEDDER: &str = "embedder";
/// `info` tag of blocks appended by the batch remover.
pub const INFO_REMOVER: &str = "remover";

/// Seconds since the Unix epoch.
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Block header: linking and ordering metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Wall-clock seal time, seconds since the Unix epoch.
    pub timestamp: u64,
    /// Hash of the preceding block, lowercase hex.
    pub previous_hash: String,
    /// Dense, strictly increasing block index; genesis is 0.
    pub block_number: u64,
}

/// One sealed ledger entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub info: String,
    pub transaction: Value,
    pub hash: String,
}

impl Block {
    /// Seal a block: compute its hash from header, info, and transaction.
    pub fn seal(header: BlockHeader, info: String, transaction: Value) -> Self {
        let mut block = Self {
            header,
            info,
            transaction,
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// The genesis block for a fresh ledger.
    pub fn genesis() -> Self {
        Self::seal(
            BlockHeader {
                timestamp: unix_timestamp(),
                previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
                block_number: 0,
            },
            INFO_GENESIS.to_string(),
            json!({}),
        )
    }

    /// Recompute the block hash from the hashed fields.
    pub fn compute_hash(&self) -> String {
        let body = json!({
            "header": self.header,
            "info": self.info,
            "transaction": self.transaction,
        });
        let mut hasher = Sha256::new();
        hasher.update(canonical_json(&body).as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Per-image record written by the embedder.
///
/// Carries everything removal needs: the key and codec parameters, the
/// overflow map, and the digests that anchor the record to its images.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmbedRecord {
    pub timestamp: u64,
    /// Secret key, 64 hex digits. The ledger is the key escrow of this
    /// system; confidentiality of the document is out of scope.
    pub secret_key: String,
    pub message: String,
    /// `sha256(message || key_bytes)`, lowercase hex.
    pub watermark: String,
    pub kernel: Vec<Vec<f64>>,
    pub stride: u32,
    pub t_hi: i64,
    pub hash_image_wat: String,
    pub hash_image_orig: String,
    pub bit_depth: u8,
    pub data_type: String,
    pub operation_type: String,
    /// Identifier of the mask-stream generator (see `wm::keys`).
    pub mask_algorithm: String,
    /// Candidate indices skipped for dynamic-range overflow, ascending.
    pub overflow_map: Vec<u64>,
}

/// Batch transaction appended by the embedder, one per batch.
///
/// `transaction_dict` is keyed by watermarked-image hash; `BTreeMap` pins
/// the key order so the block hash is reproducible regardless of the order
/// in which per-image work finished.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchEmbedTransaction {
    pub processing_time: f64,
    pub total_images: usize,
    pub processed_images: usize,
    pub failed_images: Vec<String>,
    pub transaction_dict: BTreeMap<String, EmbedRecord>,
}

/// Codec parameters echoed into a removal record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemovalParameters {
    pub kernel: Vec<Vec<f64>>,
    pub stride: u32,
    pub t_hi: i64,
    pub bit_depth: u8,
}

/// Per-image record written by the remover.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemovalRecord {
    pub timestamp: u64,
    pub operation_type: String,
    pub original_image_hash: String,
    pub watermarked_image_hash: String,
    pub recovered_image_hash: String,
    pub extraction_ber: f64,
    pub original_watermark: String,
    /// First 256 extracted bits, hex.
    pub extracted_watermark: String,
    pub removal_parameters: RemovalParameters,
}

/// Batch transaction appended by the remover, one per batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchRemoveTransaction {
    pub processing_time: f64,
    pub total_images: usize,
    pub processed_images: usize,
    pub failed_images: Vec<String>,
    pub average_ber: f64,
    pub transaction_dict: BTreeMap<String, RemovalRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_fills_hash() {
        let block = Block::seal(
            BlockHeader {
                timestamp: 1_700_000_000,
                previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
                block_number: 0,
            },
            INFO_GENESIS.to_string(),
            json!({}),
        );
        assert_eq!(block.hash.len(), 64);
        assert_eq!(block.hash, block.compute_hash());
    }

    #[test]
    fn hash_is_deterministic() {
        let make = || {
            Block::seal(
                BlockHeader {
                    timestamp: 1_700_000_000,
                    previous_hash: "ab".repeat(32),
                    block_number: 3,
                },
                INFO_EMBEDDER.to_string(),
                json!({"total_images": 2, "failed_images": []}),
            )
        };
        assert_eq!(make().hash, make().hash);
    }

    #[test]
    fn hash_covers_every_field() {
        let base = Block::seal(
            BlockHeader {
                timestamp: 1,
                previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
                block_number: 1,
            },
            INFO_EMBEDDER.to_string(),
            json!({"k": 1}),
        );

        let mut other = base.clone();
        other.header.timestamp = 2;
        assert_ne!(base.hash, other.compute_hash());

        let mut other = base.clone();
        other.info = INFO_REMOVER.to_string();
        assert_ne!(base.hash, other.compute_hash());

        let mut other = base.clone();
        other.transaction = json!({"k": 2});
        assert_ne!(base.hash, other.compute_hash());
    }

    #[test]
    fn genesis_shape() {
        let g = Block::genesis();
        assert_eq!(g.header.block_number, 0);
        assert_eq!(g.header.previous_hash, GENESIS_PREVIOUS_HASH);
        assert_eq!(g.info, INFO_GENESIS);
        assert_eq!(g.hash, g.compute_hash());
    }

    #[test]
    fn transaction_dict_orders_by_hash() {
        let record = |wat: &str| EmbedRecord {
            timestamp: 0,
            secret_key: "00".repeat(32),
            message: "m".into(),
            watermark: "ff".repeat(32),
            kernel: vec![vec![0.0, 0.25, 0.0]],
            stride: 3,
            t_hi: 0,
            hash_image_wat: wat.to_string(),
            hash_image_orig: "aa".repeat(32),
            bit_depth: 8,
            data_type: "pgm".into(),
            operation_type: "embedding".into(),
            mask_algorithm: "chacha20-msb".into(),
            overflow_map: vec![],
        };

        let mut dict = BTreeMap::new();
        dict.insert("bbbb".to_string(), record("bbbb"));
        dict.insert("aaaa".to_string(), record("aaaa"));
        let keys: Vec<_> = dict.keys().cloned().collect();
        assert_eq!(keys, vec!["aaaa", "bbbb"]);
    }
}
