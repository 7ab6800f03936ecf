// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/provmark

//! Append-only hash-chained audit ledger.
//!
//! The ledger is one JSON document: an object mapping decimal block-number
//! strings to block objects. In memory it is a dense vector of [`Block`]s;
//! the only mutation is [`Ledger::append`], which seals a new block over the
//! previous hash and rewrites the document atomically (write-to-temp +
//! rename). An advisory lock file guards the append against a second writer
//! in another process.
//!
//! Chain verification runs on every load: block numbers must be dense,
//! every `previous_hash` must equal the predecessor's `hash`, and every
//! `hash` must recompute from the canonical JSON form (`canonical` module).

pub mod block;
pub mod canonical;
pub mod error;

pub use block::{
    BatchEmbedTransaction, BatchRemoveTransaction, Block, BlockHeader, EmbedRecord,
    RemovalParameters, RemovalRecord, GENESIS_PREVIOUS_HASH, INFO_EMBEDDER, INFO_GENESIS,
    INFO_REMOVER,
};
pub use canonical::canonical_json;
pub use error::LedgerError;

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::wm::keys::{bit_error_rate, hex_to_bits};

/// The process-wide ledger handle.
pub struct Ledger {
    path: PathBuf,
    blocks: Vec<Block>,
}

impl Ledger {
    /// Open the ledger at `path`, verifying the whole chain.
    ///
    /// A missing file initializes a fresh ledger containing only the genesis
    /// block and persists it immediately.
    ///
    /// # Errors
    /// - [`LedgerError::Parse`] if the document is not the expected shape.
    /// - [`LedgerError::ChainCorrupted`] with the first offending index.
    /// - [`LedgerError::Io`] on filesystem failure.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        if !path.exists() {
            let mut ledger = Self {
                path,
                blocks: vec![Block::genesis()],
            };
            ledger.persist()?;
            return Ok(ledger);
        }

        let raw = fs::read_to_string(&path)?;
        let document: BTreeMap<String, Block> = serde_json::from_str(&raw)?;

        let mut numbered: Vec<(u64, Block)> = Vec::with_capacity(document.len());
        for (key, block) in document {
            let number: u64 = key
                .parse()
                .map_err(|_| LedgerError::ChainCorrupted { index: 0 })?;
            numbered.push((number, block));
        }
        numbered.sort_by_key(|(n, _)| *n);
        let blocks: Vec<Block> = numbered.into_iter().map(|(_, b)| b).collect();

        verify_blocks(&blocks)?;
        Ok(Self { path, blocks })
    }

    /// All blocks, genesis first.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// The most recently appended block.
    pub fn last(&self) -> &Block {
        self.blocks.last().expect("ledger always holds genesis")
    }

    /// Re-verify the in-memory chain.
    pub fn verify_chain(&self) -> Result<(), LedgerError> {
        verify_blocks(&self.blocks)
    }

    /// Seal a new block over the current tip and persist it.
    ///
    /// Holds the advisory lock for the duration of the append. On persist
    /// failure the in-memory chain is rolled back, so the handle never
    /// diverges from the document.
    ///
    /// # Errors
    /// - [`LedgerError::Locked`] if another writer holds the lock.
    /// - [`LedgerError::Io`] on filesystem failure.
    pub fn append(&mut self, info: &str, transaction: Value) -> Result<u64, LedgerError> {
        let _lock = LockGuard::acquire(&self.path)?;

        let tip = self.last();
        let header = BlockHeader {
            timestamp: block::unix_timestamp(),
            previous_hash: tip.hash.clone(),
            block_number: tip.header.block_number + 1,
        };
        let number = header.block_number;
        self.blocks
            .push(Block::seal(header, info.to_string(), transaction));

        if let Err(e) = self.persist() {
            self.blocks.pop();
            return Err(e);
        }
        Ok(number)
    }

    /// Find the embed record whose watermarked-image hash equals `hash`.
    ///
    /// Linear scan over embedder blocks, oldest first.
    pub fn find_by_watermarked_hash(&self, hash: &str) -> Option<EmbedRecord> {
        self.embedder_records()
            .into_iter()
            .map(|(_, record)| record)
            .find(|record| record.hash_image_wat == hash)
    }

    /// Every embed record in the chain, paired with its block.
    pub fn embedder_records(&self) -> Vec<(&Block, EmbedRecord)> {
        let mut records = Vec::new();
        for block in &self.blocks {
            if block.info != INFO_EMBEDDER {
                continue;
            }
            let Ok(tx) =
                serde_json::from_value::<BatchEmbedTransaction>(block.transaction.clone())
            else {
                continue;
            };
            for (_, record) in tx.transaction_dict {
                records.push((block, record));
            }
        }
        records
    }

    /// Best watermark match for an extracted bit sequence.
    ///
    /// Compares `bits` cyclically against the `watermark` field of up to
    /// `max_records` embed records and returns the record with the minimum
    /// bit error rate. `None` when the chain holds no embed records.
    pub fn find_best_match_by_bits(
        &self,
        bits: &[u8],
        max_records: usize,
    ) -> Option<(EmbedRecord, f64)> {
        let mut best: Option<(EmbedRecord, f64)> = None;
        for (_, record) in self.embedder_records().into_iter().take(max_records) {
            let Some(reference) = hex_to_bits(&record.watermark) else {
                continue;
            };
            let ber = bit_error_rate(bits, &reference);
            if best.as_ref().map_or(true, |(_, b)| ber < *b) {
                best = Some((record, ber));
            }
        }
        best
    }

    /// Rewrite the document: serialize all blocks keyed by decimal number,
    /// write to a sibling temp file, then rename over the target.
    fn persist(&mut self) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let document: BTreeMap<String, &Block> = self
            .blocks
            .iter()
            .map(|b| (b.header.block_number.to_string(), b))
            .collect();
        let rendered = serde_json::to_string_pretty(&document)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, rendered)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn verify_blocks(blocks: &[Block]) -> Result<(), LedgerError> {
    if blocks.is_empty() {
        return Err(LedgerError::ChainCorrupted { index: 0 });
    }
    for (i, blk) in blocks.iter().enumerate() {
        let index = i as u64;
        if blk.header.block_number != index {
            return Err(LedgerError::ChainCorrupted { index });
        }
        let expected_prev = if i == 0 {
            GENESIS_PREVIOUS_HASH
        } else {
            blocks[i - 1].hash.as_str()
        };
        if blk.header.previous_hash != expected_prev {
            return Err(LedgerError::ChainCorrupted { index });
        }
        if blk.hash != blk.compute_hash() {
            return Err(LedgerError::ChainCorrupted { index });
        }
    }
    Ok(())
}

/// Advisory lock: a sibling `.lock` file created with `create_new`.
/// Released on drop. A dangling lock after a crash must be removed by the
/// operator; refusing to append is the safe default.
struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    fn acquire(ledger_path: &Path) -> Result<Self, LedgerError> {
        let path = ledger_path.with_extension("json.lock");
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Self { path }),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(LedgerError::Locked),
            Err(e) => Err(LedgerError::Io(e)),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
