// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/provmark

//! Batch drivers: directory in, one ledger block out.
//!
//! Each driver walks the `data_path` entries matching the configured
//! extension in filename order, runs the codec per image, and appends a
//! single block carrying every per-image record. A failing image is
//! recorded under `failed_images` and does not stop the batch; a batch
//! where nothing succeeded appends no block and returns
//! [`WmError::BatchEmpty`]. Cancellation is honoured at image boundaries
//! and likewise appends nothing.
//!
//! With the `parallel` feature, per-image work runs on the rayon pool.
//! Input files are sorted before the fan-out and the fan-in preserves that
//! order, and the transaction dictionary is a `BTreeMap` keyed by
//! watermarked-image hash, so the appended block is byte-identical to the
//! serial run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::ledger::{
    block::unix_timestamp, BatchEmbedTransaction, BatchRemoveTransaction, EmbedRecord, Ledger,
    RemovalParameters, RemovalRecord, INFO_EMBEDDER, INFO_REMOVER,
};
use crate::raster::{
    hash::canonical_digest,
    source::{FormatCodec, PixelSink, PixelSource},
    BitDepth,
};

use super::config::{EmbedConfig, ExtractConfig, RemoveConfig};
use super::embed::embed;
use super::error::WmError;
use super::extract::{extract, forensic_scan, ForensicReport};
use super::kernel::{CandidateGrid, CodecParams, Kernel};
use super::keys::{self, SecretKey, MASK_ALGORITHM, WATERMARK_BITS};
use super::progress;

/// Outcome of a batch embed.
#[derive(Clone, Debug)]
pub struct BatchEmbedReport {
    pub total_images: usize,
    pub processed_images: usize,
    pub failed_images: Vec<String>,
    /// Human-readable reason per failed image.
    pub failures: Vec<(String, String)>,
    /// Per-image records, ordered by watermarked-image hash as in the block.
    pub records: Vec<EmbedRecord>,
    pub block_number: u64,
    /// The key used for the batch; callers must retain it when it was
    /// generated rather than supplied.
    pub secret_key: String,
}

/// Outcome of a batch removal.
#[derive(Clone, Debug)]
pub struct BatchRemoveReport {
    pub total_images: usize,
    pub processed_images: usize,
    pub failed_images: Vec<String>,
    /// Human-readable reason per failed image.
    pub failures: Vec<(String, String)>,
    /// Per-image records, ordered by watermarked-image hash as in the block.
    pub records: Vec<RemovalRecord>,
    pub average_ber: f64,
    pub block_number: u64,
}

/// Outcome of a batch forensic extraction. Appends no ledger block.
#[derive(Clone, Debug)]
pub struct BatchExtractReport {
    pub total_images: usize,
    pub processed_images: usize,
    pub failed_images: Vec<String>,
    /// Human-readable reason per failed image.
    pub failures: Vec<(String, String)>,
    /// Per-image forensic reports, filename first.
    pub reports: Vec<(String, ForensicReport)>,
}

/// Embed the configured watermark into every matching image in `data_path`.
pub fn embed_batch(
    config: &EmbedConfig,
    ledger: &mut Ledger,
) -> Result<BatchEmbedReport, WmError> {
    if config.message.is_empty() {
        return Err(WmError::EmptyMessage);
    }
    let params = config.codec_params()?;
    let depth = config.resolved_bit_depth()?;
    let codec = data_type_codec(&config.data_type)?;
    let key = match &config.secret_key {
        Some(hex) => SecretKey::from_hex(hex)?,
        None => SecretKey::generate(),
    };
    let watermark = keys::watermark_bits(config.message.as_bytes(), &key)?;
    let watermark_hex = keys::watermark_hex(config.message.as_bytes(), &key)?;

    let files = list_input_files(&config.data_path, &config.data_type)?;
    let total_images = files.len();
    fs::create_dir_all(&config.save_path)?;

    let started = Instant::now();
    progress::init(total_images as u32);

    let results = run_per_image(&files, |path| {
        embed_one(
            path, config, &params, depth, codec, &key, &watermark, &watermark_hex,
        )
    });

    let mut transaction_dict = BTreeMap::new();
    let mut failed_images = Vec::new();
    let mut failures = Vec::new();
    for (path, result) in results {
        match result {
            Ok(record) => {
                transaction_dict.insert(record.hash_image_wat.clone(), record);
            }
            Err(WmError::Cancelled) => return Err(WmError::Cancelled),
            Err(e) => {
                let name = display_name(&path);
                failed_images.push(name.clone());
                failures.push((name, e.to_string()));
            }
        }
    }

    let processed_images = transaction_dict.len();
    if processed_images == 0 {
        return Err(WmError::BatchEmpty);
    }
    let records: Vec<EmbedRecord> = transaction_dict.values().cloned().collect();

    let tx = BatchEmbedTransaction {
        processing_time: started.elapsed().as_secs_f64(),
        total_images,
        processed_images,
        failed_images: failed_images.clone(),
        transaction_dict,
    };
    let block_number = ledger.append(
        INFO_EMBEDDER,
        serde_json::to_value(&tx).map_err(|e| WmError::Ledger(e.into()))?,
    )?;
    progress::finish();

    Ok(BatchEmbedReport {
        total_images,
        processed_images,
        failed_images,
        failures,
        records,
        block_number,
        secret_key: key.to_hex(),
    })
}

#[allow(clippy::too_many_arguments)]
fn embed_one(
    path: &Path,
    config: &EmbedConfig,
    params: &CodecParams,
    depth: BitDepth,
    codec: FormatCodec,
    key: &SecretKey,
    watermark: &[u8],
    watermark_hex: &str,
) -> Result<EmbedRecord, WmError> {
    let cover = codec.load(path)?;
    if cover.depth() != depth {
        return Err(WmError::BitDepthMismatch);
    }

    let grid = CandidateGrid::new(cover.width(), cover.height(), &params.kernel, params.stride)?;
    let mask = keys::mask_bits(key, grid.len());
    let outcome = embed(&cover, params, watermark, &mask)?;

    let out_path = config
        .save_path
        .join(format!("watermarked_{}", display_name(path)));
    codec.store(&out_path, &outcome.marked)?;

    Ok(EmbedRecord {
        timestamp: unix_timestamp(),
        secret_key: key.to_hex(),
        message: config.message.clone(),
        watermark: watermark_hex.to_string(),
        kernel: params.kernel.rows(),
        stride: params.stride,
        t_hi: params.t_hi,
        hash_image_wat: canonical_digest(&outcome.marked),
        hash_image_orig: canonical_digest(&cover),
        bit_depth: depth.bits(),
        data_type: config.data_type.clone(),
        operation_type: "embedding".to_string(),
        mask_algorithm: MASK_ALGORITHM.to_string(),
        overflow_map: outcome.overflow_map,
    })
}

/// Remove the watermark from every matching image, restoring the originals.
///
/// Every codec parameter comes from the ledger record matched by the
/// watermarked-image hash; an unmatched image fails with
/// [`WmError::NoMatch`] and the batch continues.
pub fn remove_batch(
    config: &RemoveConfig,
    ledger: &mut Ledger,
) -> Result<BatchRemoveReport, WmError> {
    let codec = data_type_codec(&config.data_type)?;
    let files = list_input_files(&config.data_path, &config.data_type)?;
    let total_images = files.len();
    fs::create_dir_all(&config.save_path)?;

    let started = Instant::now();
    progress::init(total_images as u32);

    let shared: &Ledger = ledger;
    let results = run_per_image(&files, |path| remove_one(path, config, codec, shared));

    let mut transaction_dict = BTreeMap::new();
    let mut failed_images = Vec::new();
    let mut failures = Vec::new();
    for (path, result) in results {
        match result {
            Ok(record) => {
                transaction_dict.insert(record.watermarked_image_hash.clone(), record);
            }
            Err(WmError::Cancelled) => return Err(WmError::Cancelled),
            Err(e) => {
                let name = display_name(&path);
                failed_images.push(name.clone());
                failures.push((name, e.to_string()));
            }
        }
    }

    let processed_images = transaction_dict.len();
    if processed_images == 0 {
        return Err(WmError::BatchEmpty);
    }
    let average_ber = transaction_dict
        .values()
        .map(|r| r.extraction_ber)
        .sum::<f64>()
        / processed_images as f64;
    let records: Vec<RemovalRecord> = transaction_dict.values().cloned().collect();

    let tx = BatchRemoveTransaction {
        processing_time: started.elapsed().as_secs_f64(),
        total_images,
        processed_images,
        failed_images: failed_images.clone(),
        average_ber,
        transaction_dict,
    };
    let block_number = ledger.append(
        INFO_REMOVER,
        serde_json::to_value(&tx).map_err(|e| WmError::Ledger(e.into()))?,
    )?;
    progress::finish();

    Ok(BatchRemoveReport {
        total_images,
        processed_images,
        failed_images,
        failures,
        records,
        average_ber,
        block_number,
    })
}

fn remove_one(
    path: &Path,
    config: &RemoveConfig,
    codec: FormatCodec,
    ledger: &Ledger,
) -> Result<RemovalRecord, WmError> {
    let marked = codec.load(path)?;
    let digest = canonical_digest(&marked);
    let record = ledger
        .find_by_watermarked_hash(&digest)
        .ok_or(WmError::NoMatch)?;
    if record.bit_depth != marked.depth().bits() {
        return Err(WmError::BitDepthMismatch);
    }

    let kernel = Kernel::new(&record.kernel)?;
    let params = CodecParams::new(kernel, record.stride, record.t_hi)?;
    let key = SecretKey::from_hex(&record.secret_key)?;
    let grid = CandidateGrid::new(marked.width(), marked.height(), &params.kernel, params.stride)?;
    let mask = keys::mask_bits(&key, grid.len());

    let outcome = extract(&marked, &params, &mask, &record.overflow_map)?;
    let recovered_hash = canonical_digest(&outcome.recovered);
    if recovered_hash != record.hash_image_orig {
        return Err(WmError::RecoveryMismatch);
    }

    let out_path = config
        .save_path
        .join(format!("recovered_{}", display_name(path)));
    codec.store(&out_path, &outcome.recovered)?;

    let reference = keys::hex_to_bits(&record.watermark).unwrap_or_default();
    let extraction_ber = keys::bit_error_rate(&outcome.bits, &reference);
    let carried = outcome.bits.len().min(WATERMARK_BITS);

    Ok(RemovalRecord {
        timestamp: unix_timestamp(),
        operation_type: "removal".to_string(),
        original_image_hash: record.hash_image_orig.clone(),
        watermarked_image_hash: digest,
        recovered_image_hash: recovered_hash,
        extraction_ber,
        original_watermark: record.watermark.clone(),
        extracted_watermark: keys::bits_to_hex(&outcome.bits[..carried]),
        removal_parameters: RemovalParameters {
            kernel: record.kernel,
            stride: record.stride,
            t_hi: record.t_hi,
            bit_depth: record.bit_depth,
        },
    })
}

/// Forensically scan every matching image against the ledger.
///
/// Writes the extracted bits of each best match (hex) to
/// `ext_wat_path/<stem>.wat`. Appends no ledger block.
pub fn extract_batch(
    config: &ExtractConfig,
    ledger: &Ledger,
) -> Result<BatchExtractReport, WmError> {
    let codec = data_type_codec(&config.data_type)?;
    let files = list_input_files(&config.data_path, &config.data_type)?;
    let total_images = files.len();
    fs::create_dir_all(&config.ext_wat_path)?;

    progress::init(total_images as u32);

    let results = run_per_image(&files, |path| extract_one(path, config, codec, ledger));

    let mut reports = Vec::new();
    let mut failed_images = Vec::new();
    let mut failures = Vec::new();
    for (path, result) in results {
        match result {
            Ok(report) => reports.push((display_name(&path), report)),
            Err(WmError::Cancelled) => return Err(WmError::Cancelled),
            Err(e) => {
                let name = display_name(&path);
                failed_images.push(name.clone());
                failures.push((name, e.to_string()));
            }
        }
    }

    let processed_images = reports.len();
    if processed_images == 0 {
        return Err(WmError::BatchEmpty);
    }
    progress::finish();

    Ok(BatchExtractReport {
        total_images,
        processed_images,
        failed_images,
        failures,
        reports,
    })
}

fn extract_one(
    path: &Path,
    config: &ExtractConfig,
    codec: FormatCodec,
    ledger: &Ledger,
) -> Result<ForensicReport, WmError> {
    let image = codec.load(path)?;
    let report = forensic_scan(&image, ledger, &config.data_type)?;

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    fs::write(
        config.ext_wat_path.join(format!("{stem}.wat")),
        keys::bits_to_hex(&report.bits),
    )?;
    Ok(report)
}

fn data_type_codec(data_type: &str) -> Result<FormatCodec, WmError> {
    FormatCodec::for_data_type(data_type)
        .ok_or_else(|| WmError::ConfigInvalid(format!("unsupported data_type {data_type:?}")))
}

/// Files in `dir` whose extension matches `data_type`, sorted by name.
fn list_input_files(dir: &Path, data_type: &str) -> Result<Vec<PathBuf>, WmError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(data_type))
            .unwrap_or(false);
        if matches {
            files.push(path);
        }
    }
    files.sort_by_key(|p| p.file_name().map(|n| n.to_owned()));
    Ok(files)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Run `op` per file, serially, checking cancellation at each boundary.
#[cfg(not(feature = "parallel"))]
fn run_per_image<T, F>(files: &[PathBuf], op: F) -> Vec<(PathBuf, Result<T, WmError>)>
where
    F: Fn(&Path) -> Result<T, WmError>,
{
    files
        .iter()
        .map(|path| {
            let result = progress::check_cancelled().and_then(|_| op(path));
            progress::advance();
            (path.clone(), result)
        })
        .collect()
}

/// Run `op` per file on the rayon pool. The fan-in preserves input order,
/// so downstream merging stays deterministic.
#[cfg(feature = "parallel")]
fn run_per_image<T, F>(files: &[PathBuf], op: F) -> Vec<(PathBuf, Result<T, WmError>)>
where
    T: Send,
    F: Fn(&Path) -> Result<T, WmError> + Sync,
{
    use rayon::prelude::*;

    files
        .par_iter()
        .map(|path| {
            let result = progress::check_cancelled().and_then(|_| op(path));
            progress::advance();
            (path.clone(), result)
        })
        .collect()
}
