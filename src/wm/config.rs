// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/provmark

//! Operation configuration records.
//!
//! Explicit records with the full option set, deserialized from JSON with
//! `deny_unknown_fields` so a typo fails loudly instead of silently taking
//! a default. Removal and extraction carry no codec parameters: those are
//! read back from the matched ledger record, never supplied twice.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::raster::BitDepth;

use super::error::WmError;
use super::kernel::{CodecParams, Kernel};

fn default_stride() -> u32 {
    3
}

fn default_t_hi() -> i64 {
    0
}

/// Configuration of a batch embed operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbedConfig {
    /// Directory of input images.
    pub data_path: PathBuf,
    /// Directory for marked outputs.
    pub save_path: PathBuf,
    /// Watermark message (UTF-8, non-empty).
    pub message: String,
    /// 64 hex digits; generated (and returned in the report) when absent.
    #[serde(default)]
    pub secret_key: Option<String>,
    /// Ledger JSON document.
    pub blockchain_path: PathBuf,
    /// Prediction kernel rows; 4-neighbour average when absent.
    #[serde(default)]
    pub kernel: Option<Vec<Vec<f64>>>,
    #[serde(default = "default_stride")]
    pub stride: u32,
    #[serde(default = "default_t_hi")]
    pub t_hi: i64,
    /// 8 or 16; defaults to 16 for `dcm` data and 8 otherwise.
    #[serde(default)]
    pub bit_depth: Option<u8>,
    /// File-extension filter, e.g. `"pgm"`.
    pub data_type: String,
}

impl EmbedConfig {
    /// Load a configuration record from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, WmError> {
        let file = File::open(path)?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| WmError::ConfigInvalid(e.to_string()))
    }

    /// Validate kernel, stride, and threshold into codec parameters.
    pub fn codec_params(&self) -> Result<CodecParams, WmError> {
        let kernel = match &self.kernel {
            Some(rows) => Kernel::new(rows)?,
            None => Kernel::four_neighbour(),
        };
        CodecParams::new(kernel, self.stride, self.t_hi)
    }

    /// Resolve the effective bit depth.
    ///
    /// Medical containers default to 16 bits, everything else to 8.
    pub fn resolved_bit_depth(&self) -> Result<BitDepth, WmError> {
        match self.bit_depth {
            Some(bits) => BitDepth::from_bits(bits).ok_or_else(|| {
                WmError::ConfigInvalid(format!("bit_depth {bits} not in {{8, 16}}"))
            }),
            None if self.data_type.eq_ignore_ascii_case("dcm") => Ok(BitDepth::Sixteen),
            None => Ok(BitDepth::Eight),
        }
    }
}

/// Configuration of a batch removal operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemoveConfig {
    /// Directory of watermarked inputs.
    pub data_path: PathBuf,
    /// Directory for recovered outputs.
    pub save_path: PathBuf,
    /// Ledger JSON document.
    pub blockchain_path: PathBuf,
    /// File-extension filter.
    pub data_type: String,
}

impl RemoveConfig {
    pub fn from_file(path: &Path) -> Result<Self, WmError> {
        let file = File::open(path)?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| WmError::ConfigInvalid(e.to_string()))
    }
}

/// Configuration of a batch forensic-extraction operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtractConfig {
    /// Directory of suspect images.
    pub data_path: PathBuf,
    /// Directory for extracted watermark bit files.
    pub ext_wat_path: PathBuf,
    /// Ledger JSON document.
    pub blockchain_path: PathBuf,
    /// File-extension filter.
    pub data_type: String,
}

impl ExtractConfig {
    pub fn from_file(path: &Path) -> Result<Self, WmError> {
        let file = File::open(path)?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| WmError::ConfigInvalid(e.to_string()))
    }
}
