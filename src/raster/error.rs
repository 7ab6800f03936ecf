// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/provmark

//! Error types for the raster substrate.

use core::fmt;

/// Errors that can occur while constructing or (de)serializing a raster.
#[derive(Debug)]
pub enum RasterError {
    /// Underlying I/O failure while reading or writing pixel data.
    Io(std::io::Error),
    /// The byte stream is not a well-formed raster of the expected format.
    Format(String),
    /// The pixel buffer length does not match `width * height`.
    DimensionMismatch { expected: usize, actual: usize },
    /// A pixel value exceeds the maximum for the declared bit depth.
    PixelOutOfRange { value: u32, max: u16 },
}

impl fmt::Display for RasterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "raster I/O error: {e}"),
            Self::Format(msg) => write!(f, "malformed raster: {msg}"),
            Self::DimensionMismatch { expected, actual } => {
                write!(f, "pixel buffer has {actual} samples, expected {expected}")
            }
            Self::PixelOutOfRange { value, max } => {
                write!(f, "pixel value {value} exceeds bit-depth maximum {max}")
            }
        }
    }
}

impl std::error::Error for RasterError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RasterError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
