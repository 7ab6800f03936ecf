// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/provmark

//! Pixel source/sink seam.
//!
//! The codec and the batch driver only ever see a [`Raster`]; where the
//! pixels come from is behind these two traits. The crate ships a PGM
//! implementation; container formats with external dependencies (DICOM and
//! friends) plug in from the outside through the same seam.

use std::fs;
use std::path::Path;

use super::{pgm, Raster, RasterError};

/// Anything that can produce a raster from a file path.
pub trait PixelSource: Sync {
    fn load(&self, path: &Path) -> Result<Raster, RasterError>;
}

/// Anything that can persist a raster to a file path.
pub trait PixelSink: Sync {
    fn store(&self, path: &Path, raster: &Raster) -> Result<(), RasterError>;
}

/// Built-in raster formats addressable by a `data_type` extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatCodec {
    Pgm,
}

impl FormatCodec {
    /// Resolve a `data_type` file-extension string to a codec.
    pub fn for_data_type(data_type: &str) -> Option<Self> {
        if data_type.eq_ignore_ascii_case("pgm") {
            Some(Self::Pgm)
        } else {
            None
        }
    }
}

impl PixelSource for FormatCodec {
    fn load(&self, path: &Path) -> Result<Raster, RasterError> {
        match self {
            Self::Pgm => pgm::decode(&fs::read(path)?),
        }
    }
}

impl PixelSink for FormatCodec {
    fn store(&self, path: &Path, raster: &Raster) -> Result<(), RasterError> {
        match self {
            Self::Pgm => Ok(fs::write(path, pgm::encode(raster))?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::BitDepth;

    #[test]
    fn data_type_resolution() {
        assert_eq!(FormatCodec::for_data_type("pgm"), Some(FormatCodec::Pgm));
        assert_eq!(FormatCodec::for_data_type("PGM"), Some(FormatCodec::Pgm));
        assert_eq!(FormatCodec::for_data_type("dcm"), None);
        assert_eq!(FormatCodec::for_data_type(""), None);
    }

    #[test]
    fn store_load_roundtrip() {
        let dir = std::env::temp_dir().join(format!("provmark-src-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("probe.pgm");

        let r = Raster::from_vec(2, 2, BitDepth::Eight, vec![9, 8, 7, 6]).unwrap();
        FormatCodec::Pgm.store(&path, &r).unwrap();
        assert_eq!(FormatCodec::Pgm.load(&path).unwrap(), r);

        std::fs::remove_dir_all(&dir).ok();
    }
}
