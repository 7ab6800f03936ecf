// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/provmark

//! Error types for the audit ledger.

use core::fmt;

/// Errors that can occur while loading, verifying, or appending to a ledger.
#[derive(Debug)]
pub enum LedgerError {
    /// Underlying I/O failure on the ledger document or its lock file.
    Io(std::io::Error),
    /// The ledger document is not well-formed JSON of the expected shape.
    Parse(serde_json::Error),
    /// Chain verification failed; `index` is the first offending block.
    ChainCorrupted { index: u64 },
    /// Another writer holds the advisory lock.
    Locked,
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "ledger I/O error: {e}"),
            Self::Parse(e) => write!(f, "ledger document malformed: {e}"),
            Self::ChainCorrupted { index } => {
                write!(f, "hash chain broken at block {index}")
            }
            Self::Locked => write!(f, "ledger is locked by another writer"),
        }
    }
}

impl std::error::Error for LedgerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}
