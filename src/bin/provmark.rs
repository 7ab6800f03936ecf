// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/provmark

//! provmark CLI
//!
//! Thin adapter over the batch drivers: each subcommand loads a JSON
//! configuration record, opens the ledger, runs one batch, and prints a
//! summary.
//!
//! Exit codes: 0 success, 2 configuration error, 3 ledger corruption or
//! lock contention, 4 I/O error, 5 all images failed.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use provmark_core::{
    embed_batch, extract_batch, remove_batch, EmbedConfig, ExtractConfig, Ledger, LedgerError,
    RemoveConfig, WmError,
};

#[derive(Parser)]
#[command(name = "provmark")]
#[command(about = "Reversible image watermarking with a hash-chained audit ledger")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed a watermark into every image in the configured directory
    Embed {
        /// Path to the embed configuration record (JSON)
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },
    /// Remove watermarks and restore the bit-exact originals
    Remove {
        /// Path to the remove configuration record (JSON)
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },
    /// Forensically match images against recorded watermarks
    Extract {
        /// Path to the extract configuration record (JSON)
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Embed { config } => run_embed(&config),
        Commands::Remove { config } => run_remove(&config),
        Commands::Extract { config } => run_extract(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(exit_code(&e))
        }
    }
}

fn run_embed(config_path: &PathBuf) -> Result<(), WmError> {
    let config = EmbedConfig::from_file(config_path)?;
    let mut ledger = Ledger::open(&config.blockchain_path)?;
    let report = embed_batch(&config, &mut ledger)?;

    println!(
        "embedded {}/{} images into block {}",
        report.processed_images, report.total_images, report.block_number
    );
    if config.secret_key.is_none() {
        println!("secret key (keep this): {}", report.secret_key);
    }
    print_failures(&report.failures);
    Ok(())
}

fn run_remove(config_path: &PathBuf) -> Result<(), WmError> {
    let config = RemoveConfig::from_file(config_path)?;
    let mut ledger = Ledger::open(&config.blockchain_path)?;
    let report = remove_batch(&config, &mut ledger)?;

    println!(
        "recovered {}/{} images, removal block {}, mean BER {:.4}",
        report.processed_images, report.total_images, report.block_number, report.average_ber
    );
    print_failures(&report.failures);
    Ok(())
}

fn run_extract(config_path: &PathBuf) -> Result<(), WmError> {
    let config = ExtractConfig::from_file(config_path)?;
    let ledger = Ledger::open(&config.blockchain_path)?;
    let report = extract_batch(&config, &ledger)?;

    for (name, forensic) in &report.reports {
        match &forensic.matched {
            Some(m) => println!(
                "{name}: BER {:.4} against block {} ({})",
                forensic.ber, m.block_number, m.hash_image_wat
            ),
            None => println!("{name}: no embed records to match against"),
        }
    }
    print_failures(&report.failures);
    Ok(())
}

fn print_failures(failures: &[(String, String)]) {
    for (name, reason) in failures {
        eprintln!("failed: {name}: {reason}");
    }
}

fn exit_code(e: &WmError) -> u8 {
    match e {
        WmError::KernelInvalid(_)
        | WmError::ConfigInvalid(_)
        | WmError::BadKey
        | WmError::EmptyMessage => 2,
        WmError::Ledger(LedgerError::ChainCorrupted { .. })
        | WmError::Ledger(LedgerError::Parse(_))
        | WmError::Ledger(LedgerError::Locked) => 3,
        WmError::Ledger(_) | WmError::Io(_) | WmError::Raster(_) => 4,
        WmError::BatchEmpty => 5,
        _ => 1,
    }
}
