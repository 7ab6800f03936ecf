// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only
// https://github.com/cgaffga/provmark

//! Ledger chain integrity tests: append linking, persistence, typed batch
//! transactions, and corruption detection on reload.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde_json::json;

use provmark_core::ledger::{
    BatchEmbedTransaction, Block, EmbedRecord, Ledger, LedgerError, GENESIS_PREVIOUS_HASH,
    INFO_EMBEDDER,
};

fn temp_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "provmark-chain-{}-{}.json",
        tag,
        std::process::id()
    ))
}

fn cleanup(path: &PathBuf) {
    let _ = fs::remove_file(path);
    let _ = fs::remove_file(path.with_extension("json.lock"));
    let _ = fs::remove_file(path.with_extension("json.tmp"));
}

fn sample_record(wat_hash: &str, orig_hash: &str) -> EmbedRecord {
    EmbedRecord {
        timestamp: 1_700_000_000,
        secret_key: "00".repeat(32),
        message: "audit me".to_string(),
        watermark: "9f".repeat(32),
        kernel: vec![
            vec![0.0, 0.25, 0.0],
            vec![0.25, 0.0, 0.25],
            vec![0.0, 0.25, 0.0],
        ],
        stride: 3,
        t_hi: 0,
        hash_image_wat: wat_hash.to_string(),
        hash_image_orig: orig_hash.to_string(),
        bit_depth: 8,
        data_type: "pgm".to_string(),
        operation_type: "embedding".to_string(),
        mask_algorithm: "chacha20-msb".to_string(),
        overflow_map: vec![3, 17],
    }
}

fn embed_transaction(records: &[EmbedRecord]) -> serde_json::Value {
    let mut transaction_dict = BTreeMap::new();
    for record in records {
        transaction_dict.insert(record.hash_image_wat.clone(), record.clone());
    }
    serde_json::to_value(BatchEmbedTransaction {
        processing_time: 0.25,
        total_images: records.len(),
        processed_images: records.len(),
        failed_images: vec![],
        transaction_dict,
    })
    .unwrap()
}

#[test]
fn batch_block_links_to_genesis() {
    let path = temp_path("link");
    cleanup(&path);

    let mut ledger = Ledger::open(&path).unwrap();
    let genesis_hash = ledger.last().hash.clone();

    // Two per-image records in one batch block.
    let records = vec![
        sample_record(&"bb".repeat(32), &"b0".repeat(32)),
        sample_record(&"aa".repeat(32), &"a0".repeat(32)),
    ];
    let number = ledger.append(INFO_EMBEDDER, embed_transaction(&records)).unwrap();

    assert_eq!(number, 1);
    let block = &ledger.blocks()[1];
    assert_eq!(block.header.previous_hash, genesis_hash);
    assert_eq!(block.header.block_number, 1);

    // transaction_dict entries come back ordered by watermarked-image hash.
    let keys: Vec<String> = block.transaction["transaction_dict"]
        .as_object()
        .unwrap()
        .keys()
        .cloned()
        .collect();
    assert_eq!(keys, vec!["aa".repeat(32), "bb".repeat(32)]);

    cleanup(&path);
}

#[test]
fn typed_records_roundtrip_through_disk() {
    let path = temp_path("typed");
    cleanup(&path);

    {
        let mut ledger = Ledger::open(&path).unwrap();
        let record = sample_record(&"cc".repeat(32), &"c0".repeat(32));
        ledger.append(INFO_EMBEDDER, embed_transaction(&[record])).unwrap();
    }

    let ledger = Ledger::open(&path).unwrap();
    let found = ledger.find_by_watermarked_hash(&"cc".repeat(32)).unwrap();
    assert_eq!(found.hash_image_orig, "c0".repeat(32));
    assert_eq!(found.overflow_map, vec![3, 17]);
    assert_eq!(found.mask_algorithm, "chacha20-msb");
    assert!(ledger.find_by_watermarked_hash(&"dd".repeat(32)).is_none());

    cleanup(&path);
}

#[test]
fn block_numbers_are_dense() {
    let path = temp_path("dense");
    cleanup(&path);

    let mut ledger = Ledger::open(&path).unwrap();
    for i in 1..=5u64 {
        let n = ledger.append(INFO_EMBEDDER, json!({"batch": i})).unwrap();
        assert_eq!(n, i);
    }
    for (i, block) in ledger.blocks().iter().enumerate() {
        assert_eq!(block.header.block_number, i as u64);
    }
    ledger.verify_chain().unwrap();

    cleanup(&path);
}

#[test]
fn flipped_hash_byte_detected_at_its_index() {
    let path = temp_path("flip");
    cleanup(&path);

    {
        let mut ledger = Ledger::open(&path).unwrap();
        for i in 1..=3u64 {
            ledger.append(INFO_EMBEDDER, json!({"batch": i})).unwrap();
        }
    }

    // Corrupt block 2's stored hash and reload.
    let raw = fs::read_to_string(&path).unwrap();
    let mut document: BTreeMap<String, Block> = serde_json::from_str(&raw).unwrap();
    let target = document.get_mut("2").unwrap();
    let mut hash = target.hash.clone();
    let last = hash.pop().unwrap();
    hash.push(if last == 'f' { 'e' } else { 'f' });
    target.hash = hash;
    fs::write(&path, serde_json::to_string_pretty(&document).unwrap()).unwrap();

    match Ledger::open(&path) {
        Err(LedgerError::ChainCorrupted { index }) => assert_eq!(index, 2),
        other => panic!("expected corruption at block 2, got {:?}", other.err()),
    }

    cleanup(&path);
}

#[test]
fn broken_link_detected() {
    let path = temp_path("unlink");
    cleanup(&path);

    {
        let mut ledger = Ledger::open(&path).unwrap();
        ledger.append(INFO_EMBEDDER, json!({"batch": 1})).unwrap();
        ledger.append(INFO_EMBEDDER, json!({"batch": 2})).unwrap();
    }

    // Re-seal block 2 over a forged previous_hash. The block's own hash is
    // recomputed, so only the link check can catch the forgery.
    let raw = fs::read_to_string(&path).unwrap();
    let mut document: BTreeMap<String, Block> = serde_json::from_str(&raw).unwrap();
    let target = document.get_mut("2").unwrap();
    target.header.previous_hash = "1".repeat(64);
    target.hash = target.compute_hash();
    fs::write(&path, serde_json::to_string_pretty(&document).unwrap()).unwrap();

    assert!(matches!(
        Ledger::open(&path),
        Err(LedgerError::ChainCorrupted { index: 2 })
    ));

    cleanup(&path);
}

#[test]
fn genesis_has_the_fixed_previous_hash() {
    let path = temp_path("genesis");
    cleanup(&path);

    let ledger = Ledger::open(&path).unwrap();
    assert_eq!(ledger.blocks()[0].header.previous_hash, GENESIS_PREVIOUS_HASH);
    assert_eq!(GENESIS_PREVIOUS_HASH, "0".repeat(64));

    cleanup(&path);
}

#[test]
fn best_match_by_bits_prefers_lower_ber() {
    let path = temp_path("ber");
    cleanup(&path);

    let mut ledger = Ledger::open(&path).unwrap();

    // Two records with opposite watermarks.
    let mut near = sample_record(&"11".repeat(32), &"10".repeat(32));
    near.watermark = "00".repeat(32); // all-zero bits
    let mut far = sample_record(&"22".repeat(32), &"20".repeat(32));
    far.watermark = "ff".repeat(32); // all-one bits
    ledger
        .append(INFO_EMBEDDER, embed_transaction(&[near, far]))
        .unwrap();

    // 7 zeros and a one: much closer to the all-zero watermark.
    let bits = [0u8, 0, 0, 0, 0, 0, 0, 1];
    let (record, ber) = ledger.find_best_match_by_bits(&bits, usize::MAX).unwrap();
    assert_eq!(record.watermark, "00".repeat(32));
    assert!((ber - 0.125).abs() < 1e-12);

    cleanup(&path);
}
