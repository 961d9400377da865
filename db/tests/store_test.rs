// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use seafair_db::{Durability, Error, Seafair, HEADER_BYTES, SECTOR};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn temp_store(durability: Durability) -> (TempDir, PathBuf, Seafair) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.sea");
    let store = Seafair::open(&path, durability).unwrap();
    (dir, path, store)
}

#[test]
fn set_then_get() {
    let (_dir, _path, mut store) = temp_store(Durability::App);
    store.set(&[("name", "alice")], b"A", "User").unwrap();
    let got = store.get(&[("name", "alice")], "User").unwrap();
    assert_eq!(got.as_deref(), Some(&b"A"[..]));
}

#[test]
fn get_missing_returns_none() {
    let (_dir, _path, mut store) = temp_store(Durability::App);
    assert_eq!(store.get(&[("name", "nobody")], "User").unwrap(), None);
    store.set(&[("name", "alice")], b"A", "User").unwrap();
    assert_eq!(store.get(&[("name", "bob")], "User").unwrap(), None);
}

#[test]
fn overwrite_wins_and_keeps_both_blobs() {
    let (_dir, path, mut store) = temp_store(Durability::App);
    store.set(&[("k", "42")], b"x", "T").unwrap();
    store.set(&[("k", "42")], b"yy", "T").unwrap();
    assert_eq!(
        store.get(&[("k", "42")], "T").unwrap().as_deref(),
        Some(&b"yy"[..])
    );

    // Nothing is ever reclaimed: the first blob stays on disk right after
    // the first table, shadowed by the second.
    let bytes = fs::read(&path).unwrap();
    let blobs = HEADER_BYTES + SECTOR;
    assert_eq!(&bytes[blobs..], b"xyy");
}

#[test]
fn namespace_isolation() {
    let (_dir, _path, mut store) = temp_store(Durability::App);
    store.set(&[("id", "1")], b"from A", "A").unwrap();
    store.set(&[("id", "1")], b"from B", "B").unwrap();
    assert_eq!(
        store.get(&[("id", "1")], "A").unwrap().as_deref(),
        Some(&b"from A"[..])
    );
    assert_eq!(
        store.get(&[("id", "1")], "B").unwrap().as_deref(),
        Some(&b"from B"[..])
    );
    assert_eq!(store.get(&[("id", "1")], "C").unwrap(), None);
}

#[test]
fn key_field_order_is_irrelevant() {
    let (_dir, _path, mut store) = temp_store(Durability::App);
    store
        .set(&[("user", "u1"), ("device", "d1")], b"tok", "Session")
        .unwrap();
    let got = store
        .get(&[("device", "d1"), ("user", "u1")], "Session")
        .unwrap();
    assert_eq!(got.as_deref(), Some(&b"tok"[..]));
}

#[test]
fn empty_value_roundtrips() {
    let (_dir, _path, mut store) = temp_store(Durability::App);
    store.set(&[("k", "empty")], b"", "T").unwrap();
    assert_eq!(store.get(&[("k", "empty")], "T").unwrap(), Some(Vec::new()));
}

#[test]
fn sector_saturation_promotes_a_table() {
    let (_dir, _path, mut store) = temp_store(Durability::App);
    // The first table has a single probe position, so every key lands in
    // the same 73-entry sector.
    for i in 0..73 {
        store.set(&[("k", i.to_string())], b"v", "Sat").unwrap();
    }
    assert_eq!(store.table_count(), 1);
    store.set(&[("k", "73")], b"v", "Sat").unwrap();
    assert_eq!(store.table_count(), 2);
    for i in 0..74 {
        let got = store.get(&[("k", i.to_string())], "Sat").unwrap();
        assert_eq!(got.as_deref(), Some(&b"v"[..]), "key {i} lost");
    }
}

#[test]
fn many_keys_grow_tables_and_roundtrip() {
    let (_dir, path, mut store) = temp_store(Durability::App);
    let mut blob_bytes = 0;
    for i in 0..10_000 {
        let value = i.to_string();
        store.set(&[("i", value.as_str())], value.as_bytes(), "Num").unwrap();
        blob_bytes += value.len();
    }
    assert!(store.table_count() >= 3, "tables: {}", store.table_count());
    for i in 0..10_000 {
        let value = i.to_string();
        let got = store.get(&[("i", value.as_str())], "Num").unwrap();
        assert_eq!(got.as_deref(), Some(value.as_bytes()), "key {i} lost");
    }

    let file_len = fs::metadata(&path).unwrap().len() as usize;
    assert!(file_len >= blob_bytes + HEADER_BYTES + SECTOR);

    // Table offsets in the header decrease with age: the newest table sits
    // at the highest offset and the oldest is right after the header.
    let bytes = fs::read(&path).unwrap();
    let slot = |i: usize| u64::from_le_bytes(bytes[i * 8..i * 8 + 8].try_into().unwrap());
    let n = store.table_count();
    for i in 1..n {
        assert!(slot(i - 1) > slot(i), "slot {i} out of order");
    }
    assert_eq!(slot(n - 1), HEADER_BYTES as u64);
    for i in n..64 {
        assert_eq!(slot(i), 0, "slot {i} should be unused");
    }
}

#[test]
fn reopen_preserves_data() {
    let (_dir, path, mut store) = temp_store(Durability::App);
    store.set(&[("name", "alice")], b"A", "User").unwrap();
    store.close().unwrap();

    let mut store = Seafair::open(&path, Durability::App).unwrap();
    let got = store.get(&[("name", "alice")], "User").unwrap();
    assert_eq!(got.as_deref(), Some(&b"A"[..]));
}

#[test]
fn reopen_preserves_data_at_every_durability() {
    for durability in [Durability::None, Durability::App, Durability::Os] {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sea");
        let mut store = Seafair::open(&path, durability).unwrap();
        for i in 0..10 {
            store
                .set(&[("i", i.to_string())], i.to_string().as_bytes(), "T")
                .unwrap();
        }
        store.close().unwrap();

        let mut store = Seafair::open(&path, durability).unwrap();
        for i in 0..10 {
            let got = store.get(&[("i", i.to_string())], "T").unwrap();
            assert_eq!(got.as_deref(), Some(i.to_string().as_bytes()));
        }
    }
}

#[test]
fn reopen_after_growth_keeps_every_table_reachable() {
    let (_dir, path, mut store) = temp_store(Durability::App);
    for i in 0..200 {
        store
            .set(&[("k", i.to_string())], i.to_string().as_bytes(), "T")
            .unwrap();
    }
    let tables = store.table_count();
    assert!(tables >= 2);
    store.close().unwrap();

    let mut store = Seafair::open(&path, Durability::App).unwrap();
    assert_eq!(store.table_count(), tables);
    for i in 0..200 {
        let got = store.get(&[("k", i.to_string())], "T").unwrap();
        assert_eq!(got.as_deref(), Some(i.to_string().as_bytes()));
    }
}

#[test]
fn short_file_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trunc.sea");
    fs::write(&path, [0u8; 100]).unwrap();
    let err = Seafair::open(&path, Durability::App).unwrap_err();
    assert!(matches!(err, Error::Corrupt(_)), "got {err:?}");
}

#[test]
fn out_of_range_table_pointer_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.sea");
    let mut header = [0u8; 512];
    header[..8].copy_from_slice(&10_000u64.to_le_bytes());
    fs::write(&path, header).unwrap();
    let err = Seafair::open(&path, Durability::App).unwrap_err();
    assert!(matches!(err, Error::Corrupt(_)), "got {err:?}");
}

#[test]
fn table_pointer_inside_header_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.sea");
    let mut raw = vec![0u8; 4096];
    raw[..8].copy_from_slice(&100u64.to_le_bytes());
    fs::write(&path, raw).unwrap();
    let err = Seafair::open(&path, Durability::App).unwrap_err();
    assert!(matches!(err, Error::Corrupt(_)), "got {err:?}");
}

#[test]
fn zero_header_file_is_repaired_on_open() {
    // A crash between header creation and the first allocation leaves a
    // valid header with no tables; opening finishes the job.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("young.sea");
    fs::write(&path, [0u8; 512]).unwrap();
    let mut store = Seafair::open(&path, Durability::App).unwrap();
    assert_eq!(store.table_count(), 1);
    store.set(&[("k", "1")], b"v", "T").unwrap();
    assert_eq!(store.get(&[("k", "1")], "T").unwrap().as_deref(), Some(&b"v"[..]));
}
