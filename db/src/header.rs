// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::errors::Error;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};

/// Hard limit on the number of hash tables, fixed by the header layout.
pub const MAX_TABLES: usize = 64;

/// Bytes reserved at offset 0 for the 64-slot pointer header.
pub const HEADER_BYTES: usize = MAX_TABLES * 8;

/// Write a zeroed pointer header into a fresh file.
pub(crate) fn init(file: &mut File) -> Result<(), Error> {
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&[0u8; HEADER_BYTES])?;
    Ok(())
}

/// Read the pointer header and return the table offsets, newest first.
///
/// A file shorter than the header cannot be a store.
pub(crate) fn load(file: &mut File, file_len: u64) -> Result<Vec<u64>, Error> {
    if file_len < HEADER_BYTES as u64 {
        return Err(Error::Corrupt(format!(
            "pointer header truncated, file is {file_len} bytes"
        )));
    }
    let mut buf = [0u8; HEADER_BYTES];
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(&mut buf)?;
    let ptrs = buf
        .chunks_exact(8)
        .map(|slot| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(slot);
            u64::from_le_bytes(raw)
        })
        .filter(|&ptr| ptr > 0)
        .collect();
    Ok(ptrs)
}

/// Persist the table offsets. Exactly `ptrs.len() * 8` bytes are written;
/// higher slots keep whatever they held (zero unless the store shrank,
/// which never happens).
pub(crate) fn persist(file: &mut File, ptrs: &[u64]) -> Result<(), Error> {
    let mut buf = Vec::with_capacity(ptrs.len() * 8);
    for ptr in ptrs {
        buf.extend_from_slice(&ptr.to_le_bytes());
    }
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&buf)?;
    Ok(())
}
