// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::config::{Durability, FLUSH_INTERVAL};
use crate::digest::KeyDigest;
use crate::entry::{self, Entry, ENTRY_SIZE, SECTOR};
use crate::errors::Error;
use crate::header::{self, HEADER_BYTES, MAX_TABLES};
use crate::table::{self, Geometry};
use log::{debug, info};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A single `.sea` store file.
///
/// The file starts with a 64-slot pointer header; each non-zero slot is
/// the offset of a hash table, newest first. `set` writes to the newest
/// table only and `get` consults every table in turn, so an overwritten
/// key shadows any stale copy left behind in an older table. Value blobs
/// live past the tables at the end of the file and are never moved.
///
/// The handle assumes exclusive ownership of the file. All methods take
/// `&mut self`; a multi-threaded embedder must serialize access behind its
/// own lock.
#[derive(Debug)]
pub struct Seafair {
    file: File,
    path: PathBuf,
    ptrs: Vec<u64>,
    geometry: Geometry,
    durability: Durability,
    unflushed: u32,
    /// Sorted key field names per record type, so a repeated binding
    /// skips the sort.
    bindings: HashMap<String, Vec<String>>,
}

impl Seafair {
    /// Open the store at `path`, creating the file, the pointer header and
    /// the first one-sector table when the file does not exist.
    pub fn open<P: AsRef<Path>>(path: P, durability: Durability) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let create = !path.exists();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let ptrs = if create {
            header::init(&mut file)?;
            info!("created store file {}", path.display());
            Vec::new()
        } else {
            let file_len = file.metadata()?.len();
            header::load(&mut file, file_len)?
        };

        let geometry = Geometry::for_tables(ptrs.len())?;
        let mut store = Self {
            file,
            path,
            ptrs,
            geometry,
            durability,
            unflushed: 0,
            bindings: HashMap::new(),
        };
        store.check_tables()?;
        if store.ptrs.is_empty() {
            // Fresh file, or one that crashed between header creation and
            // the first allocation; either way the first table is missing.
            store.add_table()?;
        }
        debug!(
            "opened {} with {} table(s)",
            store.path.display(),
            store.ptrs.len()
        );
        Ok(store)
    }

    /// Look up the value stored under the given key fields, probing one
    /// sector per table from newest to oldest.
    pub fn get<K, V>(&mut self, fields: &[(K, V)], cls: &str) -> Result<Option<Vec<u8>>, Error>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let digest = self.key_digest(fields, cls);
        for i in 0..self.ptrs.len() {
            let start = self.sector_start(&digest, i);
            let sector = self.read_sector(start)?;
            if let Some(off) = entry::find_key(&sector, digest.as_bytes()) {
                let found = Entry::from_slice(&sector[off..off + ENTRY_SIZE]);
                return self.read_blob(found.addr, found.size).map(Some);
            }
        }
        Ok(None)
    }

    /// Associate `blob` with the given key fields.
    ///
    /// The blob is appended at end of file before the entry referencing it
    /// is written, so a crash can strand dead bytes but never a dangling
    /// entry. An existing entry for the same key in the newest table is
    /// overwritten in place; when the target sector is packed with foreign
    /// keys, a table twice the newest size is appended and the entry goes
    /// there, reusing the blob already on disk.
    pub fn set<K, V>(&mut self, fields: &[(K, V)], blob: &[u8], cls: &str) -> Result<(), Error>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let size = u32::try_from(blob.len()).map_err(|_| Error::SizeOverflow(blob.len() as u64))?;
        let digest = self.key_digest(fields, cls);
        let addr = self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(blob)?;
        // The entry referencing the blob must never be persisted first.
        match self.durability {
            Durability::App => self.file.flush()?,
            Durability::Os => self.file.sync_data()?,
            Durability::None => {}
        }

        loop {
            let start = self.sector_start(&digest, 0);
            let sector = self.read_sector(start)?;
            let target = entry::find_key(&sector, digest.as_bytes())
                .or_else(|| entry::find_free(&sector));
            match target {
                Some(off) => {
                    let written = Entry {
                        key: *digest.as_bytes(),
                        addr,
                        size,
                    };
                    self.file.seek(SeekFrom::Start(start + off as u64))?;
                    self.file.write_all(&written.to_bytes())?;
                    break;
                }
                None => self.add_table()?,
            }
        }
        self.committed()
    }

    /// Push outstanding writes to disk.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.file.flush()?;
        self.file.sync_data()?;
        self.unflushed = 0;
        Ok(())
    }

    /// Flush outstanding writes and release the handle.
    pub fn close(mut self) -> Result<(), Error> {
        self.flush()
    }

    /// Number of hash tables currently allocated.
    pub fn table_count(&self) -> usize {
        self.ptrs.len()
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a zeroed table double the newest size and make it the write
    /// target. The header is persisted only after the space exists, so a
    /// failed allocation leaves at worst invisible trailing zeros.
    fn add_table(&mut self) -> Result<(), Error> {
        let n = self.ptrs.len();
        if n == MAX_TABLES {
            return Err(Error::CapacityExhausted);
        }
        let size = table::table_size(n)?;
        let addr = table::allocate(&mut self.file, size)?;
        self.ptrs.insert(0, addr);
        header::persist(&mut self.file, &self.ptrs)?;
        self.geometry = Geometry::for_tables(self.ptrs.len())?;
        debug!(
            "grew {} to {} table(s), {size} bytes at {addr}",
            self.path.display(),
            self.ptrs.len()
        );
        Ok(())
    }

    /// Every table pointer must address a table that fits inside the file.
    fn check_tables(&self) -> Result<(), Error> {
        let file_len = self.file.metadata()?.len();
        for (i, &ptr) in self.ptrs.iter().enumerate() {
            let size = self.geometry.sizes[i];
            if ptr < HEADER_BYTES as u64 || file_len < ptr || file_len - ptr < size {
                return Err(Error::Corrupt(format!(
                    "table {i} at offset {ptr} does not fit a {size} byte table in a {file_len} byte file"
                )));
            }
        }
        Ok(())
    }

    fn sector_start(&self, digest: &KeyDigest, i: usize) -> u64 {
        self.ptrs[i] + self.geometry.slot(digest.index(), i) * ENTRY_SIZE as u64
    }

    fn read_sector(&mut self, start: u64) -> Result<[u8; SECTOR], Error> {
        let mut buf = [0u8; SECTOR];
        self.file.seek(SeekFrom::Start(start))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_blob(&mut self, addr: u64, size: u32) -> Result<Vec<u8>, Error> {
        let mut buf = vec![0u8; size as usize];
        self.file.seek(SeekFrom::Start(addr))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Digest of the canonical key encoding: key field values in
    /// lexicographic field-name order, then the namespace tag.
    fn key_digest<K, V>(&mut self, fields: &[(K, V)], cls: &str) -> KeyDigest
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let cached = self.bindings.get(cls).is_some_and(|names| {
            names.len() == fields.len()
                && names
                    .iter()
                    .all(|name| fields.iter().any(|(k, _)| k.as_ref() == name))
        });
        if !cached {
            let mut names: Vec<String> =
                fields.iter().map(|(k, _)| k.as_ref().to_owned()).collect();
            names.sort_unstable();
            self.bindings.insert(cls.to_owned(), names);
        }
        let names = &self.bindings[cls];
        let values = names.iter().map(|name| {
            fields
                .iter()
                .find(|(k, _)| k.as_ref() == name)
                .map(|(_, v)| v.as_ref())
                .unwrap_or("")
        });
        KeyDigest::new(values, cls)
    }

    /// Apply the flush discipline after a mutation.
    fn committed(&mut self) -> Result<(), Error> {
        match self.durability {
            Durability::None => {
                self.unflushed += 1;
                if self.unflushed >= FLUSH_INTERVAL {
                    self.flush()?;
                }
            }
            Durability::App => self.file.flush()?,
            Durability::Os => {
                self.file.flush()?;
                self.file.sync_data()?;
            }
        }
        Ok(())
    }
}
