// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use crate::config::DbConfig;
use crate::errors::Error;
use crate::store::Seafair;
use log::debug;
use std::collections::hash_map::Entry as MapEntry;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// Extension of the store files managed under the data directory.
const FILE_EXT: &str = "sea";

/// Directory-level façade mapping record types onto store files.
///
/// By default every record type gets its own `<cls>.sea` file under the
/// data directory; with [`DbConfig::shared_file`] set, all record types
/// share a single file. The namespace tag keeps their key spaces apart
/// either way.
pub struct SeafairDb {
    config: DbConfig,
    stores: HashMap<PathBuf, Seafair>,
}

impl SeafairDb {
    /// Open a database rooted at `config.data_dir`, creating the directory
    /// when absent. Store files themselves are opened lazily on first use.
    pub fn open(config: DbConfig) -> Result<Self, Error> {
        fs::create_dir_all(&config.data_dir)?;
        debug!("seafair data directory {}", config.data_dir.display());
        Ok(Self {
            config,
            stores: HashMap::new(),
        })
    }

    /// Look up a value without creating a store file for a record type
    /// that was never written.
    pub fn get<K, V>(&mut self, fields: &[(K, V)], cls: &str) -> Result<Option<Vec<u8>>, Error>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let path = self.store_path(cls);
        if !self.stores.contains_key(&path) && !path.exists() {
            return Ok(None);
        }
        self.open_store(cls)?.get(fields, cls)
    }

    /// Store a value under the given key fields.
    pub fn set<K, V>(&mut self, fields: &[(K, V)], blob: &[u8], cls: &str) -> Result<(), Error>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.open_store(cls)?.set(fields, blob, cls)
    }

    /// Push outstanding writes of every open store file to disk.
    pub fn flush(&mut self) -> Result<(), Error> {
        for store in self.stores.values_mut() {
            store.flush()?;
        }
        Ok(())
    }

    /// Flush and release every open store file.
    pub fn close(mut self) -> Result<(), Error> {
        for (_, store) in self.stores.drain() {
            store.close()?;
        }
        Ok(())
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    fn store_path(&self, cls: &str) -> PathBuf {
        let name = match &self.config.shared_file {
            Some(shared) => shared.clone(),
            None => format!("{cls}.{FILE_EXT}"),
        };
        self.config.data_dir.join(name)
    }

    fn open_store(&mut self, cls: &str) -> Result<&mut Seafair, Error> {
        let path = self.store_path(cls);
        match self.stores.entry(path) {
            MapEntry::Occupied(open) => Ok(open.into_mut()),
            MapEntry::Vacant(vacant) => {
                let store = Seafair::open(vacant.key(), self.config.durability)?;
                Ok(vacant.insert(store))
            }
        }
    }
}
