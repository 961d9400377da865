// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Named-record binding over the Seafair engine.
//!
//! A record type declares its namespace tag and key fields once; records
//! are serialized to JSON and stored under the digest of their key field
//! values, so a saved record can be fetched back by key alone:
//!
//! ```no_run
//! use seafair_record::{DbConfig, Record, RecordStore};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct User {
//!     name: String,
//!     age: u32,
//! }
//!
//! impl Record for User {
//!     const CLS: &'static str = "User";
//!     const KEY_FIELDS: &'static [&'static str] = &["name"];
//! }
//!
//! let mut store = RecordStore::open(DbConfig::default()).unwrap();
//! store.save(&User { name: "alice".into(), age: 30 }).unwrap();
//! let alice: Option<User> = store.find(&[("name", "alice")]).unwrap();
//! ```

mod errors;

pub use errors::Error;
pub use seafair_db::{DbConfig, Durability, SeafairDb};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// JSON utility functions for storable records.
///
/// `CLS` isolates this record type's key space from every other type, and
/// `KEY_FIELDS` names the fields whose values form the record key.
pub trait Record: Serialize + DeserializeOwned {
    const CLS: &'static str;
    const KEY_FIELDS: &'static [&'static str];

    /// Marshalls the record body into bytes.
    fn marshal_json(&self) -> Result<Vec<u8>, Error> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Unmarshals stored bytes back into a record.
    fn unmarshal_json(bz: &[u8]) -> Result<Self, Error> {
        Ok(serde_json::from_slice(bz)?)
    }
}

/// Typed store of [`Record`]s over a [`SeafairDb`].
pub struct RecordStore {
    db: SeafairDb,
}

impl RecordStore {
    /// Open a record store over the given database configuration.
    pub fn open(config: DbConfig) -> Result<Self, Error> {
        Ok(Self {
            db: SeafairDb::open(config)?,
        })
    }

    /// Wrap an already opened database.
    pub fn new(db: SeafairDb) -> Self {
        Self { db }
    }

    /// Persist `record`, keyed by its [`Record::KEY_FIELDS`] values.
    ///
    /// Saving a record whose key matches an existing one replaces it.
    pub fn save<R: Record>(&mut self, record: &R) -> Result<(), Error> {
        let body = record.marshal_json()?;
        let fields = to_field_map(serde_json::to_value(record)?)?;
        let key = key_fields::<R>(&fields)?;
        self.db.set(&key, &body, R::CLS)?;
        Ok(())
    }

    /// Fetch the record stored under the given key field values, already
    /// rendered as text.
    pub fn find<R: Record>(&mut self, key: &[(&str, &str)]) -> Result<Option<R>, Error> {
        match self.db.get(key, R::CLS)? {
            Some(body) => Ok(Some(R::unmarshal_json(&body)?)),
            None => Ok(None),
        }
    }

    /// Fetch by a JSON object of key values, e.g. built with
    /// `serde_json::json!`; values are rendered exactly as [`save`] did.
    ///
    /// [`save`]: Self::save
    pub fn find_by<R: Record>(&mut self, key: Value) -> Result<Option<R>, Error> {
        let fields = to_field_map(key)?;
        let key = key_fields::<R>(&fields)?;
        match self.db.get(&key, R::CLS)? {
            Some(body) => Ok(Some(R::unmarshal_json(&body)?)),
            None => Ok(None),
        }
    }

    /// Push outstanding writes of every open store file to disk.
    pub fn flush(&mut self) -> Result<(), Error> {
        Ok(self.db.flush()?)
    }

    /// Flush and release the underlying database.
    pub fn close(self) -> Result<(), Error> {
        Ok(self.db.close()?)
    }
}

fn to_field_map(value: Value) -> Result<Map<String, Value>, Error> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(Error::Codec(format!(
            "expected a JSON object of fields, got {other}"
        ))),
    }
}

/// Extract the declared key fields from a serialized record, rendered as
/// the text the key digest hashes.
fn key_fields<R: Record>(fields: &Map<String, Value>) -> Result<Vec<(&'static str, String)>, Error> {
    R::KEY_FIELDS
        .iter()
        .map(|&name| {
            let value = fields
                .get(name)
                .ok_or_else(|| Error::MissingKeyField(name.to_owned()))?;
            Ok((name, render_key_value(name, value)?))
        })
        .collect()
}

/// A scalar key value rendered as text: strings unquoted, numbers and
/// booleans in their canonical form. Arrays, objects and nulls cannot be
/// key values.
fn render_key_value(field: &str, value: &Value) -> Result<String, Error> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => {
            Err(Error::UnsupportedKeyValue(field.to_owned()))
        }
    }
}
