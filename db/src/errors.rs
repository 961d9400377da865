// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::io;
use thiserror::Error;

/// Storage engine error
#[derive(Debug, Error)]
pub enum Error {
    /// The file cannot be interpreted as a store; refusing to touch it.
    #[error("store file is corrupt: {0}")]
    Corrupt(String),
    /// All 64 header slots are in use, no further table can be allocated.
    #[error("hash table limit reached, store cannot grow")]
    CapacityExhausted,
    /// The value is too large for the 32-bit length field of an entry.
    #[error("value of {0} bytes exceeds the maximum entry size")]
    SizeOverflow(u64),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        use Error::*;

        match (self, other) {
            (Corrupt(a), Corrupt(b)) => a == b,
            (CapacityExhausted, CapacityExhausted) => true,
            (SizeOverflow(a), SizeOverflow(b)) => a == b,
            (Io(_), Io(_)) => true,
            _ => false,
        }
    }
}
