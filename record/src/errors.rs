// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use thiserror::Error;

/// Record binding error
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] seafair_db::Error),
    #[error("record codec error: {0}")]
    Codec(String),
    #[error("record has no value for key field {0}")]
    MissingKeyField(String),
    #[error("key field {0} must hold a scalar value")]
    UnsupportedKeyValue(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Codec(err.to_string())
    }
}
