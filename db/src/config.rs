// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Mutations between physical flushes under [`Durability::None`].
pub const FLUSH_INTERVAL: u32 = 100;

/// Flush discipline applied after every mutation, chosen once per store.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    /// Best-effort throughput. Data reaches disk every [`FLUSH_INTERVAL`]
    /// mutations and on close.
    None,
    /// Committed writes survive a process crash.
    #[default]
    App,
    /// Committed writes survive power loss.
    Os,
}

/// Seafair configuration exposed to embedders.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DbConfig {
    /// Directory holding the store files; created on open when absent.
    pub data_dir: PathBuf,
    pub durability: Durability,
    /// When set, all record types share one store file with this name
    /// instead of one `<cls>.sea` file each.
    pub shared_file: Option<String>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            durability: Durability::default(),
            shared_file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DbConfig::default();
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.durability, Durability::App);
        assert_eq!(config.shared_file, None);
    }

    #[test]
    fn durability_levels_are_lowercase() {
        let config: DbConfig = serde_json::from_str(r#"{"durability": "os"}"#).unwrap();
        assert_eq!(config.durability, Durability::Os);
        let config: DbConfig = serde_json::from_str(r#"{"durability": "none"}"#).unwrap();
        assert_eq!(config.durability, Durability::None);
    }
}
