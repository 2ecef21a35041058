// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host configuration: which platform to run against and how the store
// behaves. Every field has a default, so a partial file is valid.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use kasse_bridge::{PlatformKind, SandboxConfig};
use kasse_core::config::StoreConfig;
use kasse_core::error::Result;

use crate::data_dir;

const CONFIG_FILE: &str = "config.json";
const CONFIG_ENV: &str = "KASSE_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub store: StoreConfig,
    pub platform: PlatformKind,
    pub sandbox: SandboxConfig,
}

impl HostConfig {
    /// Load from `$KASSE_CONFIG`, else the data directory.
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    /// Load from `path`. A missing file means defaults; an unreadable or
    /// malformed one is logged and also falls back to defaults.
    pub fn load_from(path: &Path) -> Self {
        match read_config(path) {
            Ok(Some(config)) => {
                info!(path = %path.display(), platform = ?config.platform, "configuration loaded");
                config
            }
            Ok(None) => {
                debug!(path = %path.display(), "no configuration file, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable configuration");
                Self::default()
            }
        }
    }
}

fn read_config(path: &Path) -> Result<Option<HostConfig>> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&data)?))
}

pub fn config_path() -> PathBuf {
    match std::env::var(CONFIG_ENV) {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => data_dir::data_dir().join(CONFIG_FILE),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kasse_core::types::ProductId;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HostConfig::load_from(&dir.path().join("absent.json"));
        assert_eq!(config.platform, PlatformKind::Sandbox);
        assert_eq!(config.store, StoreConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"{
                "platform": "sandbox",
                "store": { "finish_transactions": false },
                "sandbox": {
                    "catalog": [{
                        "identifier": "com.app.pro",
                        "title": "Pro",
                        "description": "Unlocks everything",
                        "price": "4.99",
                        "priceString": "$4.99"
                    }],
                    "owned": ["com.app.pro"],
                    "receipt": "cmVjZWlwdA=="
                }
            }"#,
        )
        .unwrap();

        let config = HostConfig::load_from(&path);
        assert!(!config.store.finish_transactions);
        assert!(config.store.validate_against_catalog);
        assert_eq!(config.sandbox.catalog.len(), 1);
        assert_eq!(config.sandbox.owned, vec![ProductId::from("com.app.pro")]);
        assert_eq!(config.sandbox.receipt.as_deref(), Some(&b"receipt"[..]));
        assert!(config.sandbox.auto_respond);
    }

    #[test]
    fn stub_platform_is_selectable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, r#"{ "platform": "stub" }"#).unwrap();
        assert_eq!(HostConfig::load_from(&path).platform, PlatformKind::Stub);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "{ not json").unwrap();

        assert!(read_config(&path).is_err());
        let config = HostConfig::load_from(&path);
        assert_eq!(config.platform, PlatformKind::Sandbox);
    }
}
