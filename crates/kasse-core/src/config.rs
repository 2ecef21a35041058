// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Store configuration.

use serde::{Deserialize, Serialize};

/// Settings for the transaction correlator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Finalise terminal transactions with the vendor as soon as the result
    /// has been delivered. When false they are held until the host finishes
    /// them explicitly.
    pub finish_transactions: bool,
    /// Reject purchases of products the last product lookup did not return.
    pub validate_against_catalog: bool,
    /// How many finalised transaction ids are remembered to suppress vendor
    /// redeliveries. Oldest ids are forgotten first; held transactions are
    /// always recognised.
    pub settled_history: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            finish_transactions: true,
            validate_against_catalog: true,
            settled_history: 4096,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"finish_transactions": false}"#).unwrap();
        assert!(!config.finish_transactions);
        assert!(config.validate_against_catalog);
        assert_eq!(config.settled_history, 4096);
    }
}
