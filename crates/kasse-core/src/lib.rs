// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Kasse — Core types and error definitions shared across all crates.

pub mod bridge_errors;
pub mod config;
pub mod error;
pub mod types;

pub use bridge_errors::{BridgeError, to_bridge_error};
pub use config::StoreConfig;
pub use error::KasseError;
pub use types::*;
