// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host-facing error payloads.
//
// Every error that reaches the host runtime is flattened into a stable
// snake_case code plus a message. Host code branches on the code; the
// message is for logs and developer consoles.

use serde::{Deserialize, Serialize};

use crate::error::KasseError;

/// An error as delivered across the bridge channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeError {
    /// Stable machine-readable code (e.g. `cancelled`).
    pub code: String,
    /// Human-readable detail.
    pub message: String,
    /// Raw vendor error code for `vendor_failure`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_code: Option<i64>,
    /// Advisory: whether issuing the same request again may succeed.
    pub retriable: bool,
}

impl BridgeError {
    fn new(code: &str, err: &KasseError, retriable: bool) -> Self {
        Self {
            code: code.to_owned(),
            message: err.to_string(),
            vendor_code: None,
            retriable,
        }
    }

    /// Error for a malformed host request that never reached the store.
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self {
            code: "invalid_argument".into(),
            message: detail.into(),
            vendor_code: None,
            retriable: false,
        }
    }
}

impl From<&KasseError> for BridgeError {
    fn from(err: &KasseError) -> Self {
        to_bridge_error(err)
    }
}

/// Convert a `KasseError` into the payload the host receives.
pub fn to_bridge_error(err: &KasseError) -> BridgeError {
    match err {
        KasseError::InvalidArgument(_) => BridgeError::new("invalid_argument", err, false),
        KasseError::UnavailableProduct(_) => BridgeError::new("unavailable_product", err, false),
        KasseError::RequestInProgress(_) => BridgeError::new("request_in_progress", err, true),
        KasseError::Cancelled => BridgeError::new("cancelled", err, true),

        KasseError::VendorFailure(vendor) => {
            let mut out = BridgeError::new("vendor_failure", err, true);
            out.vendor_code = Some(vendor.code.raw());
            out
        }

        KasseError::ReceiptUnavailable => BridgeError::new("receipt_unavailable", err, true),
        KasseError::TransactionNotFound(_) => {
            BridgeError::new("transaction_not_found", err, false)
        }
        KasseError::BridgeClosed => BridgeError::new("bridge_closed", err, false),
        KasseError::PlatformUnavailable => BridgeError::new("platform_unavailable", err, false),

        // Internal conditions: surfaced only if a caller bubbles them up.
        KasseError::RequestNotFound(_)
        | KasseError::ObserverAlreadyRegistered
        | KasseError::Bridge(_)
        | KasseError::Io(_)
        | KasseError::Serialization(_) => BridgeError::new("internal", err, true),
    }
}
