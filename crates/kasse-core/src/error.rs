// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Kasse.

use thiserror::Error;

use crate::types::{ProductId, RequestKind, TransactionId, VendorError};

/// Top-level error type for all Kasse operations.
#[derive(Debug, Error)]
pub enum KasseError {
    // -- Registration (rejected synchronously) --
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("product {0} is not available")]
    UnavailableProduct(ProductId),

    #[error("a {0} request is already in progress")]
    RequestInProgress(RequestKind),

    // -- Resolution --
    #[error("cancelled by user")]
    Cancelled,

    #[error("vendor platform failure: {0}")]
    VendorFailure(VendorError),

    /// A vendor callback had no live correlation. Logged, never surfaced.
    #[error("no pending request for {0}")]
    RequestNotFound(String),

    #[error("no receipt available")]
    ReceiptUnavailable,

    #[error("transaction {0} is not awaiting finalisation")]
    TransactionNotFound(TransactionId),

    // -- Platform bridge --
    #[error("a transaction observer is already registered")]
    ObserverAlreadyRegistered,

    #[error("the purchase bridge was shut down before the request resolved")]
    BridgeClosed,

    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,

    // -- I/O --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl KasseError {
    /// Map a vendor error to the outcome the caller sees: a user cancellation
    /// is reported distinctly from every other failure.
    pub fn from_vendor(error: VendorError) -> Self {
        if error.is_cancellation() {
            Self::Cancelled
        } else {
            Self::VendorFailure(error)
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, KasseError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VendorErrorCode;

    #[test]
    fn cancellation_is_not_a_vendor_failure() {
        assert!(matches!(
            KasseError::from_vendor(VendorError::cancelled()),
            KasseError::Cancelled
        ));

        let err = KasseError::from_vendor(VendorError::new(
            VendorErrorCode::PaymentNotAllowed,
            "payments disabled",
        ));
        assert!(matches!(err, KasseError::VendorFailure(ref e) if e.code == VendorErrorCode::PaymentNotAllowed));
    }

    #[test]
    fn messages_name_the_subject() {
        let err = KasseError::RequestInProgress(RequestKind::Restore);
        assert_eq!(err.to_string(), "a restore request is already in progress");

        let err = KasseError::UnavailableProduct(ProductId::from("com.app.pro"));
        assert_eq!(err.to_string(), "product com.app.pro is not available");
    }
}
