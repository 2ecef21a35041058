// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Kasse purchase bridge.
//
// Types that cross the host bridge are serialised in camelCase so the host
// runtime sees the same field names the native store SDK uses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation identifier of one host-issued request.
///
/// Product lookups hand this identifier to the vendor platform, so it is also
/// the key the vendor's products response is matched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub Uuid);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store product identifier (e.g. `com.app.pro`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for ProductId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Vendor-issued transaction identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub String);

impl TransactionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TransactionId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for TransactionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a pending request is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    /// Product metadata lookup.
    Lookup,
    /// A single purchase of one product.
    Purchase,
    /// Restore of previously completed purchases.
    Restore,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Lookup => "lookup",
            Self::Purchase => "purchase",
            Self::Restore => "restore",
        };
        f.write_str(name)
    }
}

/// Product metadata as reported by the vendor catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub identifier: ProductId,
    pub title: String,
    pub description: String,
    /// Decimal price as the vendor formats it (e.g. "4.99").
    pub price: String,
    /// Localised price including the currency symbol (e.g. "$4.99").
    pub price_string: String,
    #[serde(default)]
    pub currency_code: Option<String>,
    #[serde(default)]
    pub currency_symbol: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub downloadable: bool,
}

/// Result of a product lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductsResponse {
    pub products: Vec<Product>,
    /// Identifiers the vendor did not recognise.
    #[serde(default)]
    pub invalid_product_ids: Vec<ProductId>,
}

/// A purchase as handed to the vendor payment queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Opaque account hint forwarded to the vendor for fraud detection.
    #[serde(default)]
    pub application_username: Option<String>,
}

/// Vendor-reported state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    /// Being processed by the vendor.
    Purchasing,
    /// Charged and ready to unlock.
    Purchased,
    /// Failed or cancelled; see the record's `error`.
    Failed,
    /// Re-delivered from the user's purchase history.
    Restored,
    /// Waiting on external approval (e.g. Ask to Buy). Not terminal.
    Deferred,
}

impl TransactionState {
    /// Terminal states must be finalised with the vendor exactly once.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Purchased | Self::Failed | Self::Restored)
    }
}

/// Vendor payment error codes, numbered as the store SDK numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum VendorErrorCode {
    Unknown,
    ClientInvalid,
    PaymentCancelled,
    PaymentInvalid,
    PaymentNotAllowed,
    ProductNotAvailable,
    CloudServicePermissionDenied,
    CloudServiceNetworkConnectionFailed,
    CloudServiceRevoked,
    Other(i64),
}

impl VendorErrorCode {
    pub fn raw(&self) -> i64 {
        match self {
            Self::Unknown => 0,
            Self::ClientInvalid => 1,
            Self::PaymentCancelled => 2,
            Self::PaymentInvalid => 3,
            Self::PaymentNotAllowed => 4,
            Self::ProductNotAvailable => 5,
            Self::CloudServicePermissionDenied => 6,
            Self::CloudServiceNetworkConnectionFailed => 7,
            Self::CloudServiceRevoked => 8,
            Self::Other(raw) => *raw,
        }
    }
}

impl From<i64> for VendorErrorCode {
    fn from(raw: i64) -> Self {
        match raw {
            0 => Self::Unknown,
            1 => Self::ClientInvalid,
            2 => Self::PaymentCancelled,
            3 => Self::PaymentInvalid,
            4 => Self::PaymentNotAllowed,
            5 => Self::ProductNotAvailable,
            6 => Self::CloudServicePermissionDenied,
            7 => Self::CloudServiceNetworkConnectionFailed,
            8 => Self::CloudServiceRevoked,
            other => Self::Other(other),
        }
    }
}

impl From<VendorErrorCode> for i64 {
    fn from(code: VendorErrorCode) -> Self {
        code.raw()
    }
}

/// An error reported by the vendor purchase platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VendorError {
    pub code: VendorErrorCode,
    pub message: String,
}

impl VendorError {
    pub fn new(code: VendorErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The user backed out of the payment sheet.
    pub fn cancelled() -> Self {
        Self::new(VendorErrorCode::PaymentCancelled, "payment cancelled by user")
    }

    pub fn is_cancellation(&self) -> bool {
        self.code == VendorErrorCode::PaymentCancelled
    }
}

impl std::fmt::Display for VendorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code.raw())
    }
}

/// Snapshot of a vendor-reported purchase transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub transaction_id: TransactionId,
    pub product_id: ProductId,
    pub state: TransactionState,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// For restores, the transaction that originally bought the product.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_transaction_id: Option<TransactionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_username: Option<String>,
    /// Present when `state` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<VendorError>,
    /// Opaque receipt payload; base64 on the wire.
    #[serde(default, with = "opt_base64", skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Vec<u8>>,
}

fn default_quantity() -> u32 {
    1
}

impl TransactionRecord {
    /// A bare record in the given state, quantity one, dated now.
    pub fn new(
        transaction_id: impl Into<TransactionId>,
        product_id: impl Into<ProductId>,
        state: TransactionState,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            product_id: product_id.into(),
            state,
            quantity: 1,
            original_transaction_id: None,
            transaction_date: Some(Utc::now()),
            application_username: None,
            error: None,
            receipt: None,
        }
    }

    pub fn with_error(mut self, error: VendorError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_original(mut self, original: impl Into<TransactionId>) -> Self {
        self.original_transaction_id = Some(original.into());
        self
    }

    /// The outbound event describing this record's current state.
    pub fn event(&self) -> TransactionEvent {
        TransactionEvent {
            transaction_id: self.transaction_id.clone(),
            product_id: self.product_id.clone(),
            state: self.state,
            original_transaction_id: self.original_transaction_id.clone(),
        }
    }
}

/// Transaction state change as streamed to the host application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEvent {
    pub transaction_id: TransactionId,
    pub product_id: ProductId,
    pub state: TransactionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_transaction_id: Option<TransactionId>,
}

/// Serde adapter for optional byte blobs carried as base64 strings.
pub mod opt_base64 {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => s.serialize_some(&STANDARD.encode(bytes)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        let raw: Option<String> = Option::deserialize(d)?;
        raw.map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
