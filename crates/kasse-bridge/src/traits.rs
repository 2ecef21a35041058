// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the vendor purchase platform.
//
// The native store SDK reports everything through delegate callbacks on a
// thread it owns. Implementations translate each callback into a
// `VendorEvent` and push it through the `VendorSink` registered with
// `PaymentQueue::set_observer`. Nothing in this module blocks.

use tokio::sync::mpsc;

use kasse_core::error::Result;
use kasse_core::types::{
    CorrelationId, Payment, ProductId, ProductsResponse, TransactionId, TransactionRecord,
    VendorError,
};

/// Unified platform bound that groups all vendor capabilities.
pub trait PurchasePlatform: ProductCatalog + PaymentQueue + ReceiptStore + Send + Sync {
    /// Human-readable platform name (e.g. "App Store", "Sandbox").
    fn platform_name(&self) -> &str;
}

/// Product metadata lookups.
pub trait ProductCatalog {
    /// Start an asynchronous lookup. The answer arrives later as
    /// `VendorEvent::ProductsResponse` or `ProductsRequestFailed` carrying the
    /// same `request_id`.
    fn start_products_request(&self, request_id: CorrelationId, identifiers: &[ProductId])
    -> Result<()>;
}

/// The vendor payment queue and its transaction observer.
pub trait PaymentQueue {
    /// Register the process-wide transaction observer.
    ///
    /// Fails with `KasseError::ObserverAlreadyRegistered` if one is already
    /// registered. Unfinished transactions left over from a previous launch
    /// are redelivered to the new observer.
    fn set_observer(&self, sink: VendorSink) -> Result<()>;

    /// Detach the observer. Further vendor callbacks are dropped.
    fn remove_observer(&self);

    /// Whether the device is allowed to make payments at all.
    fn can_make_payments(&self) -> bool;

    /// Enqueue a payment. Progress arrives as `TransactionUpdated` events.
    fn add_payment(&self, payment: &Payment) -> Result<()>;

    /// Ask the vendor to replay completed purchases as `Restored`
    /// transactions, followed by `RestoreCompleted` or `RestoreFailed`.
    fn restore_completed_transactions(&self, application_username: Option<&str>) -> Result<()>;

    /// Acknowledge a terminal transaction so it is not redelivered.
    fn finish_transaction(&self, transaction_id: &TransactionId) -> Result<()>;
}

/// Access to the app receipt.
pub trait ReceiptStore {
    /// Raw receipt bytes, or `None` if the device has no receipt yet.
    fn receipt_data(&self) -> Result<Option<Vec<u8>>>;
}

/// A vendor callback, as delivered to the observer inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VendorEvent {
    ProductsResponse {
        request_id: CorrelationId,
        response: ProductsResponse,
    },
    ProductsRequestFailed {
        request_id: CorrelationId,
        error: VendorError,
    },
    TransactionUpdated(TransactionRecord),
    /// The restore queue has been fully replayed.
    RestoreCompleted,
    RestoreFailed(VendorError),
}

/// Push side of the observer inbox. Cheap to clone; never blocks.
#[derive(Debug, Clone)]
pub struct VendorSink {
    tx: mpsc::UnboundedSender<VendorEvent>,
}

impl VendorSink {
    /// Deliver one callback. Returns false if the inbox has been dropped.
    pub fn deliver(&self, event: VendorEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Single-consumer side of the observer inbox.
#[derive(Debug)]
pub struct VendorInbox {
    rx: mpsc::UnboundedReceiver<VendorEvent>,
}

impl VendorInbox {
    /// Next callback, or `None` once every sink has been dropped.
    pub async fn recv(&mut self) -> Option<VendorEvent> {
        self.rx.recv().await
    }

    /// Next callback if one is already queued.
    pub fn try_recv(&mut self) -> Option<VendorEvent> {
        self.rx.try_recv().ok()
    }
}

/// Create a connected sink/inbox pair.
pub fn vendor_channel() -> (VendorSink, VendorInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (VendorSink { tx }, VendorInbox { rx })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn inbox_preserves_delivery_order() {
        let (sink, mut inbox) = vendor_channel();
        assert!(sink.deliver(VendorEvent::RestoreCompleted));
        assert!(sink.deliver(VendorEvent::RestoreFailed(VendorError::cancelled())));

        assert_eq!(inbox.recv().await, Some(VendorEvent::RestoreCompleted));
        assert!(matches!(inbox.try_recv(), Some(VendorEvent::RestoreFailed(_))));
        assert!(inbox.try_recv().is_none());
    }

    #[test]
    fn delivery_fails_once_inbox_is_gone() {
        let (sink, inbox) = vendor_channel();
        drop(inbox);
        assert!(sink.is_closed());
        assert!(!sink.deliver(VendorEvent::RestoreCompleted));
    }
}
