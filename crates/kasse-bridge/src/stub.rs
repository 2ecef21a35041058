// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub platform for desktop/CI builds where no store SDK is available.
//
// Every operation returns `PlatformUnavailable`. Observer registration is
// accepted so the store can start; it simply never hears anything.

use kasse_core::error::{KasseError, Result};
use kasse_core::types::{CorrelationId, Payment, ProductId, TransactionId};

use crate::traits::*;

/// No-op platform returned when no store is configured.
pub struct StubPlatform;

impl PurchasePlatform for StubPlatform {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }
}

impl ProductCatalog for StubPlatform {
    fn start_products_request(
        &self,
        _request_id: CorrelationId,
        _identifiers: &[ProductId],
    ) -> Result<()> {
        tracing::warn!("ProductCatalog::start_products_request called on stub platform");
        Err(KasseError::PlatformUnavailable)
    }
}

impl PaymentQueue for StubPlatform {
    fn set_observer(&self, _sink: VendorSink) -> Result<()> {
        tracing::debug!("observer registered on stub platform; no events will arrive");
        Ok(())
    }

    fn remove_observer(&self) {}

    fn can_make_payments(&self) -> bool {
        false
    }

    fn add_payment(&self, _payment: &Payment) -> Result<()> {
        tracing::warn!("PaymentQueue::add_payment called on stub platform");
        Err(KasseError::PlatformUnavailable)
    }

    fn restore_completed_transactions(&self, _application_username: Option<&str>) -> Result<()> {
        tracing::warn!("PaymentQueue::restore_completed_transactions called on stub platform");
        Err(KasseError::PlatformUnavailable)
    }

    fn finish_transaction(&self, _transaction_id: &TransactionId) -> Result<()> {
        Err(KasseError::PlatformUnavailable)
    }
}

impl ReceiptStore for StubPlatform {
    fn receipt_data(&self) -> Result<Option<Vec<u8>>> {
        tracing::warn!("ReceiptStore::receipt_data called on stub platform");
        Err(KasseError::PlatformUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everything_is_unavailable() {
        let stub = StubPlatform;
        assert!(!stub.can_make_payments());
        assert!(matches!(
            stub.add_payment(&Payment {
                product_id: ProductId::from("p"),
                quantity: 1,
                application_username: None,
            }),
            Err(KasseError::PlatformUnavailable)
        ));
        assert!(matches!(stub.receipt_data(), Err(KasseError::PlatformUnavailable)));

        let (sink, _inbox) = vendor_channel();
        assert!(stub.set_observer(sink).is_ok());
    }
}
