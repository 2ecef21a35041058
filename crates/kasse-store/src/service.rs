// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// StoreService — the host-facing purchase API.
//
// Owns the correlator behind a mutex and a pump task that drains the vendor
// inbox. Host calls and vendor callbacks are serialised on the same lock, so
// registration and resolution never interleave within the table. The
// service registers itself as the platform's only transaction observer when
// it starts and unregisters on shutdown.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use kasse_bridge::traits::{PurchasePlatform, VendorInbox, vendor_channel};
use kasse_core::config::StoreConfig;
use kasse_core::error::{KasseError, Result};
use kasse_core::types::{
    ProductId, ProductsResponse, TransactionEvent, TransactionId, TransactionRecord,
};

use crate::correlator::TransactionCorrelator;
use crate::events::EventEmitter;
use crate::pending::{PendingSummary, RequestHandle};

type Shared<P> = Arc<Mutex<TransactionCorrelator<P>>>;

fn lock<P: PurchasePlatform + ?Sized>(
    correlator: &Mutex<TransactionCorrelator<P>>,
) -> MutexGuard<'_, TransactionCorrelator<P>> {
    correlator.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct StoreService<P: PurchasePlatform + ?Sized + 'static> {
    correlator: Shared<P>,
    platform: Arc<P>,
    events: EventEmitter,
    pump: JoinHandle<()>,
}

impl<P: PurchasePlatform + ?Sized + 'static> StoreService<P> {
    /// Register as the platform's transaction observer and start draining
    /// its callbacks. Must be called within a tokio runtime.
    pub fn start(platform: Arc<P>, config: StoreConfig) -> Result<Self> {
        let events = EventEmitter::new();
        let correlator = Arc::new(Mutex::new(TransactionCorrelator::new(
            Arc::clone(&platform),
            config,
            events.clone(),
        )));

        let (sink, inbox) = vendor_channel();
        platform.set_observer(sink)?;
        let pump = tokio::spawn(pump_inbox(inbox, Arc::clone(&correlator)));

        info!(platform = platform.platform_name(), "store service started");
        Ok(Self {
            correlator,
            platform,
            events,
            pump,
        })
    }

    fn correlator(&self) -> MutexGuard<'_, TransactionCorrelator<P>> {
        lock(&self.correlator)
    }

    // -- Requests ------------------------------------------------------------

    pub fn get_products<I, S>(&self, identifiers: I) -> Result<RequestHandle<ProductsResponse>>
    where
        I: IntoIterator<Item = S>,
        S: Into<ProductId>,
    {
        let identifiers: Vec<ProductId> = identifiers.into_iter().map(Into::into).collect();
        self.correlator().request_products(&identifiers)
    }

    /// Buy `quantity` (default one) of a product.
    pub fn purchase_product(
        &self,
        product_id: impl Into<ProductId>,
        quantity: Option<u32>,
    ) -> Result<RequestHandle<TransactionRecord>> {
        self.correlator()
            .purchase(product_id.into(), quantity.unwrap_or(1), None)
    }

    /// Buy on behalf of an application account. The username is passed to
    /// the vendor as an opaque fraud-detection hint.
    pub fn purchase_product_for_user(
        &self,
        product_id: impl Into<ProductId>,
        quantity: Option<u32>,
        username: impl Into<String>,
    ) -> Result<RequestHandle<TransactionRecord>> {
        self.correlator()
            .purchase(product_id.into(), quantity.unwrap_or(1), Some(username.into()))
    }

    pub fn restore_purchases(&self) -> Result<RequestHandle<Vec<TransactionRecord>>> {
        self.correlator().restore_purchases(None)
    }

    pub fn restore_purchases_for_user(
        &self,
        username: impl Into<String>,
    ) -> Result<RequestHandle<Vec<TransactionRecord>>> {
        self.correlator().restore_purchases(Some(username.into()))
    }

    // -- Immediate queries ---------------------------------------------------

    /// The app receipt, base64 encoded.
    pub fn receipt_data(&self) -> Result<String> {
        let receipt = self
            .platform
            .receipt_data()?
            .ok_or(KasseError::ReceiptUnavailable)?;
        Ok(STANDARD.encode(receipt))
    }

    pub fn can_make_payments(&self) -> bool {
        self.platform.can_make_payments()
    }

    pub fn pending_requests(&self) -> Vec<PendingSummary> {
        self.correlator().pending_requests()
    }

    pub fn pending_count(&self) -> usize {
        self.correlator().pending_count()
    }

    /// Listen for every transaction state change from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<TransactionEvent> {
        self.events.subscribe()
    }

    // -- Finalisation --------------------------------------------------------

    pub fn should_finish_transactions(&self, finish: bool) {
        self.correlator().set_finish_transactions(finish);
    }

    pub fn finish_transaction(&self, transaction_id: impl Into<TransactionId>) -> Result<TransactionRecord> {
        self.correlator().finish_transaction(&transaction_id.into())
    }

    pub fn finish_current_transaction(&self) -> Result<Option<TransactionRecord>> {
        self.correlator().finish_current_transaction()
    }

    pub fn clear_completed_transactions(&self) -> Result<Vec<TransactionRecord>> {
        self.correlator().clear_completed_transactions()
    }

    pub fn held_transactions(&self) -> Vec<TransactionRecord> {
        self.correlator().held_transactions().to_vec()
    }

    /// Stop observing the platform. Outstanding handles resolve with
    /// `BridgeClosed`.
    pub fn shutdown(self) {
        info!(
            platform = self.platform.platform_name(),
            "store service shutting down"
        );
    }
}

impl<P: PurchasePlatform + ?Sized + 'static> Drop for StoreService<P> {
    fn drop(&mut self) {
        self.platform.remove_observer();
        self.pump.abort();
        lock(&self.correlator).close();
        debug!("store service stopped");
    }
}

async fn pump_inbox<P: PurchasePlatform + ?Sized>(mut inbox: VendorInbox, correlator: Shared<P>) {
    while let Some(event) = inbox.recv().await {
        let outcome = lock(&correlator).on_vendor_event(event);
        match outcome {
            Ok(()) => {}
            Err(KasseError::RequestNotFound(what)) => {
                warn!(%what, "vendor callback without a pending request")
            }
            Err(e) => error!(error = %e, "failed to apply vendor callback"),
        }
    }
    debug!("vendor inbox closed");
}
