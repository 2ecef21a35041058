// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process sandbox store.
//
// Behaves like the vendor payment queue closely enough to exercise the
// correlator end to end: product lookups are answered from a configured
// catalog, purchases walk through `purchasing` to a terminal or deferred
// state, restores replay owned products, and terminal transactions stay in
// an unfinished queue until `finish_transaction` is called. Unfinished
// transactions are redelivered whenever an observer is registered, the way
// the real queue redelivers them on the next launch.
//
// With `auto_respond` off the sandbox only records calls, and the caller
// drives every callback through `push`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use kasse_core::error::{KasseError, Result};
use kasse_core::types::{
    CorrelationId, Payment, Product, ProductId, ProductsResponse, TransactionId,
    TransactionRecord, TransactionState, VendorError, VendorErrorCode, opt_base64,
};

use crate::traits::*;

/// Sandbox store behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Products the store knows about.
    pub catalog: Vec<Product>,
    /// Products the user already owns; replayed on restore.
    pub owned: Vec<ProductId>,
    /// Purchases the user cancels on the payment sheet.
    pub declined: Vec<ProductId>,
    /// Purchases that stop in `deferred` awaiting approval.
    pub deferred: Vec<ProductId>,
    /// Purchases the store rejects with a non-cancellation error.
    pub failing: Vec<ProductId>,
    /// App receipt returned by `receipt_data`.
    #[serde(with = "opt_base64")]
    pub receipt: Option<Vec<u8>>,
    pub payments_allowed: bool,
    /// Transactions whose `finish_transaction` call fails. They stay unfinished.
    pub refuse_finish: Vec<TransactionId>,
    /// Answer requests immediately. Off means callbacks come from `push`.
    pub auto_respond: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            catalog: Vec::new(),
            owned: Vec::new(),
            declined: Vec::new(),
            deferred: Vec::new(),
            failing: Vec::new(),
            receipt: None,
            payments_allowed: true,
            refuse_finish: Vec::new(),
            auto_respond: true,
        }
    }
}

impl SandboxConfig {
    /// A sandbox that records calls and leaves every callback to `push`.
    pub fn manual() -> Self {
        Self {
            auto_respond: false,
            ..Self::default()
        }
    }
}

#[derive(Default)]
struct SandboxState {
    observer: Option<VendorSink>,
    /// Terminal transactions not yet finished, in delivery order.
    unfinished: Vec<TransactionRecord>,
    /// Owned products and the transaction that bought them.
    owned: Vec<(ProductId, TransactionId)>,
    finish_calls: HashMap<TransactionId, usize>,
    product_requests: Vec<(CorrelationId, Vec<ProductId>)>,
    payments: Vec<Payment>,
    restore_requests: usize,
    next_id: u64,
}

impl SandboxState {
    fn next_transaction_id(&mut self) -> TransactionId {
        self.next_id += 1;
        TransactionId(format!("sandbox-{}", self.next_id))
    }

    /// Queue a callback for the observer, tracking terminal transactions
    /// until they are finished. Returns whether an observer received it.
    fn deliver(&mut self, event: VendorEvent) -> bool {
        if let VendorEvent::TransactionUpdated(record) = &event {
            if record.state.is_terminal() {
                self.unfinished
                    .retain(|r| r.transaction_id != record.transaction_id);
                self.unfinished.push(record.clone());
            }
        }

        match &self.observer {
            Some(sink) => sink.deliver(event),
            None => {
                debug!(?event, "no observer registered; callback not delivered");
                false
            }
        }
    }
}

/// Simulated vendor purchase platform.
pub struct SandboxPlatform {
    config: SandboxConfig,
    state: Mutex<SandboxState>,
}

impl SandboxPlatform {
    pub fn new(config: SandboxConfig) -> Self {
        let mut state = SandboxState::default();
        for product in &config.owned {
            let original = state.next_transaction_id();
            state.owned.push((product.clone(), original));
        }
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, SandboxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver a callback as if the vendor had produced it.
    pub fn push(&self, event: VendorEvent) -> bool {
        self.state().deliver(event)
    }

    /// Leave a terminal transaction in the unfinished queue without an
    /// observer seeing it, as a crash before finalisation would.
    pub fn enqueue_unfinished(&self, record: TransactionRecord) {
        let mut state = self.state();
        state
            .unfinished
            .retain(|r| r.transaction_id != record.transaction_id);
        state.unfinished.push(record);
    }

    /// How many times `finish_transaction` succeeded for this id.
    pub fn finish_count(&self, transaction_id: &TransactionId) -> usize {
        self.state()
            .finish_calls
            .get(transaction_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn unfinished(&self) -> Vec<TransactionRecord> {
        self.state().unfinished.clone()
    }

    pub fn product_requests(&self) -> Vec<(CorrelationId, Vec<ProductId>)> {
        self.state().product_requests.clone()
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.state().payments.clone()
    }

    pub fn restore_requests(&self) -> usize {
        self.state().restore_requests
    }

    pub fn has_observer(&self) -> bool {
        self.state().observer.is_some()
    }

    fn purchase_outcome(&self, product_id: &ProductId) -> (TransactionState, Option<VendorError>) {
        if !self.config.payments_allowed {
            let err = VendorError::new(VendorErrorCode::PaymentNotAllowed, "payments are disabled");
            return (TransactionState::Failed, Some(err));
        }
        if !self.config.catalog.iter().any(|p| &p.identifier == product_id) {
            let err = VendorError::new(VendorErrorCode::ProductNotAvailable, "unknown product");
            return (TransactionState::Failed, Some(err));
        }
        if self.config.declined.contains(product_id) {
            return (TransactionState::Failed, Some(VendorError::cancelled()));
        }
        if self.config.failing.contains(product_id) {
            let err = VendorError::new(VendorErrorCode::Unknown, "sandbox purchase failed");
            return (TransactionState::Failed, Some(err));
        }
        if self.config.deferred.contains(product_id) {
            return (TransactionState::Deferred, None);
        }
        (TransactionState::Purchased, None)
    }
}

impl PurchasePlatform for SandboxPlatform {
    fn platform_name(&self) -> &str {
        "Sandbox"
    }
}

impl ProductCatalog for SandboxPlatform {
    fn start_products_request(
        &self,
        request_id: CorrelationId,
        identifiers: &[ProductId],
    ) -> Result<()> {
        let mut state = self.state();
        state
            .product_requests
            .push((request_id, identifiers.to_vec()));
        if !self.config.auto_respond {
            return Ok(());
        }

        let mut response = ProductsResponse::default();
        for id in identifiers {
            match self.config.catalog.iter().find(|p| &p.identifier == id) {
                Some(product) => response.products.push(product.clone()),
                None => response.invalid_product_ids.push(id.clone()),
            }
        }
        state.deliver(VendorEvent::ProductsResponse {
            request_id,
            response,
        });
        Ok(())
    }
}

impl PaymentQueue for SandboxPlatform {
    fn set_observer(&self, sink: VendorSink) -> Result<()> {
        let mut state = self.state();
        if state.observer.is_some() {
            return Err(KasseError::ObserverAlreadyRegistered);
        }

        let backlog = state.unfinished.clone();
        if !backlog.is_empty() {
            info!(count = backlog.len(), "redelivering unfinished transactions");
        }
        for record in backlog {
            sink.deliver(VendorEvent::TransactionUpdated(record));
        }
        state.observer = Some(sink);
        Ok(())
    }

    fn remove_observer(&self) {
        self.state().observer = None;
    }

    fn can_make_payments(&self) -> bool {
        self.config.payments_allowed
    }

    fn add_payment(&self, payment: &Payment) -> Result<()> {
        let mut state = self.state();
        state.payments.push(payment.clone());
        if !self.config.auto_respond {
            return Ok(());
        }

        let transaction_id = state.next_transaction_id();
        let mut record = TransactionRecord::new(
            transaction_id.clone(),
            payment.product_id.clone(),
            TransactionState::Purchasing,
        );
        record.quantity = payment.quantity;
        record.application_username = payment.application_username.clone();
        state.deliver(VendorEvent::TransactionUpdated(record.clone()));

        let (outcome, error) = self.purchase_outcome(&payment.product_id);
        record.state = outcome;
        record.error = error;
        if outcome == TransactionState::Purchased {
            record.receipt = self.config.receipt.clone();
            if !state.owned.iter().any(|(p, _)| p == &payment.product_id) {
                state.owned.push((payment.product_id.clone(), transaction_id));
            }
        }
        state.deliver(VendorEvent::TransactionUpdated(record));
        Ok(())
    }

    fn restore_completed_transactions(&self, application_username: Option<&str>) -> Result<()> {
        let mut state = self.state();
        state.restore_requests += 1;
        if !self.config.auto_respond {
            return Ok(());
        }

        let owned = state.owned.clone();
        for (product_id, original) in owned {
            let transaction_id = state.next_transaction_id();
            let mut record =
                TransactionRecord::new(transaction_id, product_id, TransactionState::Restored)
                    .with_original(original);
            record.application_username = application_username.map(str::to_owned);
            record.receipt = self.config.receipt.clone();
            state.deliver(VendorEvent::TransactionUpdated(record));
        }
        state.deliver(VendorEvent::RestoreCompleted);
        Ok(())
    }

    fn finish_transaction(&self, transaction_id: &TransactionId) -> Result<()> {
        if self.config.refuse_finish.contains(transaction_id) {
            debug!(transaction_id = %transaction_id, "sandbox refused to finish transaction");
            return Err(KasseError::Bridge(format!(
                "sandbox refused to finish {transaction_id}"
            )));
        }
        let mut state = self.state();
        *state.finish_calls.entry(transaction_id.clone()).or_default() += 1;
        state
            .unfinished
            .retain(|r| &r.transaction_id != transaction_id);
        debug!(transaction_id = %transaction_id, "sandbox transaction finished");
        Ok(())
    }
}

impl ReceiptStore for SandboxPlatform {
    fn receipt_data(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.config.receipt.clone())
    }
}

/// Build a catalog entry with sensible defaults, priced in US dollars.
pub fn sandbox_product(identifier: &str, title: &str, price: &str) -> Product {
    Product {
        identifier: ProductId::from(identifier),
        title: title.to_owned(),
        description: format!("{title} (sandbox)"),
        price: price.to_owned(),
        price_string: format!("${price}"),
        currency_code: Some("USD".into()),
        currency_symbol: Some("$".into()),
        country_code: Some("US".into()),
        downloadable: false,
    }
}
