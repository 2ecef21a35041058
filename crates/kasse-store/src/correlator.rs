// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transaction correlator.
//
// Pairs every host request with the vendor callback that completes it.
// Registration validates the request, records it in the request table and
// hands it to the platform; callbacks remove the matching entry and resolve
// it. Every transaction update is broadcast to the host first, so listeners
// see state changes even when no request is waiting.
//
// Terminal transactions are finalised with the vendor exactly once: either
// immediately after delivery, or, with `finish_transactions` off, when the
// host finishes them explicitly. Redeliveries of a transaction that is held
// or was recently finalised are ignored; only the newest `settled_history`
// finalised ids are remembered.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use kasse_bridge::traits::{PurchasePlatform, VendorEvent};
use kasse_core::config::StoreConfig;
use kasse_core::error::{KasseError, Result};
use kasse_core::types::{
    CorrelationId, Payment, Product, ProductId, ProductsResponse, RequestKind, TransactionId,
    TransactionRecord, TransactionState, VendorError, VendorErrorCode,
};

use crate::events::EventEmitter;
use crate::pending::{PendingRequest, PendingSummary, RequestHandle};
use crate::table::RequestTable;

pub struct TransactionCorrelator<P: PurchasePlatform + ?Sized> {
    platform: Arc<P>,
    config: StoreConfig,
    table: RequestTable,
    /// Products returned by the last successful lookup.
    catalog: HashMap<ProductId, Product>,
    events: EventEmitter,
    /// Recently finalised or held transactions.
    settled: HashSet<TransactionId>,
    /// `settled` in insertion order, oldest first.
    settled_order: VecDeque<TransactionId>,
    /// Terminal transactions awaiting explicit finalisation, oldest first.
    held: Vec<TransactionRecord>,
}

impl<P: PurchasePlatform + ?Sized> TransactionCorrelator<P> {
    pub fn new(platform: Arc<P>, config: StoreConfig, events: EventEmitter) -> Self {
        Self {
            platform,
            config,
            table: RequestTable::new(),
            catalog: HashMap::new(),
            events,
            settled: HashSet::new(),
            settled_order: VecDeque::new(),
            held: Vec::new(),
        }
    }

    // -- Registration --------------------------------------------------------

    /// Ask the vendor for product metadata.
    ///
    /// Duplicate identifiers are collapsed. An empty set is rejected.
    #[instrument(skip(self, identifiers), fields(requested = identifiers.len()))]
    pub fn request_products(
        &mut self,
        identifiers: &[ProductId],
    ) -> Result<RequestHandle<ProductsResponse>> {
        let mut seen = HashSet::new();
        let unique: Vec<ProductId> = identifiers
            .iter()
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect();

        if unique.is_empty() {
            return Err(KasseError::InvalidArgument(
                "product identifier set is empty".into(),
            ));
        }
        if unique.iter().any(|id| id.as_str().is_empty()) {
            return Err(KasseError::InvalidArgument(
                "product identifier must not be empty".into(),
            ));
        }

        let subjects = unique.iter().map(ToString::to_string).collect();
        let (pending, handle) = PendingRequest::new(RequestKind::Lookup, subjects);
        let request_id = pending.id();
        self.table.insert_lookup(pending);

        if let Err(e) = self.platform.start_products_request(request_id, &unique) {
            self.table.take_lookup(&request_id);
            warn!(request_id = %request_id, error = %e, "platform rejected product lookup");
            return Err(e);
        }

        debug!(request_id = %request_id, products = unique.len(), "product lookup registered");
        Ok(handle)
    }

    /// Queue a payment for `product_id`.
    #[instrument(skip(self, product_id, application_username), fields(product_id = %product_id))]
    pub fn purchase(
        &mut self,
        product_id: ProductId,
        quantity: u32,
        application_username: Option<String>,
    ) -> Result<RequestHandle<TransactionRecord>> {
        if product_id.as_str().is_empty() {
            return Err(KasseError::InvalidArgument(
                "product identifier must not be empty".into(),
            ));
        }
        if quantity == 0 {
            return Err(KasseError::InvalidArgument(
                "quantity must be at least 1".into(),
            ));
        }
        if self.config.validate_against_catalog && !self.catalog.contains_key(&product_id) {
            return Err(KasseError::UnavailableProduct(product_id));
        }

        let payment = Payment {
            product_id: product_id.clone(),
            quantity,
            application_username,
        };
        let (pending, handle) =
            PendingRequest::new(RequestKind::Purchase, vec![product_id.to_string()]);
        let request_id = pending.id();
        self.table.enqueue_purchase(product_id.clone(), pending);

        if let Err(e) = self.platform.add_payment(&payment) {
            self.table.remove_purchase(&product_id, request_id);
            warn!(request_id = %request_id, error = %e, "platform rejected payment");
            return Err(e);
        }

        debug!(request_id = %request_id, "purchase registered");
        Ok(handle)
    }

    /// Ask the vendor to replay previously completed purchases.
    #[instrument(skip(self, application_username))]
    pub fn restore_purchases(
        &mut self,
        application_username: Option<String>,
    ) -> Result<RequestHandle<Vec<TransactionRecord>>> {
        if self.table.is_restoring() {
            return Err(KasseError::RequestInProgress(RequestKind::Restore));
        }

        let subjects = application_username.iter().cloned().collect();
        let (pending, handle) = PendingRequest::new(RequestKind::Restore, subjects);
        let request_id = pending.id();
        self.table.begin_restore(pending)?;

        if let Err(e) = self
            .platform
            .restore_completed_transactions(application_username.as_deref())
        {
            self.table.take_restore();
            warn!(request_id = %request_id, error = %e, "platform rejected restore");
            return Err(e);
        }

        debug!(request_id = %request_id, "restore registered");
        Ok(handle)
    }

    // -- Vendor callbacks ----------------------------------------------------

    /// Apply one vendor callback.
    ///
    /// `RequestNotFound` means the callback had nothing to resolve; the
    /// caller should log it and carry on.
    pub fn on_vendor_event(&mut self, event: VendorEvent) -> Result<()> {
        match event {
            VendorEvent::ProductsResponse {
                request_id,
                response,
            } => self.on_products_response(request_id, response),
            VendorEvent::ProductsRequestFailed { request_id, error } => {
                self.on_products_request_failed(request_id, error)
            }
            VendorEvent::TransactionUpdated(record) => {
                self.on_transaction_updated(record);
                Ok(())
            }
            VendorEvent::RestoreCompleted => self.on_restore_completed(),
            VendorEvent::RestoreFailed(error) => self.on_restore_failed(error),
        }
    }

    #[instrument(skip(self, response), fields(products = response.products.len(), invalid = response.invalid_product_ids.len()))]
    pub fn on_products_response(
        &mut self,
        request_id: CorrelationId,
        response: ProductsResponse,
    ) -> Result<()> {
        let pending = self
            .table
            .take_lookup(&request_id)
            .ok_or_else(|| KasseError::RequestNotFound(format!("product lookup {request_id}")))?;

        self.catalog = response
            .products
            .iter()
            .map(|p| (p.identifier.clone(), p.clone()))
            .collect();
        if !response.invalid_product_ids.is_empty() {
            info!(invalid = ?response.invalid_product_ids, "vendor does not recognise some products");
        }

        pending.resolve(Ok(response));
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn on_products_request_failed(
        &mut self,
        request_id: CorrelationId,
        error: VendorError,
    ) -> Result<()> {
        let pending = self
            .table
            .take_lookup(&request_id)
            .ok_or_else(|| KasseError::RequestNotFound(format!("product lookup {request_id}")))?;
        pending.resolve(Err(KasseError::from_vendor(error)));
        Ok(())
    }

    /// Broadcast the update, resolve whichever request it completes, then
    /// finalise it if terminal.
    #[instrument(skip(self, record), fields(transaction_id = %record.transaction_id, product_id = %record.product_id, state = ?record.state))]
    pub fn on_transaction_updated(&mut self, record: TransactionRecord) {
        if record.state.is_terminal() && self.is_settled(&record.transaction_id) {
            debug!("transaction already settled; ignoring redelivery");
            return;
        }

        self.events.emit(record.event());

        match record.state {
            TransactionState::Purchasing => debug!("transaction in progress"),
            TransactionState::Deferred => info!("transaction deferred; request stays pending"),
            TransactionState::Purchased => {
                match self.table.take_oldest_purchase(&record.product_id) {
                    Some(pending) => pending.resolve(Ok(record.clone())),
                    None => info!("purchased transaction with no pending request"),
                }
                self.complete(record);
            }
            TransactionState::Failed => {
                let error = record.error.clone().unwrap_or_else(|| {
                    VendorError::new(VendorErrorCode::Unknown, "transaction failed")
                });
                match self.table.take_oldest_purchase(&record.product_id) {
                    Some(pending) => pending.resolve(Err(KasseError::from_vendor(error))),
                    None => info!(error = %error, "failed transaction with no pending request"),
                }
                self.complete(record);
            }
            TransactionState::Restored => {
                if !self.table.record_restored(record.clone()) {
                    info!("restored transaction with no restore in flight");
                }
                self.complete(record);
            }
        }
    }

    #[instrument(skip(self))]
    pub fn on_restore_completed(&mut self) -> Result<()> {
        let in_flight = self
            .table
            .take_restore()
            .ok_or_else(|| KasseError::RequestNotFound("restore".into()))?;
        info!(restored = in_flight.restored.len(), "restore completed");
        in_flight.request.resolve(Ok(in_flight.restored));
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn on_restore_failed(&mut self, error: VendorError) -> Result<()> {
        let in_flight = self
            .table
            .take_restore()
            .ok_or_else(|| KasseError::RequestNotFound("restore".into()))?;
        in_flight.request.resolve(Err(KasseError::from_vendor(error)));
        Ok(())
    }

    // -- Finalisation --------------------------------------------------------

    fn is_settled(&self, transaction_id: &TransactionId) -> bool {
        self.settled.contains(transaction_id)
            || self.held.iter().any(|r| &r.transaction_id == transaction_id)
    }

    fn remember_settled(&mut self, transaction_id: TransactionId) {
        if !self.settled.insert(transaction_id.clone()) {
            return;
        }
        self.settled_order.push_back(transaction_id);
        while self.settled_order.len() > self.config.settled_history.max(1) {
            if let Some(forgotten) = self.settled_order.pop_front() {
                self.settled.remove(&forgotten);
            }
        }
    }

    fn complete(&mut self, record: TransactionRecord) {
        self.remember_settled(record.transaction_id.clone());

        if !self.config.finish_transactions {
            debug!("holding transaction for explicit finalisation");
            self.held.push(record);
            return;
        }

        match self.platform.finish_transaction(&record.transaction_id) {
            Ok(()) => debug!("transaction finalised"),
            Err(e) => {
                warn!(error = %e, "finalisation failed; holding transaction");
                self.held.push(record);
            }
        }
    }

    pub fn set_finish_transactions(&mut self, finish: bool) {
        info!(finish, "automatic finalisation updated");
        self.config.finish_transactions = finish;
    }

    #[cfg(test)]
    pub fn finish_transactions(&self) -> bool {
        self.config.finish_transactions
    }

    /// Finalise one held transaction. It stays held if the platform refuses.
    #[instrument(skip(self), fields(transaction_id = %transaction_id))]
    pub fn finish_transaction(&mut self, transaction_id: &TransactionId) -> Result<TransactionRecord> {
        let position = self
            .held
            .iter()
            .position(|r| &r.transaction_id == transaction_id)
            .ok_or_else(|| KasseError::TransactionNotFound(transaction_id.clone()))?;

        self.platform.finish_transaction(transaction_id)?;
        debug!("held transaction finalised");
        Ok(self.held.remove(position))
    }

    /// Finalise the most recently held transaction, if any.
    pub fn finish_current_transaction(&mut self) -> Result<Option<TransactionRecord>> {
        let Some(current) = self.held.last() else {
            return Ok(None);
        };
        let transaction_id = current.transaction_id.clone();
        self.finish_transaction(&transaction_id).map(Some)
    }

    /// Finalise every held transaction, oldest first. Stops at the first
    /// platform failure, leaving that one and the rest held.
    pub fn clear_completed_transactions(&mut self) -> Result<Vec<TransactionRecord>> {
        let mut finished = Vec::with_capacity(self.held.len());
        while let Some(oldest) = self.held.first() {
            self.platform.finish_transaction(&oldest.transaction_id)?;
            finished.push(self.held.remove(0));
        }
        if !finished.is_empty() {
            info!(count = finished.len(), "held transactions finalised");
        }
        Ok(finished)
    }

    pub fn held_transactions(&self) -> &[TransactionRecord] {
        &self.held
    }

    // -- Introspection -------------------------------------------------------

    pub fn pending_count(&self) -> usize {
        self.table.len()
    }

    pub fn pending_requests(&self) -> Vec<PendingSummary> {
        self.table.summaries()
    }

    #[cfg(test)]
    pub fn catalog(&self) -> Vec<Product> {
        let mut products: Vec<Product> = self.catalog.values().cloned().collect();
        products.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        products
    }

    /// Drop every pending request; their handles resolve with `BridgeClosed`.
    pub fn close(&mut self) {
        let abandoned = self.table.len();
        self.table = RequestTable::new();
        if abandoned > 0 {
            info!(abandoned, "pending requests abandoned on shutdown");
        }
    }
}
