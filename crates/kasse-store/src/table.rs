// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The pending request table.
//
// Lookups are keyed by the correlation id handed to the vendor. Purchases
// are queued per product and matched oldest first. At most one restore is
// in flight; restored transactions accumulate on it until the vendor
// signals the end of the restore queue. Removing an entry hands ownership
// of its completion to the caller, so nothing in the table can fire twice.

use std::collections::{HashMap, VecDeque};

use kasse_core::error::{KasseError, Result};
use kasse_core::types::{CorrelationId, ProductId, ProductsResponse, RequestKind, TransactionRecord};

use crate::pending::{PendingRequest, PendingSummary};

/// The restore request and everything restored for it so far.
#[derive(Debug)]
pub struct RestoreInFlight {
    pub request: PendingRequest<Vec<TransactionRecord>>,
    pub restored: Vec<TransactionRecord>,
}

#[derive(Debug, Default)]
pub struct RequestTable {
    lookups: HashMap<CorrelationId, PendingRequest<ProductsResponse>>,
    purchases: HashMap<ProductId, VecDeque<PendingRequest<TransactionRecord>>>,
    restore: Option<RestoreInFlight>,
}

impl RequestTable {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Lookups -------------------------------------------------------------

    pub fn insert_lookup(&mut self, request: PendingRequest<ProductsResponse>) {
        self.lookups.insert(request.id(), request);
    }

    pub fn take_lookup(&mut self, id: &CorrelationId) -> Option<PendingRequest<ProductsResponse>> {
        self.lookups.remove(id)
    }

    // -- Purchases -----------------------------------------------------------

    pub fn enqueue_purchase(&mut self, product: ProductId, request: PendingRequest<TransactionRecord>) {
        self.purchases.entry(product).or_default().push_back(request);
    }

    /// Remove the oldest outstanding purchase of `product`.
    pub fn take_oldest_purchase(
        &mut self,
        product: &ProductId,
    ) -> Option<PendingRequest<TransactionRecord>> {
        let queue = self.purchases.get_mut(product)?;
        let request = queue.pop_front();
        if queue.is_empty() {
            self.purchases.remove(product);
        }
        request
    }

    /// Remove one specific purchase (registration rollback).
    pub fn remove_purchase(
        &mut self,
        product: &ProductId,
        id: CorrelationId,
    ) -> Option<PendingRequest<TransactionRecord>> {
        let queue = self.purchases.get_mut(product)?;
        let position = queue.iter().position(|r| r.id() == id)?;
        let request = queue.remove(position);
        if queue.is_empty() {
            self.purchases.remove(product);
        }
        request
    }

    #[cfg(test)]
    pub fn outstanding_purchases(&self, product: &ProductId) -> usize {
        self.purchases.get(product).map_or(0, VecDeque::len)
    }

    // -- Restore -------------------------------------------------------------

    pub fn is_restoring(&self) -> bool {
        self.restore.is_some()
    }

    pub fn begin_restore(&mut self, request: PendingRequest<Vec<TransactionRecord>>) -> Result<()> {
        if self.restore.is_some() {
            return Err(KasseError::RequestInProgress(RequestKind::Restore));
        }
        self.restore = Some(RestoreInFlight {
            request,
            restored: Vec::new(),
        });
        Ok(())
    }

    /// Accumulate a restored transaction. Returns false if no restore is in
    /// flight to receive it.
    pub fn record_restored(&mut self, record: TransactionRecord) -> bool {
        match self.restore.as_mut() {
            Some(in_flight) => {
                in_flight.restored.push(record);
                true
            }
            None => false,
        }
    }

    pub fn take_restore(&mut self) -> Option<RestoreInFlight> {
        self.restore.take()
    }

    // -- Introspection -------------------------------------------------------

    pub fn len(&self) -> usize {
        self.lookups.len()
            + self.purchases.values().map(VecDeque::len).sum::<usize>()
            + usize::from(self.restore.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every pending request, oldest first.
    pub fn summaries(&self) -> Vec<PendingSummary> {
        let mut out: Vec<PendingSummary> = self
            .lookups
            .values()
            .map(PendingRequest::summary)
            .chain(self.purchases.values().flatten().map(PendingRequest::summary))
            .chain(self.restore.iter().map(|r| r.request.summary()))
            .collect();
        out.sort_by_key(|s| s.created_at);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kasse_core::types::TransactionState;

    fn purchase(product: &str) -> (PendingRequest<TransactionRecord>, crate::pending::RequestHandle<TransactionRecord>) {
        PendingRequest::new(RequestKind::Purchase, vec![product.to_string()])
    }

    #[test]
    fn purchases_match_oldest_first() {
        let mut table = RequestTable::new();
        let product = ProductId::from("com.app.pro");
        let (first, first_handle) = purchase("com.app.pro");
        let (second, second_handle) = purchase("com.app.pro");
        table.enqueue_purchase(product.clone(), first);
        table.enqueue_purchase(product.clone(), second);
        assert_eq!(table.outstanding_purchases(&product), 2);

        let taken = table.take_oldest_purchase(&product).unwrap();
        assert_eq!(taken.id(), first_handle.id());
        let taken = table.take_oldest_purchase(&product).unwrap();
        assert_eq!(taken.id(), second_handle.id());
        assert!(table.take_oldest_purchase(&product).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn remove_purchase_leaves_the_others() {
        let mut table = RequestTable::new();
        let product = ProductId::from("p");
        let (first, _h1) = purchase("p");
        let (second, h2) = purchase("p");
        table.enqueue_purchase(product.clone(), first);
        table.enqueue_purchase(product.clone(), second);

        assert!(table.remove_purchase(&product, h2.id()).is_some());
        assert_eq!(table.outstanding_purchases(&product), 1);
        assert!(table.remove_purchase(&product, h2.id()).is_none());
    }

    #[test]
    fn only_one_restore_at_a_time() {
        let mut table = RequestTable::new();
        let (first, _h1) = PendingRequest::new(RequestKind::Restore, vec![]);
        let (second, _h2) = PendingRequest::new(RequestKind::Restore, vec![]);

        table.begin_restore(first).unwrap();
        assert!(matches!(
            table.begin_restore(second),
            Err(KasseError::RequestInProgress(RequestKind::Restore))
        ));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn restored_records_accumulate() {
        let mut table = RequestTable::new();
        let record = TransactionRecord::new("t", "p", TransactionState::Restored);
        assert!(!table.record_restored(record.clone()));

        let (request, _handle) = PendingRequest::new(RequestKind::Restore, vec![]);
        table.begin_restore(request).unwrap();
        assert!(table.record_restored(record.clone()));
        assert!(table.record_restored(record));

        let in_flight = table.take_restore().unwrap();
        assert_eq!(in_flight.restored.len(), 2);
        assert!(!table.is_restoring());
    }

    #[test]
    fn summaries_cover_every_kind() {
        let mut table = RequestTable::new();
        let (lookup, _l) = PendingRequest::new(RequestKind::Lookup, vec!["a".into()]);
        let (buy, _b) = purchase("a");
        let (restore, _r) = PendingRequest::new(RequestKind::Restore, vec![]);
        table.insert_lookup(lookup);
        table.enqueue_purchase(ProductId::from("a"), buy);
        table.begin_restore(restore).unwrap();

        let kinds: Vec<_> = table.summaries().into_iter().map(|s| s.kind).collect();
        assert_eq!(kinds.len(), 3);
        assert!(kinds.contains(&RequestKind::Lookup));
        assert!(kinds.contains(&RequestKind::Purchase));
        assert!(kinds.contains(&RequestKind::Restore));
    }
}
