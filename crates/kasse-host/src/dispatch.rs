// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Routes host calls to the store service.
//
// Calls that need a vendor callback are registered synchronously, in the
// order their lines arrive, and then awaited on their own task; the reply is
// written when the request resolves. Everything else is answered at once.

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use kasse_bridge::traits::PurchasePlatform;
use kasse_core::error::Result;
use kasse_store::{RequestHandle, StoreService};

use crate::protocol::{HostCall, Inbound, Reply, decode_line};

/// Queue of serialised lines bound for stdout.
#[derive(Debug, Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<String>,
}

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send<T: Serialize>(&self, message: &T) {
        match serde_json::to_string(message) {
            Ok(line) => {
                if self.tx.send(line).is_err() {
                    debug!("output closed; message dropped");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialise outbound message"),
        }
    }
}

/// Read request lines until end of input. Lines that cannot be decoded are
/// answered or skipped; only a failed read ends the loop early.
pub async fn serve<R, P>(mut reader: R, service: &StoreService<P>, outbox: &Outbox) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    P: PurchasePlatform + ?Sized + 'static,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            return Ok(());
        }
        match decode_line(&line) {
            Some(Inbound::Call { id, call }) => dispatch(service, id, call, outbox),
            Some(Inbound::Malformed {
                id: Some(id),
                reason,
            }) => {
                warn!(id, %reason, "malformed request");
                outbox.send(&Reply::malformed(id, reason));
            }
            Some(Inbound::Malformed { id: None, reason }) => {
                warn!(%reason, "unreadable request line ignored");
            }
            None => {}
        }
    }
}

pub fn dispatch<P>(service: &StoreService<P>, id: u64, call: HostCall, outbox: &Outbox)
where
    P: PurchasePlatform + ?Sized + 'static,
{
    debug!(id, ?call, "host call");
    let reply = match call {
        HostCall::LoadProducts {
            product_identifiers,
        } => return settle(id, service.get_products(product_identifiers), outbox),
        HostCall::PurchaseProduct {
            product_identifier,
            quantity,
        } => return settle(id, service.purchase_product(product_identifier, quantity), outbox),
        HostCall::PurchaseProductForUser {
            product_identifier,
            username,
            quantity,
        } => {
            let registered =
                service.purchase_product_for_user(product_identifier, quantity, username);
            return settle(id, registered, outbox);
        }
        HostCall::RestorePurchases => return settle(id, service.restore_purchases(), outbox),
        HostCall::RestorePurchasesForUser { username } => {
            return settle(id, service.restore_purchases_for_user(username), outbox);
        }
        HostCall::CanMakePayments => Reply::ok(id, service.can_make_payments()),
        HostCall::ReceiptData => Reply::from_result(id, service.receipt_data()),
        HostCall::ShouldFinishTransactions {
            finish_transactions,
        } => {
            service.should_finish_transactions(finish_transactions);
            Reply::ok(id, finish_transactions)
        }
        HostCall::FinishCurrentTransaction => {
            Reply::from_result(id, service.finish_current_transaction())
        }
        HostCall::ClearCompletedTransactions => {
            Reply::from_result(id, service.clear_completed_transactions())
        }
        HostCall::FinishTransaction {
            transaction_identifier,
        } => Reply::from_result(id, service.finish_transaction(transaction_identifier)),
        HostCall::PendingRequests => Reply::ok(id, service.pending_requests()),
    };
    outbox.send(&reply);
}

/// Reply at once if registration failed, otherwise when the request resolves.
fn settle<T>(id: u64, registered: Result<RequestHandle<T>>, outbox: &Outbox)
where
    T: Serialize + Send + 'static,
{
    match registered {
        Ok(handle) => {
            let outbox = outbox.clone();
            tokio::spawn(async move {
                let result = handle.await;
                outbox.send(&Reply::from_result(id, result));
            });
        }
        Err(e) => outbox.send(&Reply::err(id, &e)),
    }
}
