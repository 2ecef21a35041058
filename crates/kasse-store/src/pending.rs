// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pending requests and the handles callers await them through.
//
// A `PendingRequest` owns the sending half of a oneshot channel; resolving it
// consumes the request, so a request can be resolved at most once. If it is
// dropped unresolved (service torn down) the caller's handle yields
// `BridgeClosed`, so every handle completes exactly once.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::debug;

use kasse_core::error::{KasseError, Result};
use kasse_core::types::{CorrelationId, RequestKind};

/// One in-flight host request, as held in the request table.
#[derive(Debug)]
pub struct PendingRequest<T> {
    id: CorrelationId,
    kind: RequestKind,
    /// Product identifiers (lookup, purchase) or account hint (restore).
    subjects: Vec<String>,
    created_at: DateTime<Utc>,
    completion: oneshot::Sender<Result<T>>,
}

/// Read-only view of a pending request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSummary {
    pub id: CorrelationId,
    pub kind: RequestKind,
    pub subjects: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl<T> PendingRequest<T> {
    /// Create a request with a fresh correlation id and the handle its
    /// caller will await.
    pub fn new(kind: RequestKind, subjects: Vec<String>) -> (Self, RequestHandle<T>) {
        let id = CorrelationId::new();
        let (tx, rx) = oneshot::channel();
        let request = Self {
            id,
            kind,
            subjects,
            created_at: Utc::now(),
            completion: tx,
        };
        let handle = RequestHandle { id, kind, rx };
        (request, handle)
    }

    pub fn id(&self) -> CorrelationId {
        self.id
    }

    #[cfg(test)]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn summary(&self) -> PendingSummary {
        PendingSummary {
            id: self.id,
            kind: self.kind,
            subjects: self.subjects.clone(),
            created_at: self.created_at,
        }
    }

    /// Deliver the terminal result. Consumes the request.
    pub fn resolve(self, result: Result<T>) {
        let outcome = if result.is_ok() { "success" } else { "failure" };
        if self.completion.send(result).is_err() {
            debug!(request_id = %self.id, kind = %self.kind, "caller dropped its handle before resolution");
        } else {
            debug!(request_id = %self.id, kind = %self.kind, outcome, "request resolved");
        }
    }
}

/// Caller side of a pending request. Resolves to the single terminal result.
#[derive(Debug)]
pub struct RequestHandle<T> {
    id: CorrelationId,
    kind: RequestKind,
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> RequestHandle<T> {
    pub fn id(&self) -> CorrelationId {
        self.id
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// The result if it has already been delivered.
    ///
    /// Once this returns `Some`, the handle must not be awaited.
    pub fn try_take(&mut self) -> Option<Result<T>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => Some(Err(KasseError::BridgeClosed)),
        }
    }
}

impl<T> Future for RequestHandle<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(KasseError::BridgeClosed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_once_with_the_delivered_result() {
        let (request, handle) = PendingRequest::<u32>::new(RequestKind::Purchase, vec!["p".into()]);
        assert_eq!(request.id(), handle.id());
        assert_eq!(handle.kind(), RequestKind::Purchase);

        request.resolve(Ok(7));
        assert_eq!(handle.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn dropped_request_yields_bridge_closed() {
        let (request, handle) = PendingRequest::<u32>::new(RequestKind::Lookup, vec![]);
        drop(request);
        assert!(matches!(handle.await, Err(KasseError::BridgeClosed)));
    }

    #[test]
    fn try_take_is_empty_until_resolved() {
        let (request, mut handle) = PendingRequest::<u32>::new(RequestKind::Restore, vec![]);
        assert!(handle.try_take().is_none());

        request.resolve(Err(KasseError::Cancelled));
        assert!(matches!(handle.try_take(), Some(Err(KasseError::Cancelled))));
    }

    #[test]
    fn summary_copies_metadata() {
        let (request, _handle) =
            PendingRequest::<()>::new(RequestKind::Lookup, vec!["a".into(), "b".into()]);
        let summary = request.summary();
        assert_eq!(summary.id, request.id());
        assert_eq!(summary.subjects, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(summary.created_at, request.created_at());
    }
}
