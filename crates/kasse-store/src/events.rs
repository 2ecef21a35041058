// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Outbound transaction event stream.
//
// Every transaction state change the vendor reports is sent to each
// listener, whether or not a pending request is waiting on it. Each
// listener owns an unbounded queue, so a slow host never loses an event and
// never holds up request resolution. Listeners whose receiver has been
// dropped are pruned on the next emit.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::trace;

use kasse_core::types::TransactionEvent;

#[derive(Debug, Clone, Default)]
pub struct EventEmitter {
    listeners: Arc<Mutex<Vec<mpsc::UnboundedSender<TransactionEvent>>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<TransactionEvent>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn emit(&self, event: TransactionEvent) {
        let mut listeners = self.listeners();
        listeners.retain(|tx| tx.send(event.clone()).is_ok());
        if listeners.is_empty() {
            trace!("no transaction listeners subscribed");
        }
    }

    /// Register a listener. It receives every event emitted from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<TransactionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners().push(tx);
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kasse_core::types::{TransactionRecord, TransactionState};

    fn event(id: &str) -> TransactionEvent {
        TransactionRecord::new(id, "p", TransactionState::Purchasing).event()
    }

    #[tokio::test]
    async fn every_subscriber_sees_each_event() {
        let emitter = EventEmitter::new();
        let mut a = emitter.subscribe();
        let mut b = emitter.clone().subscribe();

        emitter.emit(event("t"));

        assert_eq!(a.recv().await.unwrap(), event("t"));
        assert_eq!(b.recv().await.unwrap(), event("t"));
    }

    #[test]
    fn an_idle_listener_misses_nothing() {
        let emitter = EventEmitter::new();
        let mut rx = emitter.subscribe();
        for i in 0..1000 {
            emitter.emit(event(&format!("t{i}")));
        }

        let mut received = 0;
        while let Ok(e) = rx.try_recv() {
            assert_eq!(e.transaction_id.as_str(), format!("t{received}"));
            received += 1;
        }
        assert_eq!(received, 1000);
    }

    #[test]
    fn dropped_listeners_are_pruned() {
        let emitter = EventEmitter::new();
        let dropped = emitter.subscribe();
        let mut kept = emitter.subscribe();
        drop(dropped);

        emitter.emit(event("t"));
        assert_eq!(emitter.listeners().len(), 1);
        assert!(kept.try_recv().is_ok());
    }
}
