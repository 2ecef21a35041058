// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Kasse — transaction correlation for in-app purchases.
//
// The vendor payment queue reports results through one global observer,
// detached from the calls that started them. This crate keeps a table of
// pending host requests and matches each vendor callback to the request it
// completes, resolving every request exactly once.

pub mod correlator;
pub mod events;
pub mod pending;
pub mod service;
pub mod table;

pub use correlator::TransactionCorrelator;
pub use events::EventEmitter;
pub use pending::{PendingRequest, PendingSummary, RequestHandle};
pub use service::StoreService;
pub use table::RequestTable;
