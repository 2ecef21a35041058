// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Kasse — vendor purchase platform abstractions.
//
// This crate defines the traits the correlator talks to and the observer
// inbox through which the platform reports back. Native store adapters
// implement `PurchasePlatform`; the stub and sandbox implementations here
// allow the rest of the workspace to build and run on any host.

pub mod sandbox;
pub mod stub;
pub mod traits;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use sandbox::{SandboxConfig, SandboxPlatform};
pub use stub::StubPlatform;
pub use traits::{PurchasePlatform, VendorEvent, VendorInbox, VendorSink, vendor_channel};

/// Which platform implementation to run against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformKind {
    /// Simulated in-process store.
    #[default]
    Sandbox,
    /// No store: every operation is unavailable.
    Stub,
}

/// Build the selected platform implementation.
///
/// RETURNS: a shared trait object; the correlator and the host both hold it.
pub fn default_platform(kind: PlatformKind, sandbox: SandboxConfig) -> Arc<dyn PurchasePlatform> {
    match kind {
        PlatformKind::Sandbox => Arc::new(SandboxPlatform::new(sandbox)),
        PlatformKind::Stub => Arc::new(StubPlatform),
    }
}
