// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for request registration and callback correlation
// in the kasse-store crate.

use std::sync::Arc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use kasse_bridge::sandbox::{SandboxConfig, SandboxPlatform};
use kasse_bridge::traits::VendorEvent;
use kasse_core::config::StoreConfig;
use kasse_core::types::{ProductId, TransactionRecord, TransactionState};
use kasse_store::{EventEmitter, TransactionCorrelator};

fn correlator() -> TransactionCorrelator<SandboxPlatform> {
    let config = StoreConfig {
        validate_against_catalog: false,
        ..StoreConfig::default()
    };
    TransactionCorrelator::new(
        Arc::new(SandboxPlatform::new(SandboxConfig::manual())),
        config,
        EventEmitter::new(),
    )
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Register a purchase and resolve it with `purchasing` then `purchased`.
fn bench_purchase_cycle(c: &mut Criterion) {
    let mut correlator = correlator();
    let product = ProductId::from("com.app.pro");
    let mut n: u64 = 0;

    c.bench_function("purchase_register_and_resolve", |b| {
        b.iter(|| {
            n += 1;
            let mut handle = correlator
                .purchase(product.clone(), 1, None)
                .expect("register failed");
            let id = format!("t{n}");
            for state in [TransactionState::Purchasing, TransactionState::Purchased] {
                let record = TransactionRecord::new(id.as_str(), product.clone(), state);
                correlator
                    .on_vendor_event(VendorEvent::TransactionUpdated(record))
                    .expect("callback failed");
            }
            black_box(handle.try_take());
        });
    });
}

/// Match a callback against a deep per-product queue and many other
/// products' queues.
fn bench_resolve_with_backlog(c: &mut Criterion) {
    let sizes: &[usize] = &[10, 100, 1000];

    let mut group = c.benchmark_group("resolve_with_backlog");
    for &size in sizes {
        let mut correlator = correlator();
        let mut handles = Vec::with_capacity(size);
        for i in 0..size {
            let product = ProductId::from(format!("com.app.item{i}"));
            handles.push(correlator.purchase(product, 1, None).expect("register failed"));
        }
        let target = ProductId::from("com.app.target");
        let mut n: u64 = 0;

        group.bench_function(format!("{size} pending"), |b| {
            b.iter(|| {
                n += 1;
                let mut handle = correlator
                    .purchase(target.clone(), 1, None)
                    .expect("register failed");
                let record = TransactionRecord::new(
                    format!("bt{n}"),
                    target.clone(),
                    TransactionState::Purchased,
                );
                correlator
                    .on_vendor_event(VendorEvent::TransactionUpdated(record))
                    .expect("callback failed");
                black_box(handle.try_take());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_purchase_cycle, bench_resolve_with_backlog);
criterion_main!(benches);
