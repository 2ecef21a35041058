// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Kasse — in-app purchase bridge host
//
// Entry point. Initialises logging, loads configuration, starts the store
// service, and serves the JSON-lines bridge channel on stdin/stdout until
// the host closes stdin. Logs go to stderr so stdout carries only protocol.

mod config;
mod data_dir;
mod dispatch;
mod protocol;

use std::process::ExitCode;

use tokio::io::{AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use kasse_bridge::default_platform;
use kasse_core::error::Result;
use kasse_store::StoreService;

use config::HostConfig;
use dispatch::{Outbox, serve};
use protocol::HostEvent;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Kasse starting");

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "bridge host failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let config = HostConfig::load();
    let platform = default_platform(config.platform, config.sandbox);
    let service = StoreService::start(platform, config.store)?;

    let (outbox, mut outgoing) = Outbox::channel();

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(mut line) = outgoing.recv().await {
            line.push('\n');
            if let Err(e) = stdout.write_all(line.as_bytes()).await {
                warn!(error = %e, "stdout closed");
                break;
            }
            if let Err(e) = stdout.flush().await {
                warn!(error = %e, "stdout closed");
                break;
            }
        }
    });

    let forwarder = {
        let outbox = outbox.clone();
        let mut events = service.subscribe();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                outbox.send(&HostEvent::TransactionUpdated(event));
            }
        })
    };

    let served = serve(BufReader::new(tokio::io::stdin()), &service, &outbox).await;
    match &served {
        Ok(()) => info!("stdin closed, shutting down"),
        Err(e) => warn!(error = %e, "stdin read failed, shutting down"),
    }

    service.shutdown();
    forwarder.abort();
    let _ = forwarder.await;
    drop(outbox);

    // In-flight requests reply `bridge_closed` before the writer drains.
    if writer.await.is_err() {
        debug!("output writer ended abnormally");
    }
    served?;
    Ok(())
}
