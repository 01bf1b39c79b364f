// SPDX-FileCopyrightText: 2026 Continuity Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shutdown signal handling.
//!
//! The serve loop awaits [`wait_for_signal`] inside axum's
//! graceful-shutdown hook and then cancels the engine's own
//! [`CancellationToken`](tokio_util::sync::CancellationToken), so the
//! listener drains in-flight requests while the decay timer and any
//! backfill task wind down through the engine's plumbing. There is no
//! detached handler task to clean up afterwards.

use tracing::info;

/// Resolves once the process receives SIGINT (Ctrl+C) or SIGTERM.
///
/// Awaited inline rather than spawned; dropping the future uninstalls the
/// handlers.
pub async fn wait_for_signal() {
    let signal = signal_name().await;
    info!(signal, "stopping continuity, draining in-flight requests");
}

#[cfg(unix)]
async fn signal_name() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    // SIGTERM registration can fail in exotic environments; Ctrl+C alone
    // still gives an orderly exit there.
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable, listening for Ctrl+C only");
            let _ = tokio::signal::ctrl_c().await;
            return "SIGINT";
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = sigterm.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn signal_name() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "SIGINT"
}
