//! Plugkit runtime runner.
//!
//! Starts a [`ModuleHost`], waits until shutdown is requested and finalizes
//! the active modules. Shutdown can be driven by OS signals, an external
//! `CancellationToken`, or an arbitrary future.

use std::{future::Future, pin::Pin, sync::Arc};

use tokio_util::sync::CancellationToken;

use crate::runtime::host::ModuleHost;
use crate::runtime::shutdown;

/// How the runner should decide when to stop.
pub enum ShutdownOptions {
    /// Listen for OS signals (Ctrl+C / SIGTERM).
    Signals,
    /// An external `CancellationToken` controls the lifecycle.
    Token(CancellationToken),
    /// An arbitrary future; when it completes, we initiate shutdown.
    Future(Pin<Box<dyn Future<Output = ()> + Send>>),
}

pub struct RunOptions {
    pub host: Arc<ModuleHost>,
    pub shutdown: ShutdownOptions,
}

/// start → wait → stop.
pub async fn run(opts: RunOptions) -> anyhow::Result<()> {
    let cancel = match &opts.shutdown {
        ShutdownOptions::Token(t) => t.clone(),
        _ => CancellationToken::new(),
    };

    match opts.shutdown {
        ShutdownOptions::Signals => {
            let c = cancel.clone();
            tokio::spawn(async move {
                match shutdown::wait_for_shutdown().await {
                    Ok(()) => tracing::info!("shutdown: signal received"),
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            "shutdown: primary waiter failed; falling back to ctrl_c()"
                        );
                        let _ = tokio::signal::ctrl_c().await;
                    }
                }
                c.cancel();
            });
        }
        ShutdownOptions::Future(waiter) => {
            let c = cancel.clone();
            tokio::spawn(async move {
                waiter.await;
                tracing::info!("shutdown: external future completed");
                c.cancel();
            });
        }
        ShutdownOptions::Token(_) => {
            tracing::info!("shutdown: external token will control lifecycle");
        }
    }

    let snapshot = opts.host.start().await?;
    tracing::info!(
        active = ?snapshot.activation.active_ids(),
        disabled = snapshot.disabled_modules().len(),
        "Modules are up"
    );

    cancel.cancelled().await;
    opts.host.shutdown().await;
    Ok(())
}
