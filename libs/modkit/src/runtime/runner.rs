//! ModKit runtime runner.
//!
//! We build **one stable ModuleCtx** and reuse it across all phases
//! (init → start → body/wait → stop). Shutdown of a long-running process can be
//! driven by OS signals, an external `CancellationToken`, or an arbitrary future.

use crate::client_hub::ClientHub;
use crate::context::{ConfigProvider, ModuleCtx, ModuleCtxBuilder};
use crate::registry::ModuleRegistry;
use crate::runtime::shutdown;
use modkit_docstore::DocumentStore;
use std::{future::Future, pin::Pin, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

/// How the runtime should decide when to stop.
pub enum ShutdownOptions {
    /// Listen for OS signals (Ctrl+C / SIGTERM).
    Signals,
    /// An external `CancellationToken` controls the lifecycle.
    Token(CancellationToken),
    /// An arbitrary future; when it completes, we initiate shutdown.
    Future(Pin<Box<dyn Future<Output = ()> + Send>>),
}

/// Options for running the ModKit runner.
pub struct RunOptions {
    pub registry: ModuleRegistry,
    /// Provider of module config sections (raw JSON by module name).
    pub modules_cfg: Arc<dyn ConfigProvider>,
    /// Document store handed to modules through their context.
    pub docstore: Option<Arc<dyn DocumentStore>>,
    /// Hub shared with the caller; pre-registered clients (e.g. identity) are visible to modules.
    pub client_hub: Arc<ClientHub>,
    /// Upper bound for the stop phase; `None` waits indefinitely.
    pub stop_timeout: Option<Duration>,
}

fn build_ctx(opts: &RunOptions, cancel: &CancellationToken) -> ModuleCtx {
    let mut builder = ModuleCtxBuilder::new(cancel.clone())
        .with_client_hub(opts.client_hub.clone())
        .with_config_provider(opts.modules_cfg.clone());
    if let Some(store) = &opts.docstore {
        builder = builder.with_docstore(store.clone());
    }
    builder.build()
}

async fn stop_phase(
    registry: &ModuleRegistry,
    cancel: CancellationToken,
    stop_timeout: Option<Duration>,
) -> anyhow::Result<()> {
    tracing::info!("Phase: stop");
    match stop_timeout {
        Some(limit) => tokio::time::timeout(limit, registry.run_stop_phase(cancel))
            .await
            .map_err(|_| anyhow::anyhow!("stop phase exceeded {limit:?}"))??,
        None => registry.run_stop_phase(cancel).await?,
    }
    Ok(())
}

/// Full cycle for a long-running process: init → start → wait → stop.
pub async fn run(opts: RunOptions, shutdown_opts: ShutdownOptions) -> anyhow::Result<()> {
    let cancel = match &shutdown_opts {
        ShutdownOptions::Token(t) => t.clone(),
        _ => CancellationToken::new(),
    };

    let ctx = build_ctx(&opts, &cancel);

    tracing::info!("Phase: init");
    opts.registry.run_init_phase(&ctx).await?;

    tracing::info!("Phase: start");
    opts.registry.run_start_phase(cancel.clone()).await?;

    match shutdown_opts {
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

    cancel.cancelled().await;
    stop_phase(&opts.registry, cancel, opts.stop_timeout).await
}

/// One-shot cycle: init → start → `body` → stop.
///
/// `body` runs with every module started and receives the shared hub. Modules
/// are stopped even when `body` fails; the body's error wins over a stop error.
pub async fn run_phases<F, Fut, T>(opts: RunOptions, body: F) -> anyhow::Result<T>
where
    F: FnOnce(Arc<ClientHub>) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let cancel = CancellationToken::new();
    let ctx = build_ctx(&opts, &cancel);

    tracing::debug!("Phase: init");
    opts.registry.run_init_phase(&ctx).await?;
    tracing::debug!("Phase: start");
    opts.registry.run_start_phase(cancel.clone()).await?;

    let result = body(opts.client_hub.clone()).await;

    cancel.cancel();
    let stopped = stop_phase(&opts.registry, cancel, opts.stop_timeout).await;
    let value = result?;
    stopped?;
    Ok(value)
}
