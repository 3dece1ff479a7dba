use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Core module: DI/wiring. Reads config, builds services, publishes clients.
#[async_trait]
pub trait Module: Send + Sync + 'static {
    async fn init(&self, ctx: &crate::context::ModuleCtx) -> anyhow::Result<()>;
    fn as_any(&self) -> &dyn std::any::Any;
}

/// Module owning background work. `start` must return promptly (spawn, don't block);
/// the task must observe `cancel`.
#[async_trait]
pub trait StatefulModule: Send + Sync {
    async fn start(&self, cancel: CancellationToken) -> anyhow::Result<()>;
    async fn stop(&self, cancel: CancellationToken) -> anyhow::Result<()>;
}
