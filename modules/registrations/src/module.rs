use std::sync::Arc;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use modkit::{Module, ModuleCtx, StatefulModule};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::RegistrationsConfig;
use crate::contract::client::RegistrationsApi;
use crate::contract::identity::IdentityProvider;
use crate::domain::events::RegistrationEvent;
use crate::domain::service::Service;
use crate::gateways::local::RegistrationsLocalClient;
use crate::infra::events::BroadcastEventPublisher;
use crate::infra::storage::DocumentRegistrationsRepository;

/// Name under which the module reads its config section.
pub const MODULE_NAME: &str = "registrations";

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Registration store module.
///
/// `init` wires the store against the context's document store and the
/// [`IdentityProvider`] found in the hub, then publishes [`RegistrationsApi`].
/// `start` runs the identity sync task until `stop`.
#[derive(Default)]
pub struct Registrations {
    // Keep the domain service behind ArcSwap for cheap read-mostly access.
    service: arc_swap::ArcSwapOption<Service>,
    sync_task: Mutex<Option<SyncTask>>,
}

struct SyncTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Registrations {
    pub fn service(&self) -> Option<Arc<Service>> {
        self.service.load_full()
    }
}

#[async_trait]
impl Module for Registrations {
    async fn init(&self, ctx: &ModuleCtx) -> anyhow::Result<()> {
        info!("Initializing registrations module");

        let cfg: RegistrationsConfig = ctx.module_config();
        debug!(
            "Loaded registrations config: collection={}, request_timeout={:?}, serialize_mutations={}",
            cfg.collection, cfg.request_timeout, cfg.serialize_mutations
        );

        let store = ctx
            .docstore()
            .ok_or_else(|| anyhow!("document store required"))?;
        let hub = ctx.client_hub();
        let identity = hub
            .get::<dyn IdentityProvider>()
            .context("identity provider must be registered before registrations init")?;

        let events = Arc::new(BroadcastEventPublisher::<RegistrationEvent>::new(
            EVENT_CHANNEL_CAPACITY,
        ));
        hub.register::<BroadcastEventPublisher<RegistrationEvent>>(events.clone());

        // Wire repository (infra) to domain service (port)
        let repo = DocumentRegistrationsRepository::new(store, cfg.collection.clone());
        let service = Service::new(Arc::new(repo), identity, events, cfg.service_config())
            .with_cancellation(ctx.cancellation_token().child_token());
        let service = Arc::new(service);
        self.service.store(Some(service.clone()));

        // Local in-process client implementation published to ClientHub
        let api: Arc<dyn RegistrationsApi> = Arc::new(RegistrationsLocalClient::new(service));
        hub.register::<dyn RegistrationsApi>(api);
        info!("Registrations API exposed to ClientHub");
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[async_trait]
impl StatefulModule for Registrations {
    async fn start(&self, cancel: CancellationToken) -> anyhow::Result<()> {
        let service = self
            .service
            .load_full()
            .ok_or_else(|| anyhow!("registrations service not initialized"))?;

        let token = cancel.child_token();
        let handle = tokio::spawn(service.sync_with_identity(token.clone()));
        let previous = self.sync_task.lock().replace(SyncTask {
            cancel: token,
            handle,
        });
        if let Some(old) = previous {
            old.cancel.cancel();
        }
        info!("Registrations started");
        Ok(())
    }

    async fn stop(&self, _cancel: CancellationToken) -> anyhow::Result<()> {
        let task = self.sync_task.lock().take();
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                warn!(error = %e, "identity sync task ended abnormally");
            }
        }
        info!("Registrations stopped");
        Ok(())
    }
}
