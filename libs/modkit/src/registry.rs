use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use thiserror::Error;

use crate::context::ModuleCtx;
use crate::contracts::{Module, StatefulModule};

pub struct ModuleEntry {
    pub name: &'static str,
    pub core: Arc<dyn Module>,
    pub stateful: Option<Arc<dyn StatefulModule>>,
}

impl std::fmt::Debug for ModuleEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleEntry")
            .field("name", &self.name)
            .field("has_stateful", &self.stateful.is_some())
            .finish()
    }
}

/// Modules in registration order; phases run in that order, `stop` in reverse.
pub struct ModuleRegistry {
    modules: Vec<ModuleEntry>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&'static str> = self.modules.iter().map(|m| m.name).collect();
        f.debug_struct("ModuleRegistry")
            .field("modules", &names)
            .finish()
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<ModuleEntry>,
}

impl RegistryBuilder {
    /// Add a module with no background work.
    pub fn module(mut self, name: &'static str, core: Arc<dyn Module>) -> Self {
        self.entries.push(ModuleEntry {
            name,
            core,
            stateful: None,
        });
        self
    }

    /// Add a module that also runs background work between start and stop.
    pub fn stateful(
        mut self,
        name: &'static str,
        core: Arc<dyn Module>,
        stateful: Arc<dyn StatefulModule>,
    ) -> Self {
        self.entries.push(ModuleEntry {
            name,
            core,
            stateful: Some(stateful),
        });
        self
    }

    pub fn build(self) -> Result<ModuleRegistry, RegistryError> {
        let mut seen = HashSet::new();
        for e in &self.entries {
            if !seen.insert(e.name) {
                return Err(RegistryError::DuplicateModule(e.name));
            }
        }
        Ok(ModuleRegistry {
            modules: self.entries,
        })
    }
}

impl ModuleRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn modules(&self) -> &[ModuleEntry] {
        &self.modules
    }

    pub async fn run_init_phase(&self, base_ctx: &ModuleCtx) -> Result<(), RegistryError> {
        for e in &self.modules {
            let ctx = base_ctx.clone().for_module(e.name);
            e.core
                .init(&ctx)
                .await
                .map_err(|source| RegistryError::Init {
                    module: e.name,
                    source,
                })?;
            tracing::debug!(module = e.name, "module initialized");
        }
        Ok(())
    }

    pub async fn run_start_phase(&self, cancel: CancellationToken) -> Result<(), RegistryError> {
        for e in &self.modules {
            if let Some(s) = &e.stateful {
                s.start(cancel.clone())
                    .await
                    .map_err(|source| RegistryError::Start {
                        module: e.name,
                        source,
                    })?;
                tracing::debug!(module = e.name, "module started");
            }
        }
        Ok(())
    }

    /// Stops every stateful module even if some fail; returns the first failure.
    pub async fn run_stop_phase(&self, cancel: CancellationToken) -> Result<(), RegistryError> {
        let mut first_err = None;
        for e in self.modules.iter().rev() {
            if let Some(s) = &e.stateful {
                if let Err(source) = s.stop(cancel.clone()).await {
                    tracing::warn!(module = e.name, error = %source, "module stop failed");
                    first_err.get_or_insert(RegistryError::Stop {
                        module: e.name,
                        source,
                    });
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("module '{0}' registered twice")]
    DuplicateModule(&'static str),

    #[error("module '{module}' init failed")]
    Init {
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("module '{module}' start failed")]
    Start {
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("module '{module}' stop failed")]
    Stop {
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },
}
