//! # ModKit - minimal module system
//!
//! Modules are registered explicitly with a [`ModuleRegistry`] and driven through
//! ordered phases by [`run`]:
//!
//! - **init**: wiring; modules read their config and publish clients to the [`ClientHub`]
//! - **start**: background tasks of [`StatefulModule`]s are spawned
//! - **stop**: reverse order, after the shutdown strategy fires
//!
//! ## Example
//!
//! ```rust,ignore
//! let registry = ModuleRegistry::builder()
//!     .stateful("registrations", module.clone(), module)
//!     .build()?;
//! ```

pub use anyhow::Result;
pub use async_trait::async_trait;

pub mod client_hub;
pub mod context;
pub mod contracts;
pub mod registry;
pub mod runtime;

pub use client_hub::{ClientHub, ClientHubError};
pub use context::{ConfigProvider, ModuleCtx, ModuleCtxBuilder};
pub use contracts::{Module, StatefulModule};
pub use registry::{ModuleRegistry, RegistryError};
pub use runtime::{run, run_phases, RunOptions, ShutdownOptions};
