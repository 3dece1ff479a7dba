//! Type-safe ClientHub.
//!
//! - Providers register an implementation once during `init`.
//! - Consumers fetch by *interface type* (trait object): `get::<dyn my::Api>()`.
//! - A missing entry means the consumer runs outside the provider's scope
//!   (not wired, or wired after the consumer asked).
//!
//! Key = `type_name::<T>()`, which works for `T = dyn Trait`.
//! Value = `Arc<T>` stored as `Box<dyn Any + Send + Sync>` (downcast on read).

use parking_lot::RwLock;
use std::{any::Any, collections::HashMap, sync::Arc};

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum ClientHubError {
    #[error("client not registered: {type_name}")]
    NotFound { type_name: &'static str },

    #[error("type mismatch in hub for {type_name}")]
    TypeMismatch { type_name: &'static str },
}

type Boxed = Box<dyn Any + Send + Sync>;

/// Registry of clients keyed by interface type.
#[derive(Default)]
pub struct ClientHub {
    map: RwLock<HashMap<&'static str, Boxed>>,
}

impl ClientHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client under the interface type `T`.
    /// Re-registering replaces the previous client; Arcs already handed out stay valid.
    pub fn register<T>(&self, client: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let key = std::any::type_name::<T>();
        tracing::debug!(client = key, "client registered");
        self.map.write().insert(key, Box::new(client));
    }

    /// Fetch a client by interface type `T`.
    pub fn get<T>(&self) -> Result<Arc<T>, ClientHubError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let type_name = std::any::type_name::<T>();
        let r = self.map.read();
        let boxed = r
            .get(type_name)
            .ok_or(ClientHubError::NotFound { type_name })?;

        boxed
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or(ClientHubError::TypeMismatch { type_name })
    }

    /// Remove a client; returns it if it was present.
    pub fn remove<T>(&self) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let boxed = self.map.write().remove(std::any::type_name::<T>())?;
        boxed.downcast::<Arc<T>>().ok().map(|b| *b)
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}
