use tokio::sync::watch;

use crate::contract::model::Identity;

/// Port to the host's authentication layer.
///
/// The registration store never authenticates anyone itself; it reads the
/// current identity and follows changes through `watch`.
pub trait IdentityProvider: Send + Sync {
    /// Identity at this instant.
    fn current(&self) -> Identity;

    /// Receiver that observes every identity change.
    fn watch(&self) -> watch::Receiver<Identity>;
}
