use tokio::sync::watch;
use tracing::info;

use crate::contract::identity::IdentityProvider;
use crate::contract::model::{Identity, Principal};

/// In-process session identity. The host flips it on login/logout.
pub struct SessionIdentityProvider {
    tx: watch::Sender<Identity>,
}

impl SessionIdentityProvider {
    fn with(identity: Identity) -> Self {
        let (tx, _) = watch::channel(identity);
        Self { tx }
    }

    /// Resolution not finished yet.
    pub fn pending() -> Self {
        Self::with(Identity::pending())
    }

    pub fn anonymous() -> Self {
        Self::with(Identity::anonymous())
    }

    pub fn signed_in(principal: Principal) -> Self {
        Self::with(Identity::signed_in(principal))
    }

    pub fn sign_in(&self, principal: Principal) {
        info!(user_id = %principal.id, role = ?principal.role.as_ref().map(|r| r.as_str()), "Signed in");
        self.tx.send_replace(Identity::signed_in(principal));
    }

    pub fn sign_out(&self) {
        info!("Signed out");
        self.tx.send_replace(Identity::anonymous());
    }

    /// Finish a pending resolution.
    pub fn resolve(&self, principal: Option<Principal>) {
        match principal {
            Some(p) => self.sign_in(p),
            None => self.sign_out(),
        }
    }
}

impl IdentityProvider for SessionIdentityProvider {
    fn current(&self) -> Identity {
        self.tx.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Identity> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn transitions_are_observed() {
        let provider = SessionIdentityProvider::pending();
        let mut rx = provider.watch();
        assert!(!provider.current().is_resolved());

        provider.resolve(Some(Principal::student("u1")));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().user_id(), Some("u1"));

        provider.sign_out();
        rx.changed().await.unwrap();
        let now = rx.borrow_and_update().clone();
        assert!(now.is_resolved());
        assert!(now.principal().is_none());
    }
}
