pub mod session;

pub use session::SessionIdentityProvider;
