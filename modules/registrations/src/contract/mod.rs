pub mod client;
pub mod error;
pub mod identity;
pub mod model;
pub mod views;

pub use client::RegistrationsApi;
pub use error::RegistrationsError;
pub use identity::IdentityProvider;
pub use model::{
    AttendanceOutcome, AttendanceSummary, Identity, IdentityKey, Principal, RefreshOutcome,
    RegisterOutcome, Registration, RegistrationsSnapshot, Resync, Role,
};
