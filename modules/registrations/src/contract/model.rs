use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contract::views;

/// One user's registration for one event.
///
/// `id` is always `{user_id}-{event_id}`, so a (user, event) pair maps to
/// exactly one record. Ids are not split back into their parts: a `-` inside
/// either id makes the composite ambiguous, so the stored `user_id`/`event_id`
/// are authoritative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub id: String,
    pub user_id: String,
    pub event_id: String,
    pub registration_date: DateTime<Utc>,
    pub checked_in: bool,
    pub checked_in_at: Option<DateTime<Utc>>,
}

impl Registration {
    /// Deterministic registration key for a (user, event) pair.
    pub fn id_for(user_id: &str, event_id: &str) -> String {
        format!("{user_id}-{event_id}")
    }

    /// A fresh, not-yet-checked-in registration.
    pub fn new(user_id: &str, event_id: &str, registered_at: DateTime<Utc>) -> Self {
        Self {
            id: Self::id_for(user_id, event_id),
            user_id: user_id.to_string(),
            event_id: event_id.to_string(),
            registration_date: registered_at,
            checked_in: false,
            checked_in_at: None,
        }
    }

    pub fn mark_checked_in(&mut self, at: DateTime<Utc>) {
        self.checked_in = true;
        self.checked_in_at = Some(at);
    }

    /// `checked_in` and `checked_in_at` agree.
    pub fn is_consistent(&self) -> bool {
        self.checked_in == self.checked_in_at.is_some()
    }
}

/// Viewer role as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Organizer,
    Student,
    /// Any role this store does not grant visibility to.
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Organizer => "organizer",
            Role::Student => "student",
            Role::Other(s) => s,
        }
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "organizer" => Role::Organizer,
            "student" => Role::Student,
            _ => Role::Other(s.trim().to_string()),
        })
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub role: Option<Role>,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Option<Role>) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn organizer(id: impl Into<String>) -> Self {
        Self::new(id, Some(Role::Organizer))
    }

    pub fn student(id: impl Into<String>) -> Self {
        Self::new(id, Some(Role::Student))
    }
}

/// Session identity: who is signed in, and whether the provider has decided yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    principal: Option<Principal>,
    resolved: bool,
}

impl Identity {
    /// Resolution still in flight.
    pub fn pending() -> Self {
        Self {
            principal: None,
            resolved: false,
        }
    }

    /// Resolved, nobody signed in.
    pub fn anonymous() -> Self {
        Self {
            principal: None,
            resolved: true,
        }
    }

    pub fn signed_in(principal: Principal) -> Self {
        Self {
            principal: Some(principal),
            resolved: true,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// The signed-in principal; `None` while pending or anonymous.
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref().filter(|_| self.resolved)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.principal().map(|p| p.id.as_str())
    }

    pub fn role(&self) -> Option<&Role> {
        self.principal().and_then(|p| p.role.as_ref())
    }

    pub fn is_organizer(&self) -> bool {
        matches!(self.role(), Some(Role::Organizer))
    }

    /// The triple that decides when the working set must be refetched.
    pub fn key(&self) -> IdentityKey {
        IdentityKey {
            user_id: self.user_id().map(str::to_string),
            role: self.role().cloned(),
            resolved: self.resolved,
        }
    }
}

impl Default for Identity {
    fn default() -> Self {
        Self::pending()
    }
}

/// `(id, role, resolved)` of an [`Identity`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub user_id: Option<String>,
    pub role: Option<Role>,
    pub resolved: bool,
}

/// How local state is brought back in line after a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resync {
    /// Refetch the whole visible set.
    FullRefresh,
    /// Apply the write to the working set in place.
    LocalPatch,
    /// Leave the working set alone.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Identity not resolved yet; nothing fetched.
    Pending,
    /// Viewer has no visible scope; working set emptied without a fetch.
    Cleared,
    /// Working set replaced with `count` records.
    Loaded { count: usize },
    /// Identity changed while the fetch was in flight; result dropped.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered { registration_id: String },
    /// Already in the working set; no write issued.
    AlreadyRegistered { registration_id: String },
}

impl RegisterOutcome {
    pub fn registration_id(&self) -> &str {
        match self {
            RegisterOutcome::Registered { registration_id }
            | RegisterOutcome::AlreadyRegistered { registration_id } => registration_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceOutcome {
    pub registration_id: String,
    pub checked_in_at: DateTime<Utc>,
    pub resync: Resync,
}

/// Head-count for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttendanceSummary {
    pub registered: usize,
    pub checked_in: usize,
}

/// State published to subscribers after every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationsSnapshot {
    /// Working set, ascending by id.
    pub registrations: Vec<Registration>,
    /// Identity the working set was last reconciled with.
    pub viewer: Identity,
    /// Fetches currently in flight.
    pub pending_fetches: usize,
}

impl RegistrationsSnapshot {
    pub fn loading(&self) -> bool {
        !self.viewer.is_resolved() || self.pending_fetches > 0
    }

    pub fn user_registrations(&self) -> Vec<Registration> {
        views::user_registrations(&self.registrations, &self.viewer)
    }

    pub fn all_registrations(&self) -> Vec<Registration> {
        views::all_registrations(&self.registrations, &self.viewer)
    }

    pub fn is_user_registered(&self, event_id: &str) -> bool {
        views::is_user_registered(&self.registrations, &self.viewer, event_id)
    }

    pub fn registrations_for_event(&self, event_id: &str) -> Vec<Registration> {
        views::registrations_for_event(&self.registrations, &self.viewer, event_id)
    }

    pub fn attendance_summary(&self, event_id: &str) -> AttendanceSummary {
        views::attendance_summary(&self.registrations, &self.viewer, event_id)
    }
}
