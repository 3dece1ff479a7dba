//! Derived views as pure functions of `(registrations, identity)`.

use crate::contract::model::{AttendanceSummary, Identity, Registration, Role};

/// What a viewer is allowed to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchScope {
    /// The whole collection.
    All,
    /// Records owned by this user.
    Owner(String),
    /// Nothing; no fetch is issued.
    Empty,
}

pub fn fetch_scope(identity: &Identity) -> FetchScope {
    match identity.principal() {
        Some(p) => match p.role {
            Some(Role::Organizer) => FetchScope::All,
            Some(Role::Student) => FetchScope::Owner(p.id.clone()),
            _ => FetchScope::Empty,
        },
        None => FetchScope::Empty,
    }
}

/// Whether `r` belongs in this viewer's working set.
pub fn is_visible(identity: &Identity, r: &Registration) -> bool {
    match fetch_scope(identity) {
        FetchScope::All => true,
        FetchScope::Owner(user_id) => r.user_id == user_id,
        FetchScope::Empty => false,
    }
}

pub fn user_registrations(regs: &[Registration], identity: &Identity) -> Vec<Registration> {
    let Some(user_id) = identity.user_id() else {
        return Vec::new();
    };
    regs.iter().filter(|r| r.user_id == user_id).cloned().collect()
}

pub fn all_registrations(regs: &[Registration], identity: &Identity) -> Vec<Registration> {
    if identity.is_organizer() {
        regs.to_vec()
    } else {
        Vec::new()
    }
}

pub fn is_user_registered(regs: &[Registration], identity: &Identity, event_id: &str) -> bool {
    let Some(user_id) = identity.user_id() else {
        return false;
    };
    regs.iter()
        .any(|r| r.user_id == user_id && r.event_id == event_id)
}

pub fn registrations_for_event(
    regs: &[Registration],
    identity: &Identity,
    event_id: &str,
) -> Vec<Registration> {
    if !identity.is_organizer() {
        return Vec::new();
    }
    regs.iter()
        .filter(|r| r.event_id == event_id)
        .cloned()
        .collect()
}

pub fn attendance_summary(
    regs: &[Registration],
    identity: &Identity,
    event_id: &str,
) -> AttendanceSummary {
    if !identity.is_organizer() {
        return AttendanceSummary::default();
    }
    regs.iter()
        .filter(|r| r.event_id == event_id)
        .fold(AttendanceSummary::default(), |mut acc, r| {
            acc.registered += 1;
            if r.checked_in {
                acc.checked_in += 1;
            }
            acc
        })
}
