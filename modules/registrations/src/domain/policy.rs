//! Resynchronization decision table.
//!
//! After a confirmed write the store either refetches, patches its working set
//! in place, or does nothing. The choice depends on the mutation and on the
//! *viewer's* role, never on who owns the record.

use serde::{Deserialize, Serialize};

use crate::contract::model::{Resync, Role};

/// Mutations the store performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Register,
    MarkAttendance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncPolicy {
    pub after_register: Resync,
    /// Organizers check in records they do not own; their view is the full set.
    pub after_attendance_by_organizer: Resync,
    pub after_attendance_by_other: Resync,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            after_register: Resync::FullRefresh,
            after_attendance_by_organizer: Resync::FullRefresh,
            after_attendance_by_other: Resync::LocalPatch,
        }
    }
}

impl SyncPolicy {
    pub fn decide(&self, mutation: Mutation, viewer_role: Option<&Role>) -> Resync {
        match (mutation, viewer_role) {
            (Mutation::Register, _) => self.after_register,
            (Mutation::MarkAttendance, Some(Role::Organizer)) => {
                self.after_attendance_by_organizer
            }
            (Mutation::MarkAttendance, _) => self.after_attendance_by_other,
        }
    }
}
