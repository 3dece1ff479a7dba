//! Registration <-> stored document.
//!
//! Documents use camelCase keys and RFC 3339 timestamps:
//! `{"id","userId","eventId","registrationDate","checkedIn","checkedInAt"?}`.

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use modkit_docstore::Document;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::contract::model::Registration;

pub const USER_ID_FIELD: &str = "userId";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistrationDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    user_id: String,
    event_id: String,
    registration_date: DateTime<Utc>,
    #[serde(default)]
    checked_in: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    checked_in_at: Option<DateTime<Utc>>,
}

/// Decode a stored document. The document key is the registration id.
pub fn document_to_registration(doc: Document) -> anyhow::Result<Registration> {
    let body: RegistrationDoc = serde_json::from_value(doc.body)
        .with_context(|| format!("malformed registration document '{}'", doc.key))?;

    if let Some(id) = &body.id {
        if id != &doc.key {
            bail!("document '{}' carries mismatching id '{id}'", doc.key);
        }
    }

    let registration = Registration {
        id: doc.key,
        user_id: body.user_id,
        event_id: body.event_id,
        registration_date: body.registration_date,
        checked_in: body.checked_in,
        checked_in_at: body.checked_in_at,
    };
    if !registration.is_consistent() {
        bail!(
            "document '{}' has checkedIn={} but checkedInAt is {}",
            registration.id,
            registration.checked_in,
            if registration.checked_in_at.is_some() { "set" } else { "absent" }
        );
    }
    Ok(registration)
}

pub fn registration_to_body(r: &Registration) -> anyhow::Result<Value> {
    let doc = RegistrationDoc {
        id: Some(r.id.clone()),
        user_id: r.user_id.clone(),
        event_id: r.event_id.clone(),
        registration_date: r.registration_date,
        checked_in: r.checked_in,
        checked_in_at: r.checked_in_at,
    };
    serde_json::to_value(doc).context("failed to encode registration")
}

/// Fields merged into a document on check-in.
pub fn checked_in_fields(at: DateTime<Utc>) -> Map<String, Value> {
    let mut fields = Map::new();
    fields.insert("checkedIn".to_string(), Value::Bool(true));
    fields.insert("checkedInAt".to_string(), Value::String(at.to_rfc3339()));
    fields
}
