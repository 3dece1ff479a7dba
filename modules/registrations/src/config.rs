use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::policy::SyncPolicy;
use crate::domain::service::ServiceConfig;

/// Configuration for the registrations module
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistrationsConfig {
    /// Document collection holding registration records.
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(default = "default_serialize_mutations")]
    pub serialize_mutations: bool,
    #[serde(default)]
    pub sync_policy: SyncPolicy,
}

impl Default for RegistrationsConfig {
    fn default() -> Self {
        Self {
            collection: default_collection(),
            request_timeout: default_request_timeout(),
            serialize_mutations: default_serialize_mutations(),
            sync_policy: SyncPolicy::default(),
        }
    }
}

impl RegistrationsConfig {
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            request_timeout: self.request_timeout,
            serialize_mutations: self.serialize_mutations,
            sync_policy: self.sync_policy,
        }
    }
}

fn default_collection() -> String {
    "registrations".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_serialize_mutations() -> bool {
    true
}
