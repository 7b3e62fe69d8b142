//! Registrations as reported by the hub.

use crate::name::DEFAULT_REGISTRATION_NAME;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A device registration on the hub.
///
/// `name` is the local key: [`DEFAULT_REGISTRATION_NAME`] for the native
/// registration, the template name otherwise. `id` stays empty until the hub
/// has confirmed the registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: String,
    pub name: String,
    pub device_token: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_template: Option<String>,
}

impl Registration {
    /// Creates an unconfirmed registration with no tags.
    pub fn new(name: impl Into<String>, device_token: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            device_token: device_token.into(),
            tags: BTreeSet::new(),
            etag: None,
            expires_at: None,
            body_template: None,
        }
    }

    /// Sets the server-assigned id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Adds tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Whether the hub has ever confirmed this registration.
    pub fn is_confirmed(&self) -> bool {
        !self.id.is_empty()
    }

    /// Whether this is a template registration.
    pub fn is_template(&self) -> bool {
        self.name != DEFAULT_REGISTRATION_NAME
    }
}
