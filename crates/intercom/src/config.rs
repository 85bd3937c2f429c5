//! Configuration for the Intercom integration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{IntercomError, Result};

/// Default Intercom API endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.intercom.io";

/// Prefix marking a `user_list` value as a named member source reference.
const SOURCE_REF_PREFIX: &str = "%$";

/// Intercom integration configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IntercomConfig {
    /// Member source to sync, written as `%$SourceName`. Unset means the
    /// whole directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_list: Option<String>,
    /// User fields Intercom knows about. Anything else becomes a custom attribute.
    pub user_fields: Vec<String>,
    /// Company fields Intercom knows about.
    pub company_fields: Vec<String>,
    /// Base URL of the Intercom REST API.
    pub api_base_url: String,
    /// Named constants consulted after the environment when resolving secrets.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub constants: HashMap<String, String>,
}

impl Default for IntercomConfig {
    fn default() -> Self {
        Self {
            user_list: None,
            user_fields: to_strings(&[
                "user_id",
                "email",
                "id",
                "name",
                "phone",
                "created_at",
                "signed_up_at",
                "last_seen_ip",
                "last_seen_user_agent",
                "last_request_at",
                "unsubscribed_from_emails",
                "update_last_request_at",
                "new_session",
                "companies",
            ]),
            company_fields: to_strings(&[
                "company_id",
                "id",
                "name",
                "created_at",
                "remote_created_at",
                "plan",
                "monthly_spend",
                "size",
                "website",
                "industry",
            ]),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            constants: HashMap::new(),
        }
    }
}

impl IntercomConfig {
    /// Load configuration from a YAML file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            IntercomError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&raw)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Parsed `user_list` reference, if one is configured.
    pub fn user_list_ref(&self) -> Result<Option<UserListRef>> {
        self.user_list
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(UserListRef::parse)
            .transpose()
    }
}

/// A reference to a named member source, written `%$SourceName`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserListRef {
    name: String,
}

impl UserListRef {
    pub fn parse(raw: &str) -> Result<Self> {
        let name = raw
            .strip_prefix(SOURCE_REF_PREFIX)
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                IntercomError::config(format!(
                    "Please set user_list to a string of the form %$ServiceName (got {raw:?})"
                ))
            })?;
        Ok(Self {
            name: name.to_string(),
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}
