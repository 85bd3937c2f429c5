//! Member records and the sources that supply them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::config::UserListRef;
use crate::error::{IntercomError, Result};
use crate::payload::SettingsMap;

/// A person in the host application's user directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Member {
    /// External id, sent to Intercom as `user_id`. Numeric ids are accepted.
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    /// When the member signed up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    /// Company the member belongs to, as a free-form map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<serde_json::Value>,
    /// Any other profile fields.
    #[serde(flatten)]
    pub fields: SettingsMap,
}

impl Member {
    /// Shorthand for a member known only by email.
    #[must_use]
    pub fn with_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }

    /// First name and surname joined, or `None` if both are blank.
    #[must_use]
    pub fn full_name(&self) -> Option<String> {
        let name = [self.first_name.as_deref(), self.surname.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        (!name.is_empty()).then_some(name)
    }
}

/// Directory ids come as strings or as plain numbers.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<RawId>::deserialize(deserializer)?.map(|id| match id {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    }))
}

/// Something that can list members to sync.
#[async_trait]
pub trait MemberSource: Send + Sync {
    /// All members this source provides, in the source's own order.
    async fn members(&self) -> Result<Vec<Member>>;
}

/// A fixed, in-memory list of members.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    members: Vec<Member>,
}

impl StaticSource {
    #[must_use]
    pub fn new(members: Vec<Member>) -> Self {
        Self { members }
    }
}

#[async_trait]
impl MemberSource for StaticSource {
    async fn members(&self) -> Result<Vec<Member>> {
        Ok(self.members.clone())
    }
}

/// Members read from a JSON array on disk. Re-read on every call.
#[derive(Debug, Clone)]
pub struct JsonDirectory {
    path: PathBuf,
}

impl JsonDirectory {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MemberSource for JsonDirectory {
    async fn members(&self) -> Result<Vec<Member>> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let members: Vec<Member> = serde_json::from_str(&raw)?;
        debug!(path = %self.path.display(), count = members.len(), "Loaded member directory");
        Ok(members)
    }
}

/// Builds a member source on demand.
pub type MemberSourceFactory = Box<dyn Fn() -> Arc<dyn MemberSource> + Send + Sync>;

/// Named member sources that `user_list` can refer to.
#[derive(Default)]
pub struct MemberSourceRegistry {
    factories: HashMap<String, MemberSourceFactory>,
}

impl MemberSourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn MemberSource> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build the source a `user_list` reference points at.
    pub fn resolve(&self, reference: &UserListRef) -> Result<Arc<dyn MemberSource>> {
        let factory = self.factories.get(reference.name()).ok_or_else(|| {
            IntercomError::config(format!(
                "Unknown user_list source '{}' (registered: {})",
                reference.name(),
                self.names().join(", ")
            ))
        })?;
        debug!(source = reference.name(), "Resolved user_list source");
        Ok(factory())
    }
}
