//! Per-member Intercom settings.
//!
//! These are the same settings the Intercom messenger widget is booted with,
//! which is why they carry `app_id` and `user_hash` alongside the profile.

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use crate::error::{IntercomError, Result};
use crate::member::Member;
use crate::payload::{SettingsMap, COMPANY};

type HmacSha256 = Hmac<Sha256>;

/// Maps a member to the identity and profile fields Intercom expects.
pub trait SettingsProvider: Send + Sync {
    fn settings(&self, member: &Member) -> Result<SettingsMap>;
}

/// Default settings provider.
#[derive(Clone, Default)]
pub struct ScriptTags {
    app_id: Option<String>,
    secret_key: Option<String>,
}

impl ScriptTags {
    #[must_use]
    pub fn new(app_id: Option<String>, secret_key: Option<String>) -> Self {
        Self { app_id, secret_key }
    }

    /// Identity verification hash for a member, keyed by the secret.
    ///
    /// Signs the user id when there is one, the email otherwise.
    pub fn user_hash(&self, member: &Member) -> Result<Option<String>> {
        let Some(secret) = self.secret_key.as_deref() else {
            return Ok(None);
        };
        let Some(identity) = member.id.as_deref().or(member.email.as_deref()) else {
            return Ok(None);
        };

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| IntercomError::config(format!("Invalid identity secret: {e}")))?;
        mac.update(identity.as_bytes());
        Ok(Some(hex::encode(mac.finalize().into_bytes())))
    }
}

impl SettingsProvider for ScriptTags {
    fn settings(&self, member: &Member) -> Result<SettingsMap> {
        let mut settings = SettingsMap::new();

        if let Some(app_id) = &self.app_id {
            settings.insert("app_id".to_string(), Value::from(app_id.as_str()));
        }
        if let Some(email) = member.email.as_deref().filter(|e| !e.is_empty()) {
            settings.insert("email".to_string(), Value::from(email));
        }
        if let Some(id) = member.id.as_deref().filter(|i| !i.is_empty()) {
            settings.insert("user_id".to_string(), Value::from(id));
        }
        if let Some(name) = member.full_name() {
            settings.insert("name".to_string(), Value::from(name));
        }
        if let Some(created) = member.created {
            settings.insert("created_at".to_string(), Value::from(created.timestamp()));
        }
        if let Some(hash) = self.user_hash(member)? {
            settings.insert("user_hash".to_string(), Value::from(hash));
        }
        if let Some(company) = &member.company {
            settings.insert(COMPANY.to_string(), company.clone());
        }

        // profile fields never shadow the identity fields above
        for (key, value) in &member.fields {
            settings
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        Ok(settings)
    }
}

impl std::fmt::Debug for ScriptTags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptTags")
            .field("app_id", &self.app_id)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "***"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn member() -> Member {
        let mut member = Member {
            id: Some("42".to_string()),
            email: Some("a@x.com".to_string()),
            first_name: Some("Ada".to_string()),
            surname: Some("Lovelace".to_string()),
            created: Some(chrono::Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()),
            company: Some(json!({"name": "Acme"})),
            ..Member::default()
        };
        member.fields.insert("plan".to_string(), json!("pro"));
        member.fields.insert("email".to_string(), json!("shadow@x.com"));
        member
    }

    #[test]
    fn test_settings_for_member() {
        let tags = ScriptTags::new(Some("app1".to_string()), None);
        let settings = tags.settings(&member()).unwrap();

        assert_eq!(
            Value::Object(settings),
            json!({
                "app_id": "app1",
                "email": "a@x.com",
                "user_id": "42",
                "name": "Ada Lovelace",
                "created_at": 1_704_164_645,
                "company": {"name": "Acme"},
                "plan": "pro"
            })
        );
    }

    #[test]
    fn test_anonymous_member_has_no_identity() {
        let settings = ScriptTags::default().settings(&Member::default()).unwrap();
        assert!(settings.is_empty());
    }

    #[test]
    fn test_user_hash_requires_secret() {
        let tags = ScriptTags::new(None, None);
        assert!(tags.user_hash(&member()).unwrap().is_none());
    }

    #[test]
    fn test_user_hash_is_hmac_of_user_id() {
        let tags = ScriptTags::new(None, Some("s3cret".to_string()));
        let hash = tags.user_hash(&member()).unwrap().unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        // same identity, same hash
        let by_id = Member {
            id: Some("42".to_string()),
            ..Member::default()
        };
        assert_eq!(tags.user_hash(&by_id).unwrap().unwrap(), hash);

        // falls back to email when there is no user id
        let by_email = Member::with_email("a@x.com");
        assert_ne!(tags.user_hash(&by_email).unwrap().unwrap(), hash);
    }

    #[test]
    fn test_user_hash_in_settings() {
        let tags = ScriptTags::new(None, Some("s3cret".to_string()));
        let settings = tags.settings(&member()).unwrap();
        assert!(settings.contains_key("user_hash"));
    }
}
