//! Payload construction for the Intercom bulk and events APIs.
//!
//! A member's raw settings map carries every field the settings provider
//! knows about. Intercom only accepts a fixed set of top-level keys, so the
//! [`PayloadBuilder`] moves anything it does not recognise into a nested
//! `custom_attributes` map, for the user and for its `company` sub-map.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{IntercomError, Result};

/// Free-form attribute map, keyed by field name.
pub type SettingsMap = Map<String, Value>;

/// Bucket for fields outside Intercom's known schema.
pub const CUSTOM_ATTRIBUTES: &str = "custom_attributes";

/// Nested company map inside a user's settings.
pub const COMPANY: &str = "company";

/// Keys only meaningful to the browser widget. Never part of a bulk upload.
pub const PROTOCOL_KEYS: [&str; 2] = ["app_id", "user_hash"];

const USER_STRUCTURAL_KEYS: &[&str] = &[CUSTOM_ATTRIBUTES, COMPANY];
const COMPANY_STRUCTURAL_KEYS: &[&str] = &[CUSTOM_ATTRIBUTES];

/// Splits raw settings into known fields and custom attributes.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    user_fields: Vec<String>,
    company_fields: Vec<String>,
}

impl PayloadBuilder {
    #[must_use]
    pub fn new(user_fields: Vec<String>, company_fields: Vec<String>) -> Self {
        Self {
            user_fields,
            company_fields,
        }
    }

    /// Turn a member's raw settings into a bulk-ready user payload.
    ///
    /// Protocol keys are dropped, unknown user keys are moved under
    /// `custom_attributes`, and the same happens to a nested `company` map
    /// against the company field list. A `company` value that is not a map
    /// is rejected; a `null` company is dropped.
    pub fn build(&self, mut settings: SettingsMap) -> Result<SettingsMap> {
        for key in PROTOCOL_KEYS {
            settings.remove(key);
        }

        classify(&mut settings, &self.user_fields, USER_STRUCTURAL_KEYS)?;

        match settings.remove(COMPANY) {
            None | Some(Value::Null) => {}
            Some(Value::Object(mut company)) => {
                classify(&mut company, &self.company_fields, COMPANY_STRUCTURAL_KEYS)?;
                settings.insert(COMPANY.to_string(), Value::Object(company));
            }
            Some(other) => {
                return Err(IntercomError::InvalidSettings(format!(
                    "company must be a map, got {}",
                    json_type(&other)
                )));
            }
        }

        Ok(settings)
    }
}

/// Move every top-level key outside `known` (and outside `structural`) into
/// the `custom_attributes` map, merging with one that is already there.
fn classify(settings: &mut SettingsMap, known: &[String], structural: &[&str]) -> Result<()> {
    let unknown: Vec<String> = settings
        .keys()
        .filter(|k| !structural.contains(&k.as_str()) && !known.iter().any(|f| f == *k))
        .cloned()
        .collect();

    if unknown.is_empty() {
        return Ok(());
    }

    let mut custom = match settings.remove(CUSTOM_ATTRIBUTES) {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(existing)) => existing,
        Some(other) => {
            return Err(IntercomError::InvalidSettings(format!(
                "custom_attributes must be a map, got {}",
                json_type(&other)
            )));
        }
    };

    for key in unknown {
        if let Some(value) = settings.remove(&key) {
            custom.insert(key, value);
        }
    }

    settings.insert(CUSTOM_ATTRIBUTES.to_string(), Value::Object(custom));
    Ok(())
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "map",
    }
}

// =============================================================================
// Wire payloads
// =============================================================================

/// One operation in a bulk user job.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BulkItem {
    pub data_type: &'static str,
    pub method: &'static str,
    pub data: SettingsMap,
}

impl BulkItem {
    /// Create-or-update a user.
    #[must_use]
    pub fn post_user(data: SettingsMap) -> Self {
        Self {
            data_type: "user",
            method: "post",
            data,
        }
    }
}

/// Body of a `POST /bulk/users` request.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct BulkRequest {
    pub items: Vec<BulkItem>,
}

impl BulkRequest {
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Body of a `POST /events` request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EventPayload {
    pub event_name: String,
    /// Unix timestamp, seconds.
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SettingsMap>,
}

impl EventPayload {
    /// Build an event for the identity found in `settings`.
    ///
    /// Fails with [`IntercomError::MissingIdentity`] when the settings carry
    /// neither an email nor a user id.
    pub fn for_identity(
        event_name: impl Into<String>,
        settings: &SettingsMap,
        metadata: SettingsMap,
        created_at: i64,
    ) -> Result<Self> {
        let email = identity_value(settings.get("email"));
        let user_id = identity_value(settings.get("user_id"));

        if email.is_none() && user_id.is_none() {
            return Err(IntercomError::MissingIdentity);
        }

        Ok(Self {
            event_name: event_name.into(),
            created_at,
            email,
            user_id,
            metadata: (!metadata.is_empty()).then_some(metadata),
        })
    }
}

/// Identity fields are sent as strings; empty values count as absent.
fn identity_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn builder(user: &[&str], company: &[&str]) -> PayloadBuilder {
        PayloadBuilder::new(
            user.iter().map(|s| (*s).to_string()).collect(),
            company.iter().map(|s| (*s).to_string()).collect(),
        )
    }

    fn map(value: Value) -> SettingsMap {
        match value {
            Value::Object(m) => m,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_user_and_company_reclassified() {
        let input = map(json!({
            "email": "a@x.com",
            "plan": "pro",
            "company": {"name": "Acme", "tier": "gold"}
        }));

        let out = builder(&["email"], &["name"]).build(input).unwrap();

        assert_eq!(
            Value::Object(out),
            json!({
                "email": "a@x.com",
                "custom_attributes": {"plan": "pro"},
                "company": {"name": "Acme", "custom_attributes": {"tier": "gold"}}
            })
        );
    }

    #[test]
    fn test_protocol_keys_always_stripped() {
        let input = map(json!({
            "app_id": "abc",
            "user_hash": "deadbeef",
            "email": "a@x.com"
        }));

        // even when the field list claims to know them
        let out = builder(&["email", "app_id", "user_hash"], &[])
            .build(input)
            .unwrap();

        assert!(!out.contains_key("app_id"));
        assert!(!out.contains_key("user_hash"));
        assert!(!out.contains_key(CUSTOM_ATTRIBUTES));
    }

    #[test]
    fn test_only_known_keys_stay_top_level() {
        let known = ["email", "name"];
        let input = map(json!({
            "email": "b@x.com",
            "name": "Bea",
            "age": 41,
            "tags": ["a", "b"],
            "nested": {"x": 1}
        }));

        let out = builder(&known, &[]).build(input.clone()).unwrap();

        for key in out.keys().filter(|k| *k != CUSTOM_ATTRIBUTES) {
            assert!(known.contains(&key.as_str()), "unexpected top-level {key}");
        }
        let custom = out[CUSTOM_ATTRIBUTES].as_object().unwrap();
        for key in ["age", "tags", "nested"] {
            assert_eq!(custom[key], input[key]);
        }
    }

    #[test]
    fn test_build_is_idempotent() {
        let b = builder(&["email"], &["name"]);
        let input = map(json!({
            "email": "a@x.com",
            "plan": "pro",
            "company": {"name": "Acme", "tier": "gold"}
        }));

        let once = b.build(input).unwrap();
        let twice = b.build(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_existing_custom_attributes_are_merged() {
        let input = map(json!({
            "email": "a@x.com",
            "custom_attributes": {"seats": 3},
            "plan": "pro"
        }));

        let out = builder(&["email"], &[]).build(input).unwrap();
        assert_eq!(out[CUSTOM_ATTRIBUTES], json!({"seats": 3, "plan": "pro"}));
    }

    #[test]
    fn test_no_custom_attributes_when_everything_known() {
        let input = map(json!({"email": "a@x.com"}));
        let out = builder(&["email"], &[]).build(input).unwrap();
        assert_eq!(Value::Object(out), json!({"email": "a@x.com"}));
    }

    #[test]
    fn test_company_must_be_a_map() {
        let input = map(json!({"email": "a@x.com", "company": "Acme"}));
        let err = builder(&["email"], &["name"]).build(input).unwrap_err();
        assert!(matches!(err, IntercomError::InvalidSettings(_)));
        assert!(err.to_string().contains("string"));
    }

    #[test]
    fn test_null_company_dropped() {
        let input = map(json!({"email": "a@x.com", "company": null}));
        let out = builder(&["email"], &[]).build(input).unwrap();
        assert!(!out.contains_key(COMPANY));
    }

    #[test]
    fn test_scalar_custom_attributes_rejected() {
        let input = map(json!({"custom_attributes": 5, "plan": "pro"}));
        let err = builder(&[], &[]).build(input).unwrap_err();
        assert!(matches!(err, IntercomError::InvalidSettings(_)));
    }

    #[test]
    fn test_bulk_item_shape() {
        let item = BulkItem::post_user(map(json!({"email": "a@x.com"})));
        assert_eq!(
            serde_json::to_value(BulkRequest { items: vec![item] }).unwrap(),
            json!({"items": [{"data_type": "user", "method": "post", "data": {"email": "a@x.com"}}]})
        );
    }

    #[test]
    fn test_event_requires_identity() {
        let settings = map(json!({"name": "Anon", "email": "", "user_id": null}));
        let err = EventPayload::for_identity("signed-up", &settings, Map::new(), 0).unwrap_err();
        assert!(matches!(err, IntercomError::MissingIdentity));
    }

    #[test]
    fn test_event_payload_fields() {
        let settings = map(json!({"email": "a@x.com", "user_id": 42}));
        let event = EventPayload::for_identity(
            "invited-teammate",
            &settings,
            map(json!({"invitee": "b@x.com"})),
            1_700_000_000,
        )
        .unwrap();

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "event_name": "invited-teammate",
                "created_at": 1_700_000_000,
                "email": "a@x.com",
                "user_id": "42",
                "metadata": {"invitee": "b@x.com"}
            })
        );
    }

    #[test]
    fn test_event_payload_omits_empty_metadata() {
        let settings = map(json!({"user_id": "u-1"}));
        let event = EventPayload::for_identity("login", &settings, Map::new(), 1).unwrap();
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("metadata").is_none());
        assert!(value.get("email").is_none());
    }
}
