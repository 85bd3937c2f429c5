//! Credential resolution.
//!
//! Secrets are looked up through an ordered list of [`SettingSource`]s. The
//! default order is the process environment first, then named constants
//! supplied by configuration. The first source with a non-empty value wins.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{IntercomError, Result};

/// Environment variable holding the Intercom personal access token.
pub const ENV_ACCESS_TOKEN: &str = "INTERCOM_PERSONAL_ACCESS_TOKEN";

/// Environment variable holding the Intercom application id.
pub const ENV_APP_ID: &str = "INTERCOM_APP_ID";

/// Environment variable holding the identity verification secret.
pub const ENV_SECRET_KEY: &str = "INTERCOM_SECRET_KEY";

/// A single place a named setting can come from.
pub trait SettingSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Look up `key`, returning `None` when this source does not define it.
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads settings from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSource;

impl SettingSource for EnvSource {
    fn name(&self) -> &'static str {
        "env"
    }

    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

/// Named constants defined up front, usually from the config file.
#[derive(Debug, Default, Clone)]
pub struct ConstantSource {
    values: HashMap<String, String>,
}

impl ConstantSource {
    #[must_use]
    pub fn new(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Define (or redefine) a constant.
    #[must_use]
    pub fn define(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl SettingSource for ConstantSource {
    fn name(&self) -> &'static str {
        "constants"
    }

    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).filter(|v| !v.is_empty()).cloned()
    }
}

/// Ordered list of setting sources.
pub struct SettingResolver {
    sources: Vec<Box<dyn SettingSource>>,
}

impl SettingResolver {
    /// Create a resolver with no sources. Every lookup is absent.
    #[must_use]
    pub fn empty() -> Self {
        Self { sources: vec![] }
    }

    /// Environment first, then the given constants.
    #[must_use]
    pub fn with_constants(constants: HashMap<String, String>) -> Self {
        Self::empty()
            .with_source(EnvSource)
            .with_source(ConstantSource::new(constants))
    }

    /// Append a source. Sources are consulted in insertion order.
    #[must_use]
    pub fn with_source(mut self, source: impl SettingSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Names of the configured sources, in lookup order.
    #[must_use]
    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Resolve a setting. Absence is not an error.
    #[must_use]
    pub fn get_setting(&self, key: &str) -> Option<String> {
        for source in &self.sources {
            if let Some(value) = source.get(key) {
                debug!(setting = key, source = source.name(), "Resolved setting");
                return Some(value);
            }
        }
        debug!(setting = key, "Setting not defined");
        None
    }
}

impl Default for SettingResolver {
    fn default() -> Self {
        Self::empty().with_source(EnvSource)
    }
}

/// Resolved Intercom credentials.
///
/// Values are resolved once and memoized. Reading a value that is still unset
/// is a configuration error; callers may fill the gap with the setters before
/// the client is first used.
#[derive(Clone, Default)]
pub struct Credentials {
    access_token: Option<String>,
    app_id: Option<String>,
    secret_key: Option<String>,
}

impl Credentials {
    /// Resolve all credentials through the given resolver.
    #[must_use]
    pub fn resolve(resolver: &SettingResolver) -> Self {
        Self {
            access_token: resolver.get_setting(ENV_ACCESS_TOKEN),
            app_id: resolver.get_setting(ENV_APP_ID),
            secret_key: resolver.get_setting(ENV_SECRET_KEY),
        }
    }

    pub fn access_token(&self) -> Result<&str> {
        self.access_token.as_deref().ok_or_else(|| {
            IntercomError::config(format!(
                "Intercom Personal Access Token not set! Define {ENV_ACCESS_TOKEN} or set it on the builder"
            ))
        })
    }

    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = Some(token.into());
    }

    pub fn app_id(&self) -> Result<&str> {
        self.app_id.as_deref().ok_or_else(|| {
            IntercomError::config(format!(
                "Intercom App ID not set! Define {ENV_APP_ID} or set it on the builder"
            ))
        })
    }

    pub fn set_app_id(&mut self, app_id: impl Into<String>) {
        self.app_id = Some(app_id.into());
    }

    /// Identity verification secret, if any. Optional by nature.
    #[must_use]
    pub fn secret_key(&self) -> Option<&str> {
        self.secret_key.as_deref()
    }

    pub fn set_secret_key(&mut self, secret: impl Into<String>) {
        self.secret_key = Some(secret.into());
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .field("app_id", &self.app_id)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "***"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn constants(pairs: &[(&str, &str)]) -> ConstantSource {
        pairs
            .iter()
            .fold(ConstantSource::default(), |c, (k, v)| c.define(*k, *v))
    }

    #[test]
    fn test_unknown_setting_is_absent() {
        let resolver = SettingResolver::empty().with_source(constants(&[("BAR", "1")]));
        assert_eq!(resolver.get_setting("FOO"), None);
    }

    #[test]
    fn test_first_source_wins() {
        let resolver = SettingResolver::empty()
            .with_source(constants(&[("FOO", "first")]))
            .with_source(constants(&[("FOO", "second"), ("BAR", "fallback")]));

        assert_eq!(resolver.get_setting("FOO").as_deref(), Some("first"));
        assert_eq!(resolver.get_setting("BAR").as_deref(), Some("fallback"));
    }

    #[test]
    fn test_empty_value_falls_through() {
        let resolver = SettingResolver::empty()
            .with_source(constants(&[("FOO", "")]))
            .with_source(constants(&[("FOO", "set")]));
        assert_eq!(resolver.get_setting("FOO").as_deref(), Some("set"));
    }

    #[test]
    #[serial]
    fn test_env_takes_precedence_over_constants() {
        std::env::set_var("INTERCOM_TEST_PRECEDENCE", "from-env");
        let resolver = SettingResolver::with_constants(HashMap::from([(
            "INTERCOM_TEST_PRECEDENCE".to_string(),
            "from-constant".to_string(),
        )]));
        assert_eq!(resolver.source_names(), vec!["env", "constants"]);
        assert_eq!(
            resolver.get_setting("INTERCOM_TEST_PRECEDENCE").as_deref(),
            Some("from-env")
        );

        std::env::remove_var("INTERCOM_TEST_PRECEDENCE");
        assert_eq!(
            resolver.get_setting("INTERCOM_TEST_PRECEDENCE").as_deref(),
            Some("from-constant")
        );
    }

    #[test]
    #[serial]
    fn test_unset_env_and_constant_is_absent() {
        std::env::remove_var("INTERCOM_TEST_UNDEFINED");
        let resolver = SettingResolver::with_constants(HashMap::new());
        assert_eq!(resolver.get_setting("INTERCOM_TEST_UNDEFINED"), None);
    }

    #[test]
    fn test_credentials_missing_are_config_errors() {
        let creds = Credentials::resolve(&SettingResolver::empty());

        let err = creds.access_token().unwrap_err();
        assert!(matches!(err, IntercomError::Config(_)));
        assert!(err.to_string().contains(ENV_ACCESS_TOKEN));

        let err = creds.app_id().unwrap_err();
        assert!(err.to_string().contains(ENV_APP_ID));
        assert!(creds.secret_key().is_none());
    }

    #[test]
    fn test_credentials_resolved_and_overridden() {
        let resolver = SettingResolver::empty().with_source(constants(&[
            (ENV_ACCESS_TOKEN, "tok"),
            (ENV_APP_ID, "app"),
        ]));
        let mut creds = Credentials::resolve(&resolver);
        assert_eq!(creds.access_token().unwrap(), "tok");
        assert_eq!(creds.app_id().unwrap(), "app");

        creds.set_access_token("other");
        assert_eq!(creds.access_token().unwrap(), "other");
    }

    #[test]
    fn test_credentials_debug_masks_secrets() {
        let mut creds = Credentials::default();
        creds.set_access_token("super-secret");
        creds.set_secret_key("hmac-secret");
        let out = format!("{creds:?}");
        assert!(!out.contains("super-secret"));
        assert!(!out.contains("hmac-secret"));
    }
}
