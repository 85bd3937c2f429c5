//! Entry point for interaction with Intercom.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::bulk::BulkJob;
use crate::client::{IntercomApi, IntercomClient};
use crate::config::IntercomConfig;
use crate::error::{IntercomError, Result};
use crate::member::{Member, MemberSource, MemberSourceRegistry, StaticSource};
use crate::payload::{BulkItem, BulkRequest, EventPayload, PayloadBuilder, SettingsMap};
use crate::script_tags::{ScriptTags, SettingsProvider};
use crate::session::Session;
use crate::settings::{Credentials, SettingResolver};

/// Builds an API client from an access token.
pub type ClientFactory = Arc<dyn Fn(&str) -> Result<Arc<dyn IntercomApi>> + Send + Sync>;

/// Syncs members to Intercom and records events against them.
///
/// Each instance owns one lazily created API client, built on first use from
/// the resolved access token and reused afterwards.
pub struct Intercom {
    config: IntercomConfig,
    credentials: Credentials,
    payloads: PayloadBuilder,
    /// Custom provider; `None` means [`ScriptTags`] over the current credentials.
    settings_provider: Option<Arc<dyn SettingsProvider>>,
    user_source: Arc<dyn MemberSource>,
    client_factory: ClientFactory,
    client: OnceCell<Arc<dyn IntercomApi>>,
}

impl Intercom {
    /// Start building an instance from configuration.
    #[must_use]
    pub fn builder(config: IntercomConfig) -> IntercomBuilder {
        IntercomBuilder::new(config)
    }

    #[must_use]
    pub fn config(&self) -> &IntercomConfig {
        &self.config
    }

    pub fn access_token(&self) -> Result<&str> {
        self.credentials.access_token()
    }

    /// Override the access token. Has no effect once the client exists.
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        if self.client.initialized() {
            warn!("Access token changed after the Intercom client was created");
        }
        self.credentials.set_access_token(token);
    }

    pub fn app_id(&self) -> Result<&str> {
        self.credentials.app_id()
    }

    /// Override the app id. The default settings provider picks it up on the
    /// next call.
    pub fn set_app_id(&mut self, app_id: impl Into<String>) {
        self.credentials.set_app_id(app_id);
    }

    /// The API client, created on first call.
    ///
    /// Concurrent first callers wait on a single construction.
    pub async fn client(&self) -> Result<Arc<dyn IntercomApi>> {
        let client = self
            .client
            .get_or_try_init(|| async {
                let token = self.credentials.access_token()?;
                debug!("Creating Intercom client");
                (self.client_factory)(token)
            })
            .await?;
        Ok(Arc::clone(client))
    }

    /// Every member to sync: the configured `user_list` source, or the whole
    /// directory when none is configured.
    pub async fn user_list(&self) -> Result<Vec<Member>> {
        self.user_source.members().await
    }

    /// The raw widget settings for one member, `app_id` and `user_hash` included.
    pub fn member_settings(&self, member: &Member) -> Result<SettingsMap> {
        match &self.settings_provider {
            Some(provider) => provider.settings(member),
            None => ScriptTags::new(
                self.credentials.app_id().ok().map(str::to_string),
                self.credentials.secret_key().map(str::to_string),
            )
            .settings(member),
        }
    }

    /// The bulk payload for one member.
    pub fn user_payload(&self, member: &Member) -> Result<SettingsMap> {
        let settings = self.member_settings(member)?;
        self.payloads.build(settings)
    }

    /// Bulk load members using the same settings they'd get when logging in.
    ///
    /// All members go out in one bulk request; an empty slice still submits
    /// an (empty) job. Remote failures are returned untouched.
    pub async fn bulk_load_users(&self, members: &[Member]) -> Result<BulkJob> {
        let items = members
            .iter()
            .map(|m| self.user_payload(m).map(BulkItem::post_user))
            .collect::<Result<Vec<_>>>()?;
        let request = BulkRequest { items };

        let client = self.client().await?;
        info!(items = request.len(), "Submitting Intercom bulk user job");
        let job = client.bulk_users(&request).await?;
        info!(job_id = %job.id, "Intercom bulk job accepted");

        Ok(BulkJob::new(client, job.id))
    }

    /// Bulk load everything [`Self::user_list`] returns.
    pub async fn bulk_load_all(&self) -> Result<BulkJob> {
        let members = self.user_list().await?;
        self.bulk_load_users(&members).await
    }

    /// Handle for an existing bulk job.
    pub async fn bulk_job(&self, id: impl Into<String>) -> Result<BulkJob> {
        Ok(BulkJob::new(self.client().await?, id))
    }

    /// Track an event against `member`.
    ///
    /// `data` is sent as event metadata when non-empty. Fails with
    /// [`IntercomError::MissingIdentity`] before touching the network when
    /// the member has neither an email nor a user id.
    pub async fn track_event(
        &self,
        event_name: &str,
        data: SettingsMap,
        member: &Member,
    ) -> Result<()> {
        let settings = self.member_settings(member)?;
        let payload =
            EventPayload::for_identity(event_name, &settings, data, Utc::now().timestamp())?;

        debug!(event = event_name, "Tracking Intercom event");
        self.client().await?.create_event(&payload).await
    }

    /// Track an event against whoever is logged in to `session`.
    pub async fn track_session_event(
        &self,
        session: &dyn Session,
        event_name: &str,
        data: SettingsMap,
    ) -> Result<()> {
        let member = session
            .current_member()
            .ok_or(IntercomError::MissingIdentity)?;
        self.track_event(event_name, data, &member).await
    }
}

/// Builder for [`Intercom`].
pub struct IntercomBuilder {
    config: IntercomConfig,
    resolver: Option<SettingResolver>,
    access_token: Option<String>,
    app_id: Option<String>,
    settings_provider: Option<Arc<dyn SettingsProvider>>,
    directory: Option<Arc<dyn MemberSource>>,
    registry: MemberSourceRegistry,
    client_factory: Option<ClientFactory>,
}

impl IntercomBuilder {
    fn new(config: IntercomConfig) -> Self {
        Self {
            config,
            resolver: None,
            access_token: None,
            app_id: None,
            settings_provider: None,
            directory: None,
            registry: MemberSourceRegistry::new(),
            client_factory: None,
        }
    }

    /// Where secrets are looked up. Defaults to the environment, then the
    /// config's `constants`.
    #[must_use]
    pub fn resolver(mut self, resolver: SettingResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    #[must_use]
    pub fn settings_provider(mut self, provider: Arc<dyn SettingsProvider>) -> Self {
        self.settings_provider = Some(provider);
        self
    }

    /// The full member directory, used when `user_list` is unset.
    #[must_use]
    pub fn directory(mut self, directory: Arc<dyn MemberSource>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Make a member source available to `user_list` under `name`.
    #[must_use]
    pub fn register_source<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn MemberSource> + Send + Sync + 'static,
    {
        self.registry.register(name, factory);
        self
    }

    #[must_use]
    pub fn client_factory(mut self, factory: ClientFactory) -> Self {
        self.client_factory = Some(factory);
        self
    }

    /// Resolve credentials and the member source.
    ///
    /// A malformed or unknown `user_list` is a configuration error here,
    /// not at first use.
    pub fn build(self) -> Result<Intercom> {
        let resolver = self
            .resolver
            .unwrap_or_else(|| SettingResolver::with_constants(self.config.constants.clone()));

        let mut credentials = Credentials::resolve(&resolver);
        if let Some(token) = self.access_token {
            credentials.set_access_token(token);
        }
        if let Some(app_id) = self.app_id {
            credentials.set_app_id(app_id);
        }

        let user_source = match self.config.user_list_ref()? {
            Some(reference) => self.registry.resolve(&reference)?,
            None => self.directory.unwrap_or_else(|| {
                warn!("No member directory configured, user list will be empty");
                Arc::new(StaticSource::default())
            }),
        };

        let client_factory = self.client_factory.unwrap_or_else(|| {
            let base_url = self.config.api_base_url.clone();
            Arc::new(move |token: &str| {
                let client = IntercomClient::new(token)?.with_base_url(base_url.as_str());
                Ok(Arc::new(client) as Arc<dyn IntercomApi>)
            })
        });

        let payloads = PayloadBuilder::new(
            self.config.user_fields.clone(),
            self.config.company_fields.clone(),
        );

        Ok(Intercom {
            config: self.config,
            credentials,
            payloads,
            settings_provider: self.settings_provider,
            user_source,
            client_factory,
            client: OnceCell::new(),
        })
    }
}
