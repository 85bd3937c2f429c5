//! Intercom integration for a member directory.
//!
//! This crate bulk-synchronizes directory members (and their companies) to
//! Intercom and records behavioural events against individual members.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use intercom::{Intercom, IntercomConfig, JsonDirectory, Member};
//!
//! # async fn run() -> intercom::Result<()> {
//! let intercom = Intercom::builder(IntercomConfig::default())
//!     .directory(Arc::new(JsonDirectory::new("members.json")))
//!     .build()?;
//!
//! // Push every member in one bulk job
//! let job = intercom.bulk_load_all().await?;
//! println!("queued {}", job.id());
//!
//! // Record an event for a specific member
//! let member = Member::with_email("ada@example.com");
//! intercom
//!     .track_event("invited-teammate", serde_json::Map::new(), &member)
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! Secrets are resolved from the environment first, then from the
//! `constants` section of the config file:
//!
//! - `INTERCOM_PERSONAL_ACCESS_TOKEN`: API access token (required to talk to Intercom)
//! - `INTERCOM_APP_ID`: Intercom application id
//! - `INTERCOM_SECRET_KEY`: identity verification secret (optional)
//!
//! Field handling is driven by [`IntercomConfig`]: `user_fields` and
//! `company_fields` list the keys Intercom knows; everything else is sent
//! under `custom_attributes`.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod bulk;
pub mod client;
pub mod config;
pub mod error;
pub mod intercom;
pub mod member;
pub mod payload;
pub mod script_tags;
pub mod session;
pub mod settings;

pub use bulk::{BulkJob, Job};
pub use client::{IntercomApi, IntercomClient};
pub use config::{IntercomConfig, UserListRef};
pub use error::{IntercomError, Result};
pub use intercom::{ClientFactory, Intercom, IntercomBuilder};
pub use member::{JsonDirectory, Member, MemberSource, MemberSourceRegistry, StaticSource};
pub use payload::{BulkItem, BulkRequest, EventPayload, PayloadBuilder, SettingsMap};
pub use script_tags::{ScriptTags, SettingsProvider};
pub use session::{FixedSession, Session};
pub use settings::{ConstantSource, Credentials, EnvSource, SettingResolver, SettingSource};
