//! intercom-sync - push directory members and events to Intercom.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use intercom::{
    Intercom, IntercomBuilder, IntercomConfig, JsonDirectory, Member, SettingResolver, SettingsMap,
};

/// Sync members and events to Intercom.
#[derive(Parser)]
#[command(name = "intercom-sync")]
#[command(about = "Bulk load members and track events in Intercom")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// YAML config file (user_list, user_fields, company_fields, ...)
    #[arg(short, long, global = true, env = "INTERCOM_CONFIG")]
    config: Option<PathBuf>,

    /// Named member file for `user_list: '%$NAME'` (repeatable)
    #[arg(long = "source", global = true, value_name = "NAME=PATH", value_parser = parse_source)]
    sources: Vec<(String, PathBuf)>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bulk load every member into Intercom
    BulkLoad {
        /// JSON array of members used as the directory
        #[arg(long)]
        members: Option<PathBuf>,

        /// Print the payloads instead of submitting them
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the state of a bulk job
    JobStatus {
        /// Job id returned by bulk-load
        id: String,
    },

    /// Show the errors recorded for a bulk job
    JobErrors {
        /// Job id returned by bulk-load
        id: String,
    },

    /// Track an event for a member
    TrackEvent {
        /// Event name
        name: String,

        /// Member email
        #[arg(long)]
        email: Option<String>,

        /// Member user id
        #[arg(long)]
        user_id: Option<String>,

        /// Event metadata as key=value (repeatable)
        #[arg(long = "data", value_name = "KEY=VALUE")]
        data: Vec<String>,
    },

    /// Resolve a setting from the environment or config constants
    Setting {
        /// Setting name, e.g. INTERCOM_APP_ID
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("intercom=debug,info")
    } else {
        EnvFilter::new("intercom=info,warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = match &cli.config {
        Some(path) => IntercomConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => IntercomConfig::default(),
    };

    match cli.command {
        Commands::BulkLoad { members, dry_run } => {
            ensure_member_source(members.as_ref(), &config)?;

            let mut builder = intercom_builder(config, &cli.sources);
            if let Some(path) = members {
                builder = builder.directory(Arc::new(JsonDirectory::new(path)));
            }
            let intercom = builder.build()?;

            if dry_run {
                for member in intercom.user_list().await? {
                    let payload = intercom.user_payload(&member)?;
                    println!("{}", serde_json::to_string(&payload)?);
                }
                return Ok(());
            }

            let job = intercom.bulk_load_all().await?;
            info!(job_id = job.id(), "Bulk job submitted");
            println!("{}", job.id());
        }

        Commands::JobStatus { id } => {
            let intercom = intercom_builder(config, &cli.sources).build()?;
            let job = intercom.bulk_job(id).await?.status().await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }

        Commands::JobErrors { id } => {
            let intercom = intercom_builder(config, &cli.sources).build()?;
            let errors = intercom.bulk_job(id).await?.errors().await?;
            println!("{}", serde_json::to_string_pretty(&errors)?);
        }

        Commands::TrackEvent {
            name,
            email,
            user_id,
            data,
        } => {
            let intercom = intercom_builder(config, &cli.sources).build()?;
            let member = Member {
                id: user_id,
                email,
                ..Member::default()
            };
            intercom
                .track_event(&name, parse_data(&data)?, &member)
                .await?;
            info!(event = %name, "Event tracked");
        }

        Commands::Setting { name } => {
            let resolver = SettingResolver::with_constants(config.constants);
            match resolver.get_setting(&name) {
                Some(value) if is_secret(&name) => println!("{name}={}", mask(&value)),
                Some(value) => println!("{name}={value}"),
                None => bail!("{name} is not defined in the environment or config constants"),
            }
        }
    }

    Ok(())
}

/// Builder with every `--source` registered as a JSON member file.
fn intercom_builder(config: IntercomConfig, sources: &[(String, PathBuf)]) -> IntercomBuilder {
    sources
        .iter()
        .fold(Intercom::builder(config), |builder, (name, path)| {
            let path = path.clone();
            builder.register_source(name.clone(), move || {
                Arc::new(JsonDirectory::new(path.clone()))
            })
        })
}

/// Bulk loading needs either `--members` or a configured `user_list`.
fn ensure_member_source(members: Option<&PathBuf>, config: &IntercomConfig) -> Result<()> {
    if members.is_none() && config.user_list_ref()?.is_none() {
        bail!("Nothing to load: pass --members <json> or set user_list in the config");
    }
    Ok(())
}

fn parse_source(raw: &str) -> std::result::Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((name, path)) if !name.trim().is_empty() && !path.trim().is_empty() => {
            Ok((name.trim().to_string(), PathBuf::from(path.trim())))
        }
        _ => Err(format!("invalid source '{raw}', expected NAME=PATH")),
    }
}

/// Parse `key=value` pairs. Values that are valid JSON keep their type.
fn parse_data(pairs: &[String]) -> Result<SettingsMap> {
    let mut data = SettingsMap::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("Invalid --data '{pair}', expected KEY=VALUE");
        };
        let value = serde_json::from_str(raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
        data.insert(key.trim().to_string(), value);
    }
    Ok(data)
}

fn is_secret(name: &str) -> bool {
    name.contains("TOKEN") || name.contains("SECRET") || name.contains("KEY")
}

fn mask(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    format!("{visible}****")
}
