//! Command-line surface of the `nhub` binary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nhub_client::{HubClient, TemplateRegistration};
use nhub_types::{DeviceToken, Registration, DEFAULT_REGISTRATION_NAME};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "nhub")]
#[command(about = "Manage a device's notification hub registrations")]
pub struct Args {
    /// Namespace connection string
    #[arg(long, env = "NHUB_CONNECTION_STRING", hide_env_values = true)]
    pub connection_string: String,

    /// Hub path inside the namespace
    #[arg(long, env = "NHUB_HUB_PATH")]
    pub hub: String,

    /// Directory holding the registration cache
    #[arg(long, default_value = ".nhub")]
    pub cache_dir: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create or update the native registration
    Register {
        /// Device token, hex (spaces and angle brackets are ignored)
        #[arg(long)]
        device_token: String,

        /// Tag to subscribe to (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Create or update a template registration
    RegisterTemplate {
        #[arg(long)]
        device_token: String,

        /// Template name
        #[arg(long)]
        name: String,

        /// Notification body template
        #[arg(long)]
        body: String,

        /// Expiry expression
        #[arg(long)]
        expiry: Option<String>,

        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Delete a cached registration by name
    Unregister {
        /// Registration name (`$Default` for the native registration)
        #[arg(long)]
        name: String,
    },

    /// Delete every registration bound to a device token
    UnregisterAll {
        #[arg(long)]
        device_token: String,
    },

    /// Print the local registration cache
    ShowCache,
}

#[derive(Serialize)]
struct CacheView {
    device_token: Option<String>,
    registrations: Vec<Registration>,
}

/// Builds a client for `args` and binds it to the hub.
pub fn connect(args: &Args) -> Result<HubClient> {
    let client = HubClient::builder()
        .cache_dir(&args.cache_dir)
        .build()
        .context("Failed to create hub client")?;
    client
        .configure(&args.hub, &args.connection_string)
        .with_context(|| format!("Failed to configure hub {}", args.hub))?;
    Ok(client)
}

fn device_token(raw: &str) -> Result<DeviceToken> {
    DeviceToken::parse(raw).with_context(|| format!("Invalid device token {raw:?}"))
}

/// Runs `command` against a configured client and returns its JSON report.
pub async fn execute(client: &HubClient, command: &Command) -> Result<Value> {
    match command {
        Command::Register { device_token: raw, tags } => {
            let token = device_token(raw)?;
            let registration = client
                .register_native(&token, tags)
                .await
                .context("Native registration failed")?;
            Ok(serde_json::to_value(registration)?)
        }
        Command::RegisterTemplate {
            device_token: raw,
            name,
            body,
            expiry,
            tags,
        } => {
            let token = device_token(raw)?;
            let mut template = TemplateRegistration::new(name, body).with_tags(tags.iter().cloned());
            if let Some(expiry) = expiry {
                template = template.with_expiry(expiry);
            }
            let registration = client
                .register_template(&token, &template)
                .await
                .with_context(|| format!("Template registration {name} failed"))?;
            Ok(serde_json::to_value(registration)?)
        }
        Command::Unregister { name } => {
            let result = if name == DEFAULT_REGISTRATION_NAME {
                client.unregister_native().await
            } else {
                client.unregister_template(name).await
            };
            result.with_context(|| format!("Failed to unregister {name}"))?;
            Ok(json!({ "unregistered": name }))
        }
        Command::UnregisterAll { device_token: raw } => {
            let token = device_token(raw)?;
            client
                .unregister_all(&token)
                .await
                .context("Bulk unregistration failed")?;
            info!("Removed every registration for {}", token);
            Ok(json!({ "unregistered_all": token.as_str() }))
        }
        Command::ShowCache => {
            let view = CacheView {
                device_token: client.cached_device_token()?,
                registrations: client.cached_registrations()?,
            };
            Ok(serde_json::to_value(view)?)
        }
    }
}
