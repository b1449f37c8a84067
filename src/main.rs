//! AESR Config Sync CLI
//!
//! Command-line interface for managing S3 config profiles and pushing the
//! fetched config to the AWS Extend Switch Roles extension.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use aesr_config_sync::config::StoreConfig;
use aesr_config_sync::logger;
use aesr_config_sync::remote::{
    OutboxSink, RuntimeRequest, S3ObjectFetcher, handle_runtime_request, pull_config, push_config,
};
use aesr_config_sync::session::SessionState;
use aesr_config_sync::storage::{AwsCredentials, GlobalSettings, Profile, ProfileStore};
use aesr_config_sync::utils::parsing::format_last_sent;

// =============================================================================
// CLI Arguments
// =============================================================================

/// AESR Config Sync Tool
#[derive(Parser, Debug)]
#[command(name = "aesr-config-cli")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the profile stores (default: $AESR_SYNC_DIR or the OS config dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List stored profiles
    List,

    /// Show one profile (secrets masked)
    Show {
        /// Profile name
        name: String,
    },

    /// Create or overwrite a profile
    Save {
        /// Profile name
        name: String,

        #[command(flatten)]
        fields: ProfileFields,
    },

    /// Delete a profile
    Delete {
        /// Profile name
        name: String,
    },

    /// Set the default profile
    SetDefault {
        /// Profile name
        name: String,
    },

    /// Print the default profile name
    Default,

    /// Import a profile from an exported JSON file
    Import {
        /// Path to the `<name>.json` file
        path: PathBuf,
    },

    /// Export a profile to `<name>.json`
    Export {
        /// Profile name
        name: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// Migrate profiles saved by older versions
    Migrate,

    /// Download the config file of a profile from S3
    Pull {
        /// Profile name (default profile when omitted)
        name: Option<String>,

        /// Write the config to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// S3-compatible endpoint URL
        #[arg(long)]
        endpoint_url: Option<String>,
    },

    /// Send a config file to the AESR extension
    Send {
        /// Path to the config text
        path: PathBuf,
    },

    /// Set the id of the AESR extension receiving configs
    SetAesrId {
        /// Extension id
        id: String,
    },

    /// Show when a config was last sent
    LastSent,

    /// Answer a runtime message read as JSON from stdin
    HandleMessage {
        /// S3-compatible endpoint URL
        #[arg(long)]
        endpoint_url: Option<String>,
    },
}

#[derive(clap::Args, Debug, Default)]
struct ProfileFields {
    /// AWS region of the bucket
    #[arg(long)]
    region: Option<String>,

    /// S3 bucket name
    #[arg(long)]
    bucket: Option<String>,

    /// S3 object key of the config file
    #[arg(long)]
    key: Option<String>,

    #[arg(long)]
    access_key_id: Option<String>,

    #[arg(long)]
    secret_access_key: Option<String>,

    #[arg(long)]
    session_token: Option<String>,

    #[arg(long)]
    cognito_username: Option<String>,

    #[arg(long)]
    cognito_password: Option<String>,

    #[arg(long)]
    cognito_user_pool_id: Option<String>,

    #[arg(long)]
    cognito_client_app_id: Option<String>,

    #[arg(long)]
    cognito_identity_pool_id: Option<String>,

    #[arg(long)]
    cognito_region: Option<String>,
}

impl ProfileFields {
    fn into_profile(self) -> Profile {
        Profile {
            access_key_id: self.access_key_id,
            secret_access_key: self.secret_access_key,
            session_token: self.session_token,
            region: self.region,
            bucket: self.bucket,
            key: self.key,
            cognito_username: self.cognito_username,
            cognito_password: self.cognito_password,
            cognito_user_pool_id: self.cognito_user_pool_id,
            cognito_client_app_id: self.cognito_client_app_id,
            cognito_identity_pool_id: self.cognito_identity_pool_id,
            cognito_region: self.cognito_region,
            ..Default::default()
        }
        .normalized_for_save()
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    logger::build_logger(args.verbose).init();

    let config = match args.data_dir {
        Some(dir) => StoreConfig::new(dir),
        None => StoreConfig::from_env().context("Failed to resolve data directory")?,
    };
    log::debug!("Using data directory {}", config.data_dir().display());

    let store = ProfileStore::open(&config);
    let session = SessionState::new();

    if !matches!(args.command, Command::Migrate) {
        let report = store
            .migrate_legacy_profiles()
            .await
            .context("Failed to migrate legacy profiles")?;
        if report.migrated {
            println!("🔄 Migrated {} legacy profile(s)", report.profile_count);
        }
    }

    match args.command {
        Command::List => cmd_list(&store, &session).await,
        Command::Show { name } => cmd_show(&store, &session, &name).await,
        Command::Save { name, fields } => cmd_save(&store, &name, fields).await,
        Command::Delete { name } => cmd_delete(&store, &name).await,
        Command::SetDefault { name } => cmd_set_default(&store, &name).await,
        Command::Default => cmd_default(&store).await,
        Command::Import { path } => cmd_import(&store, &path).await,
        Command::Export { name, dir } => cmd_export(&store, &name, &dir).await,
        Command::Migrate => cmd_migrate(&store).await,
        Command::Pull {
            name,
            output,
            endpoint_url,
        } => cmd_pull(&store, &session, name, output, endpoint_url).await,
        Command::Send { path } => cmd_send(&store, &config, &path).await,
        Command::SetAesrId { id } => cmd_set_aesr_id(&store, &id).await,
        Command::LastSent => cmd_last_sent(&store).await,
        Command::HandleMessage { endpoint_url } => cmd_handle_message(endpoint_url).await,
    }
}

// =============================================================================
// Command Implementations
// =============================================================================

async fn cmd_list(store: &ProfileStore, session: &SessionState) -> Result<()> {
    let listing = store
        .activate_default(session)
        .await
        .context("Failed to list profiles")?;

    if listing.is_empty() {
        println!("❌ No profiles saved.");
        return Ok(());
    }

    println!("📋 {} profile(s):\n", listing.profiles.len());
    for entry in listing.entries() {
        let marker = if entry.is_default { "👉" } else { "  " };
        let profile = &listing.profiles[&entry.name];
        println!(
            "{} {:<30} s3://{}/{}",
            marker,
            entry.label,
            profile.bucket.as_deref().unwrap_or("?"),
            profile.key.as_deref().unwrap_or("?")
        );
    }

    if let Some(name) = &listing.default_profile_name {
        if listing.resolved_default().is_none() {
            println!("\n⚠️  Default profile '{}' does not exist", name);
        }
    }

    Ok(())
}

async fn cmd_show(store: &ProfileStore, session: &SessionState, name: &str) -> Result<()> {
    let Some(profile) = store
        .load(name, session)
        .await
        .context("Failed to load profile")?
    else {
        bail!("Profile '{}' not found", name);
    };

    let shown = serde_json::to_string_pretty(&masked(profile))?;
    println!("{}", shown);
    Ok(())
}

async fn cmd_save(store: &ProfileStore, name: &str, fields: ProfileFields) -> Result<()> {
    let name = name.trim();
    store
        .save(name, &fields.into_profile())
        .await
        .context("Failed to save profile")?;
    println!("✅ Profile '{}' saved", name);
    Ok(())
}

async fn cmd_delete(store: &ProfileStore, name: &str) -> Result<()> {
    store
        .delete(name)
        .await
        .context("Failed to delete profile")?;
    println!("🗑️  Profile '{}' deleted", name);
    Ok(())
}

async fn cmd_set_default(store: &ProfileStore, name: &str) -> Result<()> {
    let name = store.set_default(name.trim()).await?;
    if store.get(&name).await?.is_none() {
        eprintln!("⚠️  Warning: no profile named '{}' is stored yet", name);
    }
    println!("✅ Default profile set to: {}", name);
    Ok(())
}

async fn cmd_default(store: &ProfileStore) -> Result<()> {
    match store.get_default().await? {
        Some(name) => println!("{}", name),
        None => println!("❌ No default profile set."),
    }
    Ok(())
}

async fn cmd_import(store: &ProfileStore, path: &Path) -> Result<()> {
    let name = store
        .import_from_file(path)
        .await
        .with_context(|| format!("Failed to import {}", path.display()))?;
    println!("✅ Imported profile '{}'", name);
    Ok(())
}

async fn cmd_export(store: &ProfileStore, name: &str, dir: &Path) -> Result<()> {
    let Some(export) = store.export_profile(name).await? else {
        bail!("Profile '{}' not found", name);
    };

    let path = dir.join(&export.filename);
    tokio::fs::write(&path, &export.data)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("✅ Exported '{}' to {}", name, path.display());
    Ok(())
}

async fn cmd_migrate(store: &ProfileStore) -> Result<()> {
    let report = store
        .migrate_legacy_profiles()
        .await
        .context("Migration failed; it is safe to run it again")?;

    if report.migrated {
        println!("✅ Migrated {} legacy profile(s)", report.profile_count);
        if let Some(GlobalSettings {
            aesr_id: Some(id), ..
        }) = store.global_settings().await?
        {
            println!("   AESR extension id: {}", id);
        }
    } else {
        println!("✅ No migration needed.");
    }
    Ok(())
}

async fn cmd_pull(
    store: &ProfileStore,
    session: &SessionState,
    name: Option<String>,
    output: Option<PathBuf>,
    endpoint_url: Option<String>,
) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => store
            .get_default()
            .await?
            .context("No profile given and no default profile set")?,
    };

    let Some(profile) = store.load(&name, session).await? else {
        bail!("Profile '{}' not found", name);
    };

    let fetcher = match endpoint_url {
        Some(url) => S3ObjectFetcher::with_endpoint(url),
        None => S3ObjectFetcher::new(),
    };
    let content = pull_config(&fetcher, &profile).await?;

    match output {
        Some(path) => {
            tokio::fs::write(&path, &content)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("✅ Config downloaded to {}", path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}

async fn cmd_send(store: &ProfileStore, config: &StoreConfig, path: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let sink = OutboxSink::new(config.outbox_path());
    let sent_at = push_config(store, &sink, &content).await?;
    println!("✅ Config sent");
    println!("{}", format_last_sent(Some(sent_at)));
    Ok(())
}

async fn cmd_set_aesr_id(store: &ProfileStore, id: &str) -> Result<()> {
    let id = id.trim();
    if id.is_empty() {
        bail!("Extension id must not be empty");
    }
    store
        .save_global_settings(&GlobalSettings::with_aesr_id(id))
        .await?;
    println!("✅ AESR extension id set to {}", id);
    Ok(())
}

async fn cmd_last_sent(store: &ProfileStore) -> Result<()> {
    println!("{}", format_last_sent(store.last_sent_timestamp().await?));
    Ok(())
}

async fn cmd_handle_message(endpoint_url: Option<String>) -> Result<()> {
    let mut raw = String::new();
    std::io::Read::read_to_string(&mut std::io::stdin(), &mut raw)
        .context("Failed to read message from stdin")?;
    let request: RuntimeRequest =
        serde_json::from_str(&raw).context("Failed to parse runtime message")?;

    let fetcher = match endpoint_url {
        Some(url) => S3ObjectFetcher::with_endpoint(url),
        None => S3ObjectFetcher::new(),
    };

    match handle_runtime_request(&fetcher, &request).await {
        Some(response) => println!("{}", serde_json::to_string(&response)?),
        None => bail!("Unsupported runtime message"),
    }
    Ok(())
}

// =============================================================================
// Helpers
// =============================================================================

fn mask(value: &mut Option<String>) {
    if value.as_deref().is_some_and(|v| !v.is_empty()) {
        *value = Some("********".into());
    }
}

fn masked(mut profile: Profile) -> Profile {
    mask(&mut profile.secret_access_key);
    mask(&mut profile.session_token);
    mask(&mut profile.cognito_password);
    if let Some(AwsCredentials {
        secret_access_key,
        session_token,
        ..
    }) = profile.aws_credentials.as_mut()
    {
        *secret_access_key = "********".into();
        mask(session_token);
    }
    profile
}
