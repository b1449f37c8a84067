//! AESR Config Sync Library
//!
//! Named profiles pointing at an AWS config file in S3, kept in a
//! synchronized key-value store, plus the plumbing that fetches the file and
//! hands it to the AWS Extend Switch Roles extension.
//!
//! # Features
//!
//! - Save, load, list, import, export and delete profiles
//! - Track a default profile
//! - Migrate legacy profile records idempotently
//! - Fetch config text from S3 with a profile's credentials
//!
//! # Example
//!
//! ```no_run
//! use aesr_config_sync::config::StoreConfig;
//! use aesr_config_sync::remote::{S3ObjectFetcher, pull_config};
//! use aesr_config_sync::session::SessionState;
//! use aesr_config_sync::storage::ProfileStore;
//!
//! # async fn run() -> aesr_config_sync::Result<()> {
//! let store = ProfileStore::open(&StoreConfig::from_env()?);
//! let session = SessionState::new();
//!
//! // Bring old records up to date, then select the default profile
//! store.migrate_legacy_profiles().await?;
//! let listing = store.activate_default(&session).await?;
//! println!("{} profile(s)", listing.profiles.len());
//!
//! if let Some(current) = session.current() {
//!     let text = pull_config(&S3ObjectFetcher::new(), &current.data).await?;
//!     println!("{}", text);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logger;
pub mod remote;
pub mod session;
pub mod storage;
pub mod utils;

// Re-exports for convenience
pub use error::{Result, SyncError};
pub use session::SessionState;
pub use storage::{Profile, ProfileStore};
