//
//  bitbucket-client
//  lib.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # bitbucket-client
//!
//! The request engine behind `bb`, a command-line client for the Bitbucket
//! Cloud REST API.
//!
//! ## Overview
//!
//! - **Profiles**: named connection configurations with a current one
//! - **Dispatcher**: authenticated requests with repository path resolution
//! - **Pagination**: cursor-following collection fetches
//! - **OAuth**: browser login through a local callback server
//! - **Errors**: API error bodies decoded into a typed taxonomy
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bitbucket_client::api::{ApiClient, Endpoint};
//! use bitbucket_client::auth::KeyringVault;
//! use bitbucket_client::Config;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let registry = Config::load()?.registry();
//! let mut profile = registry.current().into_owned();
//! profile.load_secrets(&KeyringVault::new())?;
//!
//! let client = ApiClient::new()?;
//! let issues: Vec<serde_json::Value> = client
//!     .get_all(&profile, &Endpoint::repository("acme/widgets", "issues"))
//!     .await?;
//! println!("{} issues", issues.len());
//! # Ok(())
//! # }
//! ```

/// Command-line interface definitions.
///
/// Thin commands over the engine: `profile`, `auth` and `api`.
pub mod cli;

/// The HTTP dispatcher, pagination engine and API error types.
pub mod api;

/// Profiles, the credential vault and the OAuth authorization flow.
pub mod auth;

/// Configuration file management.
///
/// Profiles are stored in platform-specific locations:
/// - Linux: `~/.config/bb/config.toml`
/// - macOS: `~/Library/Application Support/bb/config.toml`
/// - Windows: `%APPDATA%\bb\config.toml`
pub mod config;

/// Repository detection from the git `origin` remote.
pub mod context;

/// Output formatting: table, JSON and YAML.
pub mod output;

pub use cli::Cli;

pub use config::Config;

pub use context::RepoContext;

/// Application name constant.
pub const APP_NAME: &str = "bb";

/// Application version, taken from Cargo.toml at compile time.
///
/// ```rust
/// use bitbucket_client::VERSION;
///
/// println!("bb version {}", VERSION);
/// ```
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit codes for the CLI.
///
/// # Example
///
/// ```rust,no_run
/// use bitbucket_client::exit_codes;
/// use std::process;
///
/// process::exit(exit_codes::AUTH_ERROR);
/// ```
pub mod exit_codes {
    /// The command completed without errors.
    pub const SUCCESS: i32 = 0;

    /// An unspecified error occurred. Check stderr for details.
    pub const ERROR: i32 = 1;

    /// A profile is missing, has no usable credential, or a required field
    /// is unset.
    pub const CONFIG_ERROR: i32 = 3;

    /// Authentication failed or was rejected.
    ///
    /// Run `bb auth login` to authenticate.
    pub const AUTH_ERROR: i32 = 4;

    /// The requested resource does not exist or is not visible.
    pub const NOT_FOUND: i32 = 8;
}
