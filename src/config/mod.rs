//
//  bitbucket-client
//  config/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Configuration Module
//!
//! Loads and saves the profile list from a TOML file stored in a
//! platform-specific directory.
//!
//! ## Configuration File Location
//!
//! - **Linux**: `~/.config/bb/config.toml`
//! - **macOS**: `~/Library/Application Support/bb/config.toml`
//! - **Windows**: `C:\Users\<User>\AppData\Roaming\bb\config.toml`
//!
//! Setting `BB_CONFIG_DIR` replaces the directory.
//!
//! ## Example Configuration File
//!
//! ```toml
//! [[profiles]]
//! name = "work"
//! default = true
//! client_id = "Pyydmsf5kLpEqs24kw"
//! callback_port = 8085
//! default_workspace = "acme"
//! output_format = "table"
//! error_processing = "warn"
//!
//! [[profiles]]
//! name = "ci"
//! user = "build-bot"
//! output_format = "json"
//! ```
//!
//! Secrets never appear in this file; they live in the credential vault
//! (see [`crate::auth::Vault`]).
//!
//! ## Submodules
//!
//! - [`file`]: Low-level configuration file I/O operations

mod file;

pub use file::*;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::auth::{Profile, ProfileRegistry};

/// Host of Bitbucket Cloud.
pub const BITBUCKET_CLOUD: &str = "bitbucket.org";

/// Environment variable overriding the configuration directory.
pub const CONFIG_DIR_ENV: &str = "BB_CONFIG_DIR";

/// Persisted CLI configuration.
///
/// Profiles are stored in registration order as a `[[profiles]]` array of
/// tables. The registry built from them is the in-memory authority; the
/// config is only the storage format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

impl Config {
    /// Loads the configuration from the default location.
    ///
    /// Returns an empty configuration when no file exists yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Saves the configuration to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        match read_config_file(path)? {
            Some(content) => toml::from_str(&content)
                .with_context(|| format!("Invalid configuration in {}", path.display())),
            None => Ok(Self::default()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        write_config_file(path, &content)
    }

    /// Returns the path to the configuration file.
    ///
    /// `$BB_CONFIG_DIR/config.toml` when the variable is set, otherwise the
    /// platform config directory for `bb`.
    pub fn config_path() -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
            return Ok(PathBuf::from(dir).join("config.toml"));
        }
        let dirs = ProjectDirs::from("", "", crate::APP_NAME)
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Builds the profile registry from the stored profiles.
    pub fn registry(&self) -> ProfileRegistry {
        ProfileRegistry::from_profiles(self.profiles.clone())
    }

    /// Replaces the stored profiles with the registry's list.
    pub fn store_registry(&mut self, registry: &ProfileRegistry) {
        self.profiles = registry.profiles().to_vec();
    }
}
