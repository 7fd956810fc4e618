//
//  bitbucket-client
//  auth/profile.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Authentication Profile Management Module
//!
//! Named connection configurations and the registry that tracks which one
//! is current.
//!
//! ## Profile Structure
//!
//! Each profile carries:
//! - **Identity**: `name`, `description`, and the `default` flag
//! - **Authentication**: an access token, a user/password pair, or OAuth
//!   client credentials (plus `callback_port` for interactive login)
//! - **Behavior switches**: default workspace and project, output format,
//!   batch error policy, progress display
//!
//! ## Storage
//!
//! Profiles are persisted by [`Config`](crate::config::Config). Secrets are
//! skipped by serde and kept in the credential vault instead; see
//! [`Profile::store_secrets`] and [`Profile::load_secrets`].
//!
//! ## Example
//!
//! ```rust
//! use bitbucket_client::auth::{Profile, ProfileRegistry};
//!
//! let mut registry = ProfileRegistry::new();
//! registry.add(Profile {
//!     name: "work".to_string(),
//!     access_token: Some("token".to_string()),
//!     default: true,
//!     ..Default::default()
//! });
//! registry.add(Profile {
//!     name: "personal".to_string(),
//!     access_token: Some("other".to_string()),
//!     default: true,
//!     ..Default::default()
//! });
//!
//! assert_eq!(registry.current().name, "personal");
//! assert!(!registry.find("work").unwrap().default);
//! ```

use std::borrow::Cow;
use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Credential, StoredToken, Vault};
use crate::api::common::ApiError;

/// Vault account holding a profile's access token.
pub const ACCESS_TOKEN_ACCOUNT: &str = "access-token";

/// Name of the placeholder returned by an empty registry.
pub const PLACEHOLDER_PROFILE: &str = "default";

/// A named connection configuration.
///
/// `access_token`, `password` and `client_secret` are never serialized.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Unique identifier, e.g. `work`. Selected with `--profile`.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether this is the current profile. At most one profile in a
    /// registry carries the flag.
    #[serde(default)]
    pub default: bool,

    #[serde(skip)]
    pub access_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(skip)]
    pub password: Option<String>,

    /// OAuth consumer key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(skip)]
    pub client_secret: Option<String>,

    /// Vault service holding this profile's secrets.
    ///
    /// Defaults to `bb:<name>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_key: Option<String>,

    /// Local port for the OAuth redirect. Present only on profiles that log
    /// in interactively.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_workspace: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_project: Option<String>,

    #[serde(default)]
    pub output_format: OutputFormat,

    #[serde(default)]
    pub error_processing: ErrorProcessing,

    /// Show progress for long transfers.
    #[serde(default)]
    pub progress: bool,
}

/// How results are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Yaml,
    #[default]
    Table,
}

/// What a batch command does when one item fails.
///
/// - `Stop` aborts the batch with the error
/// - `Warn` prints a warning and continues
/// - `Ignore` continues silently
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ErrorProcessing {
    #[default]
    Stop,
    Warn,
    Ignore,
}

impl Profile {
    /// The profile an empty registry hands out. It has no credentials.
    pub fn placeholder() -> Self {
        Self {
            name: PLACEHOLDER_PROFILE.to_string(),
            ..Default::default()
        }
    }

    /// Vault service for this profile's secrets.
    pub fn vault_service(&self) -> String {
        match self.vault_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => key.to_string(),
            None => format!("bb:{}", self.name),
        }
    }

    /// Returns `true` when the profile logs in through the OAuth flow.
    pub fn uses_oauth(&self) -> bool {
        present(&self.client_id)
    }

    pub fn has_credentials(&self) -> bool {
        present(&self.access_token) || present(&self.user) || self.uses_oauth()
    }

    /// Checks that the profile names exactly one credential source: an
    /// access token, a user with a password, or an OAuth client id with its
    /// secret.
    ///
    /// A token issued to an OAuth profile by `bb auth login` is session
    /// state, not a second source. A client-credential profile still needs
    /// that token before it can dispatch requests; that check belongs to
    /// the dispatcher.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::configuration("profile name must not be empty"));
        }

        let token = present(&self.access_token) && !self.uses_oauth();
        let basic = present(&self.user) || present(&self.password);
        let client = self.uses_oauth() || present(&self.client_secret);

        let groups: Vec<&str> = [
            (token, "access_token"),
            (basic, "user/password"),
            (client, "client_id/client_secret"),
        ]
        .into_iter()
        .filter_map(|(set, fields)| set.then_some(fields))
        .collect();

        match groups.as_slice() {
            [] => Err(ApiError::configuration(format!(
                "profile '{}' has no credentials; set access_token, user/password or client_id/client_secret (run `bb profile create`)",
                self.name
            ))),
            [_] if basic => self.require_pair(&self.user, "user", &self.password, "password"),
            [_] if client => self.require_pair(
                &self.client_id,
                "client_id",
                &self.client_secret,
                "client_secret",
            ),
            [_] => Ok(()),
            conflicting => Err(ApiError::configuration(format!(
                "profile '{}' sets conflicting credentials ({}); keep only one",
                self.name,
                conflicting.join(", ")
            ))),
        }
    }

    fn require_pair(
        &self,
        first: &Option<String>,
        first_name: &str,
        second: &Option<String>,
        second_name: &str,
    ) -> Result<(), ApiError> {
        let missing = match (present(first), present(second)) {
            (true, false) => Some((first_name, second_name)),
            (false, true) => Some((second_name, first_name)),
            _ => None,
        };
        match missing {
            Some((set, unset)) => Err(ApiError::configuration(format!(
                "profile '{}' has {set} but no {unset}",
                self.name
            ))),
            None => Ok(()),
        }
    }

    /// Writes every secret present on the profile to the vault.
    pub fn store_secrets(&self, vault: &dyn Vault) -> Result<(), ApiError> {
        let service = self.vault_service();
        if let Some(token) = self.access_token.as_deref().filter(|t| !t.is_empty()) {
            StoredToken::bare(token).store(vault, &service)?;
        }
        if let (Some(user), Some(password)) = (&self.user, &self.password) {
            vault.set(&service, user, password)?;
        }
        if let (Some(client_id), Some(secret)) = (&self.client_id, &self.client_secret) {
            vault.set(&service, client_id, secret)?;
        }
        debug!(profile = %self.name, %service, "stored profile secrets");
        Ok(())
    }

    /// Fills in secrets the profile does not already carry from the vault.
    pub fn load_secrets(&mut self, vault: &dyn Vault) -> Result<(), ApiError> {
        let service = self.vault_service();
        if self.access_token.is_none() {
            self.access_token = StoredToken::load(vault, &service)?.map(|t| t.access_token);
        }
        if self.password.is_none() {
            if let Some(user) = self.user.as_deref() {
                self.password = Credential::load(vault, &service, user)?.map(|c| c.password);
            }
        }
        if self.client_secret.is_none() {
            if let Some(client_id) = self.client_id.as_deref() {
                self.client_secret = vault.get(&service, client_id)?;
            }
        }
        Ok(())
    }

    /// Removes every secret this profile may have stored.
    pub fn purge_secrets(&self, vault: &dyn Vault) -> Result<(), ApiError> {
        let service = self.vault_service();
        vault.delete(&service, ACCESS_TOKEN_ACCOUNT)?;
        if let Some(user) = &self.user {
            vault.delete(&service, user)?;
        }
        if let Some(client_id) = &self.client_id {
            vault.delete(&service, client_id)?;
        }
        Ok(())
    }

    /// Short description of how the profile authenticates.
    pub fn auth_kind(&self) -> &'static str {
        if self.uses_oauth() {
            "oauth"
        } else if present(&self.user) {
            "basic"
        } else if present(&self.access_token) {
            "token"
        } else {
            "none"
        }
    }
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |s: &Option<String>| s.as_ref().map(|_| "<redacted>");
        f.debug_struct("Profile")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("default", &self.default)
            .field("access_token", &redact(&self.access_token))
            .field("user", &self.user)
            .field("password", &redact(&self.password))
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("vault_key", &self.vault_key)
            .field("callback_port", &self.callback_port)
            .field("default_workspace", &self.default_workspace)
            .field("default_project", &self.default_project)
            .field("output_format", &self.output_format)
            .field("error_processing", &self.error_processing)
            .field("progress", &self.progress)
            .finish()
    }
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

/// The set of profiles, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: Vec<Profile>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry by adding each profile in order.
    ///
    /// If several carry `default`, the last one wins.
    pub fn from_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        let mut registry = Self::new();
        for profile in profiles {
            registry.add(profile);
        }
        registry
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Adds a profile, replacing any profile with the same name in place.
    ///
    /// A profile added with `default = true` demotes the previous default.
    /// Returns the replaced profile.
    pub fn add(&mut self, profile: Profile) -> Option<Profile> {
        if profile.default {
            self.clear_default();
        }
        match self.profiles.iter().position(|p| p.name == profile.name) {
            Some(index) => Some(std::mem::replace(&mut self.profiles[index], profile)),
            None => {
                self.profiles.push(profile);
                None
            }
        }
    }

    /// Deletes the named profiles and purges their vault secrets.
    ///
    /// Unknown names are skipped. Returns how many profiles were removed.
    pub fn delete<S: AsRef<str>>(
        &mut self,
        vault: &dyn Vault,
        names: &[S],
    ) -> Result<usize, ApiError> {
        let mut deleted = 0;
        for name in names {
            let name = name.as_ref();
            if let Some(index) = self.profiles.iter().position(|p| p.name == name) {
                self.profiles[index].purge_secrets(vault)?;
                self.profiles.remove(index);
                debug!(profile = %name, "deleted profile");
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Marks `name` as the default profile.
    pub fn set_current(&mut self, name: &str) -> Result<(), ApiError> {
        if self.find(name).is_none() {
            return Err(ApiError::configuration(format!(
                "profile '{name}' not found"
            )));
        }
        for profile in &mut self.profiles {
            profile.default = profile.name == name;
        }
        Ok(())
    }

    /// Returns the current profile.
    ///
    /// The profile flagged `default`, else the first registered one, else a
    /// credential-less placeholder named `default`.
    pub fn current(&self) -> Cow<'_, Profile> {
        self.profiles
            .iter()
            .find(|p| p.default)
            .or_else(|| self.profiles.first())
            .map(Cow::Borrowed)
            .unwrap_or_else(|| Cow::Owned(Profile::placeholder()))
    }

    /// Returns the named profile, or [`current`](Self::current) when no name
    /// is given.
    pub fn select(&self, name: Option<&str>) -> Result<Cow<'_, Profile>, ApiError> {
        match name {
            Some(name) => self.find(name).map(Cow::Borrowed).ok_or_else(|| {
                ApiError::configuration(format!("profile '{name}' not found"))
            }),
            None => Ok(self.current()),
        }
    }

    fn clear_default(&mut self) {
        for profile in &mut self.profiles {
            profile.default = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::LockedVault;
    use crate::auth::MemoryVault;

    fn token_profile(name: &str, default: bool) -> Profile {
        Profile {
            name: name.into(),
            access_token: Some(format!("{name}-token")),
            default,
            ..Default::default()
        }
    }

    #[test]
    fn test_second_default_demotes_first() {
        let mut registry = ProfileRegistry::new();
        registry.add(token_profile("first", true));
        registry.add(token_profile("second", true));

        assert_eq!(registry.current().name, "second");
        assert_eq!(registry.profiles().iter().filter(|p| p.default).count(), 1);
    }

    #[test]
    fn test_current_falls_back_to_first_registered() {
        let mut registry = ProfileRegistry::new();
        registry.add(token_profile("alpha", false));
        registry.add(token_profile("beta", false));
        assert_eq!(registry.current().name, "alpha");
    }

    #[test]
    fn test_empty_registry_returns_invalid_placeholder() {
        let registry = ProfileRegistry::new();
        let current = registry.current();

        assert_eq!(current.name, "default");
        assert!(current.access_token.is_none());
        assert!(matches!(
            current.validate(),
            Err(ApiError::Configuration(_))
        ));
    }

    #[test]
    fn test_add_replaces_same_name_in_place() {
        let mut registry = ProfileRegistry::new();
        registry.add(token_profile("a", false));
        registry.add(token_profile("b", false));

        let replaced = registry.add(Profile {
            description: Some("updated".into()),
            ..token_profile("a", false)
        });

        assert!(replaced.is_some());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.profiles()[0].description.as_deref(), Some("updated"));
    }

    #[test]
    fn test_delete_counts_only_existing_and_purges_vault() {
        let vault = MemoryVault::new();
        let profile = Profile {
            name: "work".into(),
            user: Some("jdoe".into()),
            password: Some("app-pass".into()),
            access_token: Some("tok".into()),
            ..Default::default()
        };
        profile.store_secrets(&vault).unwrap();
        assert_eq!(vault.len(), 2);

        let mut registry = ProfileRegistry::from_profiles([profile, token_profile("other", false)]);
        let deleted = registry.delete(&vault, &["work", "missing", "work"]).unwrap();

        assert_eq!(deleted, 1);
        assert!(registry.find("work").is_none());
        assert!(vault.is_empty());
    }

    #[test]
    fn test_set_current_unknown_is_configuration_error() {
        let mut registry = ProfileRegistry::from_profiles([token_profile("a", true)]);
        assert!(matches!(
            registry.set_current("nope"),
            Err(ApiError::Configuration(_))
        ));

        registry.add(token_profile("b", false));
        registry.set_current("b").unwrap();
        assert_eq!(registry.current().name, "b");
        assert!(!registry.find("a").unwrap().default);
    }

    #[test]
    fn test_select_unknown_name_fails() {
        let registry = ProfileRegistry::from_profiles([token_profile("a", false)]);
        assert_eq!(registry.select(None).unwrap().name, "a");
        assert!(registry.select(Some("zzz")).is_err());
    }

    #[test]
    fn test_validate_requires_password_for_user() {
        let profile = Profile {
            name: "ci".into(),
            user: Some("bot".into()),
            ..Default::default()
        };
        let err = profile.validate().unwrap_err();
        assert!(err.to_string().contains("password"));
    }

    #[test]
    fn test_validate_rejects_conflicting_credentials() {
        let profile = Profile {
            name: "mixed".into(),
            access_token: Some("t".into()),
            user: Some("bot".into()),
            password: Some("pw".into()),
            ..Default::default()
        };
        let err = profile.validate().unwrap_err();
        assert!(
            matches!(err, ApiError::Configuration(ref m) if m.contains("access_token") && m.contains("user/password"))
        );

        let all_three = Profile {
            client_id: Some("key".into()),
            client_secret: Some("shh".into()),
            ..profile
        };
        let err = all_three.validate().unwrap_err();
        assert!(
            matches!(err, ApiError::Configuration(ref m) if m.contains("user/password") && m.contains("client_id/client_secret"))
        );
    }

    #[test]
    fn test_validate_requires_client_secret_for_client_id() {
        let profile = Profile {
            name: "oauth".into(),
            client_id: Some("key".into()),
            ..Default::default()
        };
        let err = profile.validate().unwrap_err();
        assert!(matches!(err, ApiError::Configuration(ref m) if m.contains("no client_secret")));

        let complete = Profile {
            client_secret: Some("shh".into()),
            ..profile
        };
        assert!(complete.validate().is_ok());
    }

    #[test]
    fn test_validate_accepts_issued_token_on_oauth_profile() {
        let profile = Profile {
            name: "oauth".into(),
            client_id: Some("key".into()),
            client_secret: Some("shh".into()),
            access_token: Some("issued".into()),
            ..Default::default()
        };
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_delete_keeps_profile_whose_secrets_could_not_be_purged() {
        let vault = LockedVault::locking("bb:locked");
        let mut registry = ProfileRegistry::from_profiles([
            token_profile("gone", false),
            token_profile("locked", false),
        ]);

        let err = registry.delete(&vault, &["gone", "locked"]).unwrap_err();

        assert!(matches!(err, ApiError::Vault(_)));
        assert!(registry.find("gone").is_none());
        assert!(registry.find("locked").is_some());
    }

    #[test]
    fn test_secrets_round_trip_through_vault() {
        let vault = MemoryVault::new();
        let stored = Profile {
            name: "oauth".into(),
            client_id: Some("key".into()),
            client_secret: Some("shh".into()),
            vault_key: Some("custom-service".into()),
            ..Default::default()
        };
        stored.store_secrets(&vault).unwrap();
        assert_eq!(
            vault.get("custom-service", "key").unwrap().as_deref(),
            Some("shh")
        );

        let mut loaded = Profile {
            client_secret: None,
            ..stored.clone()
        };
        loaded.load_secrets(&vault).unwrap();
        assert_eq!(loaded.client_secret.as_deref(), Some("shh"));
        assert_eq!(loaded.access_token, None);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", token_profile("x", false));
        assert!(!rendered.contains("x-token"));
    }
}
