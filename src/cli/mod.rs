//
//  bitbucket-client
//  cli/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! CLI command definitions using clap derive macros

mod api;
mod auth;
mod profile;

pub use api::ApiCommand;
pub use auth::AuthCommand;
pub use profile::ProfileCommand;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::api::{ApiClient, ApiError};
use crate::auth::{
    ensure_access_token, HttpTokenExchanger, OAuthFlow, OutputFormat, Profile, SystemBrowser,
    Vault,
};
use crate::config::Config;
use crate::exit_codes;
use crate::output::OutputWriter;

#[derive(Parser, Debug)]
#[command(
    name = "bb",
    version,
    about = "Work with the Bitbucket Cloud API from the command line",
    long_about = "bb sends authenticated requests to the Bitbucket Cloud REST API.\n\n\
                  Connections are stored as named profiles; secrets live in the system keychain.",
    propagate_version = true,
    after_help = "Use 'bb <command> --help' for more information about a command."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOptions,
}

#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Profile to use instead of the current one
    #[arg(long, short = 'P', global = true, env = "BB_PROFILE")]
    pub profile: Option<String>,

    /// Repository as WORKSPACE/REPO (or REPO with a default workspace)
    #[arg(long, short = 'R', global = true, env = "BB_REPO")]
    pub repo: Option<String>,

    /// Override the API root URL
    #[arg(long, global = true, env = "BB_API_URL", hide = true)]
    pub api_url: Option<String>,

    /// Output format, overriding the profile's
    #[arg(long, short = 'o', global = true, value_enum)]
    pub output: Option<OutputFormat>,
}

impl GlobalOptions {
    /// Resolves the profile for this invocation and fills in its secrets.
    ///
    /// A profile without any credential source is returned as-is so that
    /// the dispatcher reports what is missing without touching the vault.
    pub fn load_profile(&self, config: &Config, vault: &dyn Vault) -> Result<Profile, ApiError> {
        let registry = config.registry();
        let mut profile = registry.select(self.profile.as_deref())?.into_owned();
        if profile.has_credentials() {
            profile.load_secrets(vault)?;
        }
        Ok(profile)
    }

    /// Makes sure an OAuth profile holds a usable token, logging in through
    /// the browser when it does not.
    pub async fn authorize(&self, profile: &mut Profile, vault: &dyn Vault) -> Result<(), ApiError> {
        if !profile.uses_oauth() {
            return Ok(());
        }
        let mut flow = OAuthFlow::new(SystemBrowser, HttpTokenExchanger::new()?);
        ensure_access_token(vault, profile, &mut flow).await
    }

    pub fn api_client(&self) -> Result<ApiClient, ApiError> {
        let client = ApiClient::new()?;
        Ok(match self.api_url.as_deref().filter(|u| !u.is_empty()) {
            Some(url) => client.with_base_url(url),
            None => client,
        })
    }

    pub fn output(&self, profile: &Profile) -> OutputWriter {
        OutputWriter::new(self.output.unwrap_or(profile.output_format))
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage connection profiles
    Profile(ProfileCommand),

    /// Log in and out of OAuth profiles
    Auth(AuthCommand),

    /// Make an authenticated API request
    Api(ApiCommand),

    /// Show version information
    Version,
}

/// Reads a token piped on standard input.
pub(crate) fn read_token_from_stdin() -> Result<String> {
    let mut buffer = String::new();
    std::io::Read::read_to_string(&mut std::io::stdin(), &mut buffer)
        .context("Failed to read token from stdin")?;
    let token = buffer.trim().to_string();
    if token.is_empty() {
        bail!("No token provided on stdin");
    }
    Ok(token)
}

/// Maps a command failure to the process exit code.
pub fn exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<ApiError>() {
        Some(ApiError::Authorization(_)) => exit_codes::AUTH_ERROR,
        Some(ApiError::Configuration(_)) => exit_codes::CONFIG_ERROR,
        Some(e) if e.is_not_found() => exit_codes::NOT_FOUND,
        Some(e) if e.status().is_some_and(|s| s.as_u16() == 401) => exit_codes::AUTH_ERROR,
        _ => exit_codes::ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::BitbucketError;
    use crate::auth::{MemoryVault, StoredToken};
    use reqwest::StatusCode;

    #[test]
    fn test_exit_codes() {
        let code = |e: ApiError| exit_code(&anyhow::Error::new(e));

        assert_eq!(code(ApiError::authorization("denied")), exit_codes::AUTH_ERROR);
        assert_eq!(code(ApiError::configuration("no token")), exit_codes::CONFIG_ERROR);
        assert_eq!(
            code(ApiError::Api {
                status: StatusCode::NOT_FOUND,
                error: BitbucketError::new("missing"),
            }),
            exit_codes::NOT_FOUND
        );
        assert_eq!(
            code(ApiError::Api {
                status: StatusCode::UNAUTHORIZED,
                error: BitbucketError::new("bad token"),
            }),
            exit_codes::AUTH_ERROR
        );
        assert_eq!(exit_code(&anyhow::anyhow!("boom")), exit_codes::ERROR);
    }

    #[test]
    fn test_exit_code_survives_context() {
        let err = anyhow::Error::new(ApiError::configuration("x")).context("loading profile");
        assert_eq!(exit_code(&err), exit_codes::CONFIG_ERROR);
    }

    #[test]
    fn test_load_profile_hydrates_secrets() {
        let vault = MemoryVault::new();
        vault.set("bb:work", "jdoe", "pw").unwrap();
        StoredToken::bare("t").store(&vault, "bb:ci").unwrap();

        let config: Config = toml::from_str(
            r#"
            [[profiles]]
            name = "work"
            user = "jdoe"

            [[profiles]]
            name = "ci"
            client_id = "consumer"
            "#,
        )
        .unwrap();

        let current = GlobalOptions::default().load_profile(&config, &vault).unwrap();
        assert_eq!(current.name, "work");
        assert_eq!(current.password.as_deref(), Some("pw"));

        let selected = GlobalOptions {
            profile: Some("ci".into()),
            ..Default::default()
        }
        .load_profile(&config, &vault)
        .unwrap();
        assert_eq!(selected.access_token.as_deref(), Some("t"));
    }

    #[test]
    fn test_unknown_profile_is_configuration_error() {
        let err = GlobalOptions {
            profile: Some("nope".into()),
            ..Default::default()
        }
        .load_profile(&Config::default(), &MemoryVault::new())
        .unwrap_err();
        assert!(matches!(err, ApiError::Configuration(_)));
    }

    #[test]
    fn test_placeholder_skips_vault() {
        let vault = MemoryVault::new();
        let profile = GlobalOptions::default()
            .load_profile(&Config::default(), &vault)
            .unwrap();
        assert_eq!(profile.name, "default");
        assert!(!profile.has_credentials());
    }
}
