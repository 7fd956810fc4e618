//
//  bitbucket-client
//  cli/auth.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Authentication commands.
//!
//! `login` runs the browser-based authorization code flow for profiles with
//! a `client_id`, or stores a token read from stdin with `--with-token`.

use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use serde::Deserialize;

use crate::api::{ApiError, Endpoint};
use crate::auth::{
    HttpTokenExchanger, KeyringVault, OAuthFlow, Profile, StoredToken, SystemBrowser, Vault,
    ACCESS_TOKEN_ACCOUNT,
};
use crate::config::Config;
use crate::output::{print_field, OutputWriter};

use super::{read_token_from_stdin, GlobalOptions};

#[derive(Args, Debug)]
pub struct AuthCommand {
    #[command(subcommand)]
    pub command: AuthSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthSubcommand {
    /// Obtain and store an access token for a profile
    Login(LoginArgs),

    /// Remove a profile's stored access token
    Logout,

    /// Show how a profile authenticates
    Status(StatusArgs),
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Read a token from standard input instead of opening a browser
    #[arg(long)]
    pub with_token: bool,

    /// Seconds to wait for the browser redirect
    #[arg(long, default_value = "300")]
    pub timeout: u64,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Verify the credential against the API
    #[arg(long)]
    pub check: bool,
}

impl AuthCommand {
    pub async fn run(&self, global: &GlobalOptions) -> Result<()> {
        let vault = KeyringVault::new();
        let config = Config::load()?;
        let profile = global.load_profile(&config, &vault)?;
        let writer = global.output(&profile);

        match &self.command {
            AuthSubcommand::Login(_) | AuthSubcommand::Logout
                if config.registry().find(&profile.name).is_none() =>
            {
                Err(ApiError::configuration(
                    "no profile configured; run `bb profile create <name>` first",
                )
                .into())
            }
            AuthSubcommand::Login(args) => login(args, &profile, &vault, &writer).await,
            AuthSubcommand::Logout => logout(&profile, &vault, &writer),
            AuthSubcommand::Status(args) => status(args, global, profile, &vault, &writer).await,
        }
    }
}

async fn login(
    args: &LoginArgs,
    profile: &Profile,
    vault: &dyn Vault,
    writer: &OutputWriter,
) -> Result<()> {
    if args.with_token {
        return store_token(profile, vault, read_token_from_stdin()?, writer);
    }

    if !profile.uses_oauth() {
        return Err(ApiError::configuration(format!(
            "profile '{}' has no client_id; use --with-token or create an OAuth profile",
            profile.name
        ))
        .into());
    }

    let mut flow = OAuthFlow::new(SystemBrowser, HttpTokenExchanger::new()?)
        .with_callback_timeout(Duration::from_secs(args.timeout));
    let response = flow.run(profile).await?;
    StoredToken::from_response(&response, Utc::now()).store(vault, &profile.vault_service())?;

    writer.write_success(&format!("Logged in with profile '{}'", profile.name));
    Ok(())
}

/// Stores a personal or workspace access token for `profile`.
///
/// A user/password profile cannot also hold a token.
fn store_token(
    profile: &Profile,
    vault: &dyn Vault,
    token: String,
    writer: &OutputWriter,
) -> Result<()> {
    if profile.user.as_deref().is_some_and(|u| !u.is_empty()) {
        return Err(ApiError::configuration(format!(
            "profile '{}' authenticates with user/password; create a separate profile for the token",
            profile.name
        ))
        .into());
    }
    StoredToken::bare(token).store(vault, &profile.vault_service())?;
    writer.write_success(&format!("Stored token for profile '{}'", profile.name));
    Ok(())
}

fn logout(profile: &Profile, vault: &dyn Vault, writer: &OutputWriter) -> Result<()> {
    vault.delete(&profile.vault_service(), ACCESS_TOKEN_ACCOUNT)?;
    writer.write_success(&format!("Logged out of profile '{}'", profile.name));
    Ok(())
}

#[derive(Debug, Deserialize)]
struct CurrentUser {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
}

async fn status(
    args: &StatusArgs,
    global: &GlobalOptions,
    mut profile: Profile,
    vault: &dyn Vault,
    writer: &OutputWriter,
) -> Result<()> {
    let color = writer.color_enabled();
    print_field("Profile", &profile.name, color);
    print_field("Auth", profile.auth_kind(), color);

    if let Some(user) = &profile.user {
        print_field("User", user, color);
    }

    let stored = if profile.has_credentials() {
        StoredToken::load(vault, &profile.vault_service())?
    } else {
        None
    };
    print_field("Token", &token_state(stored.as_ref(), Utc::now()), color);

    if !args.check {
        return Ok(());
    }

    if !profile.has_credentials() {
        return Err(ApiError::configuration(format!(
            "profile '{}' has no credentials",
            profile.name
        ))
        .into());
    }

    global.authorize(&mut profile, vault).await?;
    let user: CurrentUser = global
        .api_client()?
        .get(&profile, &Endpoint::root("user"))
        .await?;
    let name = user
        .display_name
        .or(user.username)
        .unwrap_or_else(|| "unknown".into());
    writer.write_success(&format!("Authenticated as {name}"));
    Ok(())
}

fn token_state(stored: Option<&StoredToken>, now: DateTime<Utc>) -> String {
    match stored {
        None => "none".to_string(),
        Some(token) if token.is_expired_at(now) && token.can_refresh() => {
            "expired (refreshable)".into()
        }
        Some(token) if token.is_expired_at(now) => "expired".into(),
        Some(token) => match token.expires_at {
            Some(at) => format!("valid until {}", at.format("%Y-%m-%d %H:%M UTC")),
            None => "stored".into(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryVault, OutputFormat};
    use chrono::TimeZone;

    fn writer() -> OutputWriter {
        OutputWriter::new(OutputFormat::Table).with_color(false)
    }

    fn token_profile() -> Profile {
        Profile {
            name: "ci".into(),
            access_token: Some("old".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_login_with_token_stores_bare_token() {
        let vault = MemoryVault::new();
        store_token(&token_profile(), &vault, "fresh".into(), &writer()).unwrap();

        let stored = StoredToken::load(&vault, "bb:ci").unwrap();
        assert_eq!(stored, Some(StoredToken::bare("fresh")));
    }

    #[test]
    fn test_login_with_token_rejects_basic_profile() {
        let vault = MemoryVault::new();
        let profile = Profile {
            name: "work".into(),
            user: Some("jdoe".into()),
            ..Default::default()
        };

        let err = store_token(&profile, &vault, "t".into(), &writer()).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::Configuration(_))
        ));
        assert!(vault.is_empty());
    }

    #[tokio::test]
    async fn test_login_without_client_id_is_configuration_error() {
        let vault = MemoryVault::new();
        let args = LoginArgs {
            with_token: false,
            timeout: 1,
        };

        let err = login(&args, &token_profile(), &vault, &writer())
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ApiError>(),
            Some(ApiError::Configuration(m)) if m.contains("client_id")
        ));
        assert!(vault.is_empty());
    }

    #[test]
    fn test_logout_deletes_stored_token() {
        let vault = MemoryVault::new();
        let profile = token_profile();
        StoredToken::bare("t").store(&vault, "bb:ci").unwrap();
        vault.set("bb:ci", "other", "kept").unwrap();

        logout(&profile, &vault, &writer()).unwrap();

        assert_eq!(vault.get("bb:ci", ACCESS_TOKEN_ACCOUNT).unwrap(), None);
        assert_eq!(vault.get("bb:ci", "other").unwrap().as_deref(), Some("kept"));
    }

    #[test]
    fn test_token_state() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let expiring = |hours: i64, refresh: Option<&str>| StoredToken {
            access_token: "t".into(),
            refresh_token: refresh.map(String::from),
            expires_at: Some(now + chrono::Duration::hours(hours)),
        };

        assert_eq!(token_state(None, now), "none");
        assert_eq!(token_state(Some(&StoredToken::bare("t")), now), "stored");
        assert_eq!(
            token_state(Some(&expiring(2, None)), now),
            "valid until 2026-03-01 14:00 UTC"
        );
        assert_eq!(token_state(Some(&expiring(-1, None)), now), "expired");
        assert_eq!(
            token_state(Some(&expiring(-1, Some("r"))), now),
            "expired (refreshable)"
        );
    }
}
