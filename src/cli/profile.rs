//
//  bitbucket-client
//  cli/profile.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Profile management commands.
//!
//! ```bash
//! # App password profile, made current
//! bb profile create work --user jdoe --password "$APP_PASSWORD" --default
//!
//! # OAuth consumer that logs in through the browser
//! bb profile create oauth --client-id KEY --client-secret SECRET --callback-port 8976
//!
//! bb profile use oauth
//! bb profile delete work oauth
//! ```

use anyhow::{bail, Result};
use clap::{Args, Subcommand};

use crate::api::ApiError;
use crate::auth::{ErrorProcessing, KeyringVault, OutputFormat, Profile, Vault};
use crate::config::Config;
use crate::output::{format_bool, OutputWriter, TableBuilder, TableOutput};

use super::{read_token_from_stdin, GlobalOptions};

#[derive(Args, Debug)]
pub struct ProfileCommand {
    #[command(subcommand)]
    pub command: ProfileSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum ProfileSubcommand {
    /// List profiles
    #[command(visible_alias = "ls")]
    List,

    /// Create a profile
    Create(ProfileArgs),

    /// Change fields of an existing profile
    Update(ProfileArgs),

    /// Delete profiles and their stored secrets
    #[command(visible_alias = "rm")]
    Delete(DeleteArgs),

    /// Make a profile the current one
    Use(UseArgs),
}

#[derive(Args, Debug, Default)]
pub struct ProfileArgs {
    /// Profile name
    pub name: String,

    #[arg(long)]
    pub description: Option<String>,

    /// Make this the current profile
    #[arg(long)]
    pub default: bool,

    /// Access token (prefer --with-token to keep it out of shell history)
    #[arg(long)]
    pub access_token: Option<String>,

    /// Read the access token from standard input
    #[arg(long, conflicts_with = "access_token")]
    pub with_token: bool,

    #[arg(long)]
    pub user: Option<String>,

    /// App password for --user
    #[arg(long, env = "BB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// OAuth consumer key
    #[arg(long)]
    pub client_id: Option<String>,

    /// OAuth consumer secret
    #[arg(long, env = "BB_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Local port for the OAuth redirect
    #[arg(long)]
    pub callback_port: Option<u16>,

    /// Keychain service holding the secrets (default: bb:<name>)
    #[arg(long)]
    pub vault_key: Option<String>,

    #[arg(long)]
    pub default_workspace: Option<String>,

    #[arg(long)]
    pub default_project: Option<String>,

    #[arg(long, value_enum)]
    pub output_format: Option<OutputFormat>,

    #[arg(long, value_enum)]
    pub error_processing: Option<ErrorProcessing>,

    #[arg(long)]
    pub progress: Option<bool>,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Profiles to delete
    #[arg(required = true)]
    pub names: Vec<String>,
}

#[derive(Args, Debug)]
pub struct UseArgs {
    pub name: String,
}

impl ProfileCommand {
    pub async fn run(&self, global: &GlobalOptions) -> Result<()> {
        let vault = KeyringVault::new();
        let mut config = Config::load()?;
        let writer = OutputWriter::new(
            global
                .output
                .unwrap_or(config.registry().current().output_format),
        );

        match &self.command {
            ProfileSubcommand::List => list(&config, &writer),
            ProfileSubcommand::Create(args) => {
                let profile = args.create()?;
                save_profile(&mut config, &vault, profile, true, &writer)
            }
            ProfileSubcommand::Update(args) => {
                let existing = config
                    .registry()
                    .find(&args.name)
                    .cloned()
                    .ok_or_else(|| {
                        ApiError::configuration(format!("profile '{}' not found", args.name))
                    })?;
                let profile = args.apply(existing)?;
                save_profile(&mut config, &vault, profile, false, &writer)
            }
            ProfileSubcommand::Delete(args) => delete(&mut config, &vault, &args.names, &writer),
            ProfileSubcommand::Use(args) => {
                let mut registry = config.registry();
                registry.set_current(&args.name)?;
                config.store_registry(&registry);
                config.save()?;
                writer.write_success(&format!("Now using profile '{}'", args.name));
                Ok(())
            }
        }
    }
}

impl ProfileArgs {
    fn create(&self) -> Result<Profile> {
        self.apply(Profile {
            name: self.name.clone(),
            ..Default::default()
        })
    }

    /// Overlays every flag that was given onto `profile`.
    fn apply(&self, mut profile: Profile) -> Result<Profile> {
        let token = if self.with_token {
            Some(read_token_from_stdin()?)
        } else {
            self.access_token.clone()
        };

        overlay(&mut profile.description, &self.description);
        overlay(&mut profile.access_token, &token);
        overlay(&mut profile.user, &self.user);
        overlay(&mut profile.password, &self.password);
        overlay(&mut profile.client_id, &self.client_id);
        overlay(&mut profile.client_secret, &self.client_secret);
        overlay(&mut profile.vault_key, &self.vault_key);
        overlay(&mut profile.default_workspace, &self.default_workspace);
        overlay(&mut profile.default_project, &self.default_project);
        if self.callback_port.is_some() {
            profile.callback_port = self.callback_port;
        }
        if let Some(format) = self.output_format {
            profile.output_format = format;
        }
        if let Some(policy) = self.error_processing {
            profile.error_processing = policy;
        }
        if let Some(progress) = self.progress {
            profile.progress = progress;
        }
        if self.default {
            profile.default = true;
        }
        Ok(profile)
    }
}

fn overlay(field: &mut Option<String>, value: &Option<String>) {
    if let Some(value) = value {
        *field = Some(value.clone());
    }
}

/// Validates `profile`, moves its secrets to the vault and persists it.
fn save_profile(
    config: &mut Config,
    vault: &dyn Vault,
    mut profile: Profile,
    creating: bool,
    writer: &OutputWriter,
) -> Result<()> {
    let mut registry = config.registry();
    if creating && registry.find(&profile.name).is_some() {
        bail!(
            "Profile '{}' already exists; use `bb profile update`",
            profile.name
        );
    }

    // The first profile becomes current.
    if registry.is_empty() {
        profile.default = true;
    }

    validate_with_vault(&profile, vault)?;
    profile.store_secrets(vault)?;

    let name = profile.name.clone();
    registry.add(profile);
    config.store_registry(&registry);
    config.save()?;

    let verb = if creating { "Created" } else { "Updated" };
    writer.write_success(&format!("{verb} profile '{name}'"));
    Ok(())
}

fn delete(
    config: &mut Config,
    vault: &dyn Vault,
    names: &[String],
    writer: &OutputWriter,
) -> Result<()> {
    let mut registry = config.registry();
    // Profiles purged before a vault failure are gone either way.
    let result = registry.delete(vault, names);
    config.store_registry(&registry);
    config.save()?;
    let deleted = result?;

    match deleted {
        0 => writer.write_warning("No matching profiles"),
        1 => writer.write_success("Deleted 1 profile"),
        n => writer.write_success(&format!("Deleted {n} profiles")),
    }
    Ok(())
}

fn list(config: &Config, writer: &OutputWriter) -> Result<()> {
    let registry = config.registry();
    if registry.is_empty() && writer.format() == OutputFormat::Table {
        writer.write_info("No profiles. Create one with `bb profile create <name>`.");
        return Ok(());
    }
    let current = registry.current().name.clone();
    let profiles: Vec<ProfileRow> = registry
        .profiles()
        .iter()
        .map(|p| ProfileRow {
            current: p.name == current,
            profile: p.clone(),
        })
        .collect();
    writer.write(&profiles)
}

#[derive(serde::Serialize)]
struct ProfileRow {
    #[serde(flatten)]
    profile: Profile,
    current: bool,
}

impl TableOutput for Vec<ProfileRow> {
    fn render_table(&self, color: bool) -> String {
        TableBuilder::new()
            .color(color)
            .headers(["Name", "Current", "Auth", "Workspace", "Description"])
            .rows(self.iter().map(|row| {
                vec![
                    row.profile.name.clone(),
                    format_bool(row.current, color),
                    row.profile.auth_kind().to_string(),
                    row.profile.default_workspace.clone().unwrap_or_default(),
                    row.profile.description.clone().unwrap_or_default(),
                ]
            }))
            .render()
    }
}

/// Validates `profile` as it will be once its stored secrets are loaded,
/// so an update need not repeat them.
fn validate_with_vault(profile: &Profile, vault: &dyn Vault) -> Result<()> {
    let mut merged = profile.clone();
    if merged.has_credentials() {
        merged.load_secrets(vault)?;
    }
    merged.validate()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryVault;

    fn args(name: &str) -> ProfileArgs {
        ProfileArgs {
            name: name.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_overlays_only_given_fields() {
        let existing = Profile {
            name: "work".into(),
            user: Some("jdoe".into()),
            default_workspace: Some("acme".into()),
            ..Default::default()
        };
        let updated = ProfileArgs {
            default_project: Some("PRJ".into()),
            output_format: Some(OutputFormat::Json),
            ..args("work")
        }
        .apply(existing)
        .unwrap();

        assert_eq!(updated.user.as_deref(), Some("jdoe"));
        assert_eq!(updated.default_workspace.as_deref(), Some("acme"));
        assert_eq!(updated.default_project.as_deref(), Some("PRJ"));
        assert_eq!(updated.output_format, OutputFormat::Json);
        assert!(!updated.default);
    }

    #[test]
    fn test_validation_sees_vault_secrets() {
        let vault = MemoryVault::new();
        vault.set("bb:work", "jdoe", "pw").unwrap();

        let profile = Profile {
            name: "work".into(),
            user: Some("jdoe".into()),
            ..Default::default()
        };
        assert!(validate_with_vault(&profile, &vault).is_ok());
        assert!(validate_with_vault(&profile, &MemoryVault::new()).is_err());
    }

    #[test]
    fn test_save_rejects_profile_without_credentials() {
        let mut config = Config::default();
        let vault = MemoryVault::new();
        let writer = OutputWriter::new(OutputFormat::Table).with_color(false);

        let err = save_profile(
            &mut config,
            &vault,
            args("empty").create().unwrap(),
            true,
            &writer,
        )
        .unwrap_err();

        assert!(err.to_string().contains("no credentials"));
        assert!(config.profiles.is_empty());
        assert!(vault.is_empty());
    }

    #[test]
    fn test_profile_rows_render() {
        let rows = vec![ProfileRow {
            profile: Profile {
                name: "work".into(),
                access_token: Some("t".into()),
                default_workspace: Some("acme".into()),
                ..Default::default()
            },
            current: true,
        }];
        let table = rows.render_table(false);
        assert!(table.contains("work"));
        assert!(table.contains("token"));
        assert!(table.contains("acme"));
        assert!(table.contains("Yes"));

        let json = serde_json::to_value(&rows).unwrap();
        assert_eq!(json[0]["name"], "work");
        assert_eq!(json[0]["current"], true);
        assert!(json[0].get("access_token").is_none());
    }
}
