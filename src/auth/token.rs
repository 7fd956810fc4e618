//
//  bitbucket-client
//  auth/token.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Stored Token Module
//!
//! The access token a profile keeps in the vault, and the logic that makes
//! sure an OAuth profile has a usable one before it dispatches requests.
//!
//! ## Vault Format
//!
//! Tokens are stored under the `access-token` account as JSON:
//!
//! ```json
//! {"access_token":"...","refresh_token":"...","expires_at":"2026-01-12T10:00:00Z"}
//! ```
//!
//! An entry that is not JSON is read as a bare access token, so a token
//! pasted into the keyring by hand still works.
//!
//! ## Example
//!
//! ```rust
//! use bitbucket_client::auth::{MemoryVault, StoredToken};
//!
//! let vault = MemoryVault::new();
//! StoredToken::bare("abc").store(&vault, "bb:work").unwrap();
//!
//! let token = StoredToken::load(&vault, "bb:work").unwrap().unwrap();
//! assert_eq!(token.access_token, "abc");
//! assert!(!token.is_expired());
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{OAuthFlow, Profile, TokenResponse, Vault, ACCESS_TOKEN_ACCOUNT};
use crate::api::common::ApiError;

/// Tokens are treated as expired this long before their actual expiry.
const EXPIRY_LEEWAY_SECS: i64 = 60;

/// An access token as persisted in the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredToken {
    /// A token with no refresh token and no known expiry.
    pub fn bare(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Builds the stored form of a token endpoint response.
    ///
    /// `expires_in` is counted from `now`.
    pub fn from_response(response: &TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            access_token: response.access_token.clone(),
            refresh_token: response.refresh_token.clone(),
            expires_at: response
                .expires_in
                .and_then(|secs| i64::try_from(secs).ok())
                .map(|secs| now + Duration::seconds(secs)),
        }
    }

    /// Parses a vault entry, accepting JSON or a bare token.
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|_| Self::bare(raw.trim()))
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|exp| exp <= now + Duration::seconds(EXPIRY_LEEWAY_SECS))
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn load(vault: &dyn Vault, service: &str) -> Result<Option<Self>, ApiError> {
        Ok(vault
            .get(service, ACCESS_TOKEN_ACCOUNT)?
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| Self::parse(&raw)))
    }

    pub fn store(&self, vault: &dyn Vault, service: &str) -> Result<(), ApiError> {
        let raw = serde_json::to_string(self)
            .map_err(|e| ApiError::Vault(format!("failed to encode token: {e}")))?;
        vault.set(service, ACCESS_TOKEN_ACCOUNT, &raw)
    }
}

/// Makes sure an OAuth profile carries a usable access token.
///
/// Profiles without a `client_id` are left untouched. For OAuth profiles
/// the stored token is used while it is fresh; an expired token is
/// refreshed when it has a refresh token; otherwise the authorization flow
/// runs once. Any new token is written back to the vault and set on
/// `profile`.
pub async fn ensure_access_token(
    vault: &dyn Vault,
    profile: &mut Profile,
    flow: &mut OAuthFlow,
) -> Result<(), ApiError> {
    if !profile.uses_oauth() {
        return Ok(());
    }

    let service = profile.vault_service();
    let stored = StoredToken::load(vault, &service)?;

    if let Some(token) = &stored {
        if !token.is_expired() {
            debug!(profile = %profile.name, "using stored access token");
            profile.access_token = Some(token.access_token.clone());
            return Ok(());
        }
    }

    if let Some(refresh_token) = stored
        .as_ref()
        .filter(|t| t.can_refresh())
        .and_then(|t| t.refresh_token.as_deref())
    {
        info!(profile = %profile.name, "access token expired; refreshing");
        match flow.exchanger().refresh(profile, refresh_token).await {
            Ok(response) => {
                let mut token = StoredToken::from_response(&response, Utc::now());
                if token.refresh_token.is_none() {
                    token.refresh_token = Some(refresh_token.to_string());
                }
                token.store(vault, &service)?;
                profile.access_token = Some(token.access_token);
                return Ok(());
            }
            Err(e) => warn!("token refresh failed: {e}"),
        }
    }

    if profile.callback_port.is_none() {
        return Err(ApiError::configuration(format!(
            "profile '{}' has no valid access_token and no callback_port for interactive login",
            profile.name
        )));
    }

    let response = flow.run(profile).await?;
    let token = StoredToken::from_response(&response, Utc::now());
    token.store(vault, &service)?;
    profile.access_token = Some(token.access_token);
    Ok(())
}
