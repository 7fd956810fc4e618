//
//  bitbucket-client
//  auth/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Authentication Module
//!
//! Profiles, credentials and the interactive OAuth login.
//!
//! ## Supported Authentication Methods
//!
//! - **Access token**: sent as `Authorization: Bearer <token>`. OAuth
//!   profiles obtain theirs through the authorization code flow.
//! - **User + app password**: sent as HTTP Basic.
//!
//! ## Module Structure
//!
//! - [`profile`]: [`Profile`] and the [`ProfileRegistry`]
//! - [`vault`]: Secret storage behind the [`Vault`] trait
//! - [`callback`]: Local HTTP server receiving the OAuth redirect
//! - [`oauth`]: The [`OAuthFlow`] state machine and token exchange
//! - [`token`]: Stored tokens and [`ensure_access_token`]
//!
//! ## Example
//!
//! ```rust
//! use bitbucket_client::auth::{AuthCredential, Profile};
//!
//! let profile = Profile {
//!     name: "ci".to_string(),
//!     user: Some("build-bot".to_string()),
//!     password: Some("app-password".to_string()),
//!     ..Default::default()
//! };
//!
//! let credential = AuthCredential::for_profile(&profile).unwrap();
//! assert!(matches!(credential, AuthCredential::Basic { .. }));
//! ```

mod callback;
mod oauth;
mod profile;
mod token;
mod vault;

#[cfg(test)]
pub(crate) mod testing;

pub use callback::*;
pub use oauth::*;
pub use profile::*;
pub use token::*;
pub use vault::*;

use reqwest::RequestBuilder;

use crate::api::common::ApiError;

/// The credential attached to a request.
#[derive(Clone)]
pub enum AuthCredential {
    /// OAuth or personal access token.
    Bearer { token: String },
    /// Username and app password.
    Basic { username: String, password: String },
}

impl AuthCredential {
    /// Resolves the credential a profile dispatches with.
    ///
    /// A client-credential profile must already hold a token (see
    /// [`ensure_access_token`]).
    ///
    /// # Errors
    ///
    /// [`ApiError::Configuration`] naming the missing field. Nothing here
    /// touches the network.
    pub fn for_profile(profile: &Profile) -> Result<Self, ApiError> {
        profile.validate()?;

        if let Some(token) = profile.access_token.as_deref().filter(|t| !t.is_empty()) {
            return Ok(Self::Bearer {
                token: token.to_string(),
            });
        }

        if let (Some(username), Some(password)) = (&profile.user, &profile.password) {
            return Ok(Self::Basic {
                username: username.clone(),
                password: password.clone(),
            });
        }

        Err(ApiError::configuration(format!(
            "profile '{}' has no access_token; run `bb auth login --profile {}`",
            profile.name, profile.name
        )))
    }

    /// Adds the `Authorization` header to `request`.
    pub fn apply_to_request(&self, request: RequestBuilder) -> RequestBuilder {
        match self {
            Self::Bearer { token } => request.bearer_auth(token),
            Self::Basic { username, password } => request.basic_auth(username, Some(password)),
        }
    }
}

impl std::fmt::Debug for AuthCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bearer { .. } => f.write_str("Bearer(<redacted>)"),
            Self::Basic { username, .. } => write!(f, "Basic({username}, <redacted>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicting_credentials_are_rejected_before_dispatch() {
        let profile = Profile {
            name: "p".into(),
            access_token: Some("t".into()),
            user: Some("u".into()),
            password: Some("pw".into()),
            ..Default::default()
        };
        assert!(matches!(
            AuthCredential::for_profile(&profile),
            Err(ApiError::Configuration(ref m)) if m.contains("conflicting")
        ));
    }

    #[test]
    fn test_oauth_profile_dispatches_with_issued_token() {
        let profile = Profile {
            name: "oauth".into(),
            client_id: Some("key".into()),
            client_secret: Some("shh".into()),
            access_token: Some("issued".into()),
            ..Default::default()
        };
        assert!(matches!(
            AuthCredential::for_profile(&profile).unwrap(),
            AuthCredential::Bearer { token } if token == "issued"
        ));
    }

    #[test]
    fn test_client_credentials_without_token_name_access_token() {
        let profile = Profile {
            name: "oauth".into(),
            client_id: Some("key".into()),
            client_secret: Some("shh".into()),
            ..Default::default()
        };
        let err = AuthCredential::for_profile(&profile).unwrap_err();
        assert!(matches!(err, ApiError::Configuration(ref m) if m.contains("access_token")));
    }

    #[test]
    fn test_placeholder_has_no_credential() {
        assert!(matches!(
            AuthCredential::for_profile(&Profile::placeholder()),
            Err(ApiError::Configuration(_))
        ));
    }
}
