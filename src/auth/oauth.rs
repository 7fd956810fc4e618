//
//  bitbucket-client
//  auth/oauth.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # OAuth 2.0 Authentication Module
//!
//! This module implements the OAuth 2.0 authorization code flow with PKCE for Bitbucket Cloud
//! authentication.
//!
//! ## OAuth Flow Overview
//!
//! [`OAuthFlow::run`] walks a short state machine ([`FlowState`]):
//!
//! 1. **Idle → ServerStarted**: Bind the local callback server on the profile's `callback_port`
//! 2. **ServerStarted → AwaitingCallback**: Open the browser at Bitbucket's authorization URL
//! 3. **AwaitingCallback → Completed**: Receive the code (or the provider's error) from the
//!    callback, then stop the server
//! 4. **Token Exchange**: Exchange the code for access/refresh tokens through a [`TokenExchanger`]
//!
//! The callback server is stopped on every exit path: success, denial,
//! browser failure, timeout, Ctrl-C, and cancellation of the `run` future.
//!
//! ## Example
//!
//! ```rust,no_run
//! use bitbucket_client::auth::{HttpTokenExchanger, OAuthFlow, Profile, SystemBrowser};
//!
//! async fn authenticate(profile: &Profile) -> Result<(), bitbucket_client::api::ApiError> {
//!     let mut flow = OAuthFlow::new(SystemBrowser, HttpTokenExchanger::new()?);
//!     let tokens = flow.run(profile).await?;
//!     println!("Token expires in {:?} seconds", tokens.expires_in);
//!     Ok(())
//! }
//! ```
//!
//! ## Security Considerations
//!
//! - PKCE (Proof Key for Code Exchange) is used for all OAuth flows
//! - A random `state` parameter ties the callback to this login attempt
//! - Store client secrets in the vault; never commit them to version control

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use url::Url;

use super::{AuthorizationResult, CallbackServer, Profile};
use crate::api::common::{ApiError, BitbucketError};

/// Bitbucket Cloud OAuth authorization endpoint.
pub const AUTHORIZE_URL: &str = "https://bitbucket.org/site/oauth2/authorize";

/// Bitbucket Cloud OAuth token endpoint.
pub const TOKEN_URL: &str = "https://bitbucket.org/site/oauth2/access_token";

/// How long the flow waits for the browser to come back.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Where an [`OAuthFlow`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    ServerStarted,
    AwaitingCallback,
    Completed,
}

/// Opens a URL in the user's browser.
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> std::io::Result<()>;
}

/// Launches the platform's default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserLauncher for SystemBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        eprintln!("Opening browser for authentication...");
        eprintln!("If the browser doesn't open, visit this URL:");
        eprintln!("{url}");
        webbrowser::open(url)
    }
}

/// Tokens returned by the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    /// Lifetime of the access token in seconds.
    pub expires_in: Option<u64>,
    /// Scopes actually granted; may be fewer than requested.
    pub scopes: Vec<String>,
}

#[derive(Deserialize)]
struct TokenResponseRaw {
    access_token: String,
    refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    token_type: String,
    expires_in: Option<u64>,
    scopes: Option<String>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl From<TokenResponseRaw> for TokenResponse {
    fn from(raw: TokenResponseRaw) -> Self {
        let scopes = raw
            .scopes
            .map(|s| s.split_whitespace().map(String::from).collect())
            .unwrap_or_default();

        Self {
            access_token: raw.access_token,
            refresh_token: raw.refresh_token,
            token_type: raw.token_type,
            expires_in: raw.expires_in,
            scopes,
        }
    }
}

/// What the token endpoint needs to redeem an authorization code.
#[derive(Debug, Clone)]
pub struct AuthorizationGrant {
    pub code: String,
    pub code_verifier: String,
    pub redirect_uri: String,
}

/// Converts authorization codes and refresh tokens into access tokens.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(
        &self,
        profile: &Profile,
        grant: &AuthorizationGrant,
    ) -> Result<TokenResponse, ApiError>;

    async fn refresh(&self, profile: &Profile, refresh_token: &str)
        -> Result<TokenResponse, ApiError>;
}

/// Token exchange against Bitbucket's token endpoint.
///
/// The client authenticates with HTTP Basic (`client_id` and
/// `client_secret`).
#[derive(Debug, Clone)]
pub struct HttpTokenExchanger {
    http: Client,
    token_url: String,
}

impl HttpTokenExchanger {
    pub fn new() -> Result<Self, ApiError> {
        Ok(Self {
            http: Client::builder()
                .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
                .timeout(crate::api::REQUEST_TIMEOUT)
                .build()?,
            token_url: TOKEN_URL.to_string(),
        })
    }

    /// Points the exchanger at a different token endpoint.
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    async fn request<'a>(
        &self,
        profile: &'a Profile,
        params: Vec<(&'static str, &'a str)>,
        action: &str,
    ) -> Result<TokenResponse, ApiError> {
        let client_id = require_client_id(profile)?;
        let secret = profile
            .client_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ApiError::configuration(format!(
                    "profile '{}' has no client_secret",
                    profile.name
                ))
            })?;

        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(client_id, Some(secret))
            .form(&params)
            .send()
            .await
            .map_err(|e| ApiError::authorization(format!("{action} failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::authorization(format!("{action} failed: {e}")))?;

        if !status.is_success() {
            return Err(ApiError::authorization(format!(
                "{action} failed ({status}): {}",
                BitbucketError::from_response(status, &body)
            )));
        }

        let raw: TokenResponseRaw = serde_json::from_str(&body).map_err(|e| {
            ApiError::authorization(format!("{action} returned an unreadable response: {e}"))
        })?;
        Ok(raw.into())
    }
}

#[async_trait]
impl TokenExchanger for HttpTokenExchanger {
    async fn exchange(
        &self,
        profile: &Profile,
        grant: &AuthorizationGrant,
    ) -> Result<TokenResponse, ApiError> {
        let params = vec![
            ("grant_type", "authorization_code"),
            ("code", grant.code.as_str()),
            ("redirect_uri", grant.redirect_uri.as_str()),
            ("code_verifier", grant.code_verifier.as_str()),
        ];
        self.request(profile, params, "token exchange").await
    }

    async fn refresh(
        &self,
        profile: &Profile,
        refresh_token: &str,
    ) -> Result<TokenResponse, ApiError> {
        let params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        self.request(profile, params, "token refresh").await
    }
}

/// PKCE (Proof Key for Code Exchange) challenge data.
struct PkceChallenge {
    /// High-entropy random string sent on exchange.
    verifier: String,
    /// SHA256 of the verifier, base64url encoded.
    challenge: String,
}

impl PkceChallenge {
    fn new() -> Self {
        let verifier = random_token();

        let mut hasher = Sha256::new();
        hasher.update(verifier.as_bytes());
        let challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());

        Self {
            verifier,
            challenge,
        }
    }
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn require_client_id(profile: &Profile) -> Result<&str, ApiError> {
    profile
        .client_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            ApiError::configuration(format!("profile '{}' has no client_id", profile.name))
        })
}

/// Interactive authorization code login.
pub struct OAuthFlow {
    browser: Box<dyn BrowserLauncher>,
    exchanger: Box<dyn TokenExchanger>,
    authorize_url: String,
    callback_timeout: Duration,
    state: FlowState,
}

impl OAuthFlow {
    pub fn new(
        browser: impl BrowserLauncher + 'static,
        exchanger: impl TokenExchanger + 'static,
    ) -> Self {
        Self {
            browser: Box::new(browser),
            exchanger: Box::new(exchanger),
            authorize_url: AUTHORIZE_URL.to_string(),
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
            state: FlowState::Idle,
        }
    }

    pub fn with_authorize_url(mut self, url: impl Into<String>) -> Self {
        self.authorize_url = url.into();
        self
    }

    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn exchanger(&self) -> &dyn TokenExchanger {
        self.exchanger.as_ref()
    }

    /// Runs one login for `profile` and returns the exchanged tokens.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Configuration`] when the profile has no `client_id` or
    ///   no `callback_port`; nothing is bound in that case
    /// - [`ApiError::Authorization`] for bind failure, browser failure,
    ///   denial, state mismatch, timeout, interruption, or a failed exchange
    pub async fn run(&mut self, profile: &Profile) -> Result<TokenResponse, ApiError> {
        self.state = FlowState::Idle;

        let client_id = require_client_id(profile)?;
        let port = profile.callback_port.ok_or_else(|| {
            ApiError::configuration(format!(
                "profile '{}' has no callback_port; interactive login is not enabled",
                profile.name
            ))
        })?;

        let pkce = PkceChallenge::new();
        let state_token = random_token();

        let mut server = CallbackServer::bind(port, Some(state_token.clone())).await?;
        self.state = FlowState::ServerStarted;

        let redirect_uri = server.redirect_uri();
        let outcome = self
            .await_callback(&mut server, client_id, &redirect_uri, &pkce, &state_token)
            .await;

        server.shutdown().await;
        self.state = FlowState::Completed;

        let code = match outcome? {
            AuthorizationResult::Granted { code } => code,
            AuthorizationResult::Denied { error, description } => {
                return Err(ApiError::authorization(match description {
                    Some(description) => format!("{error}: {description}"),
                    None => error,
                }));
            }
        };

        info!("authorization received; exchanging code for tokens");
        let grant = AuthorizationGrant {
            code,
            code_verifier: pkce.verifier,
            redirect_uri,
        };
        self.exchanger.exchange(profile, &grant).await
    }

    async fn await_callback(
        &mut self,
        server: &mut CallbackServer,
        client_id: &str,
        redirect_uri: &str,
        pkce: &PkceChallenge,
        state_token: &str,
    ) -> Result<AuthorizationResult, ApiError> {
        let url = self.authorization_url(client_id, redirect_uri, pkce, state_token)?;

        self.browser
            .open(url.as_str())
            .map_err(|e| ApiError::authorization(format!("could not open browser: {e}")))?;
        self.state = FlowState::AwaitingCallback;
        debug!("waiting for OAuth callback on {redirect_uri}");

        tokio::select! {
            result = server.wait(self.callback_timeout) => result,
            _ = interrupted() => Err(ApiError::authorization(
                "interrupted while waiting for the browser callback",
            )),
        }
    }

    fn authorization_url(
        &self,
        client_id: &str,
        redirect_uri: &str,
        pkce: &PkceChallenge,
        state_token: &str,
    ) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.authorize_url).map_err(|e| {
            ApiError::configuration(format!(
                "invalid authorize URL '{}': {e}",
                self.authorize_url
            ))
        })?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("code_challenge", &pkce.challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("state", state_token);
        Ok(url)
    }
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
