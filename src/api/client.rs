//
//  bitbucket-client
//  api/client.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Authenticated Request Dispatcher
//!
//! Sends one HTTP request on behalf of a [`Profile`] and classifies the
//! outcome.
//!
//! ## Features
//!
//! - Repository path resolution (explicit hint, bare repo + default
//!   workspace, or the git `origin` remote)
//! - Bearer or Basic authentication from the profile
//! - JSON request bodies and typed response decoding
//! - Distinct errors for configuration, transport, API and malformed
//!   responses
//!
//! Nothing here retries, caches or rate-limits.

use std::fmt;
use std::time::Duration;

use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::common::{ApiError, BitbucketError};
use crate::auth::{AuthCredential, Profile};
use crate::context::{GitRemoteLocator, RepoContext, RepositoryLocator};

/// Root of the Bitbucket Cloud REST API.
pub const DEFAULT_BASE_URL: &str = "https://api.bitbucket.org/2.0";

/// Fixed timeout applied to every request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a request goes.
///
/// # Example
///
/// ```rust
/// use bitbucket_client::api::Endpoint;
///
/// // repositories/{workspace}/{repo}/pullrequests?state=OPEN
/// let prs = Endpoint::repository("acme/widgets", "pullrequests?state=OPEN");
///
/// // users/{uuid}
/// let user = Endpoint::root("users/{123}");
///
/// // a next-link, fetched verbatim
/// let next = Endpoint::absolute("https://api.bitbucket.org/2.0/repositories/acme?page=2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A path below `repositories/{workspace}/{repo}`.
    ///
    /// `repository` may be `WORKSPACE/REPO`, a bare `REPO` (completed with
    /// the profile's `default_workspace`), or empty (resolved from the git
    /// `origin` remote).
    Repository { repository: String, path: String },
    /// A path below the API root, such as `users/...` or `workspaces/...`.
    Root(String),
    /// A fully-qualified URL used as-is.
    Absolute(String),
}

impl Endpoint {
    pub fn repository(repository: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Repository {
            repository: repository.into(),
            path: path.into(),
        }
    }

    pub fn root(path: impl Into<String>) -> Self {
        Self::Root(path.into())
    }

    pub fn absolute(url: impl Into<String>) -> Self {
        Self::Absolute(url.into())
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Repository { repository, path } if repository.is_empty() => {
                write!(f, "<current repository>/{path}")
            }
            Self::Repository { repository, path } => write!(f, "{repository}/{path}"),
            Self::Root(path) => f.write_str(path),
            Self::Absolute(url) => f.write_str(url),
        }
    }
}

/// The HTTP dispatcher.
///
/// # Creating a Client
///
/// ```rust,no_run
/// use bitbucket_client::api::{ApiClient, Endpoint};
/// use bitbucket_client::auth::Profile;
///
/// # async fn example(profile: &Profile) -> Result<(), bitbucket_client::api::ApiError> {
/// let client = ApiClient::new()?;
/// let repo: serde_json::Value = client
///     .get(profile, &Endpoint::repository("acme/widgets", ""))
///     .await?;
/// println!("{}", repo["full_name"]);
/// # Ok(())
/// # }
/// ```
pub struct ApiClient {
    http: Client,
    base_url: String,
    locator: Box<dyn RepositoryLocator>,
}

impl ApiClient {
    /// Creates a client for Bitbucket Cloud that resolves the current
    /// repository from the working directory's git checkout.
    pub fn new() -> Result<Self, ApiError> {
        Ok(Self {
            http: Client::builder()
                .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
                .timeout(REQUEST_TIMEOUT)
                .build()?,
            base_url: DEFAULT_BASE_URL.to_string(),
            locator: Box::new(GitRemoteLocator::new()),
        })
    }

    /// Replaces the API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Replaces how the current repository is found.
    pub fn with_locator(mut self, locator: impl RepositoryLocator + 'static) -> Self {
        self.locator = Box::new(locator);
        self
    }

    /// Computes the absolute URL for `endpoint`.
    pub fn resolve_url(&self, profile: &Profile, endpoint: &Endpoint) -> Result<String, ApiError> {
        match endpoint {
            Endpoint::Absolute(url) => Ok(url.clone()),
            Endpoint::Root(path) => Ok(join(&self.base_url, path)),
            Endpoint::Repository { repository, path } => {
                let repo = self.resolve_repository(profile, repository)?;
                let scoped = join(
                    &self.base_url,
                    &format!("repositories/{}/{}", repo.workspace, repo.repo_slug),
                );
                Ok(join(&scoped, path))
            }
        }
    }

    fn resolve_repository(&self, profile: &Profile, hint: &str) -> Result<RepoContext, ApiError> {
        let hint = hint.trim().trim_matches('/');
        if hint.is_empty() {
            return self.locator.locate();
        }
        if let Some(repo) = RepoContext::from_slug(hint) {
            return Ok(repo);
        }
        if hint.contains('/') {
            return Err(ApiError::configuration(format!(
                "invalid repository '{hint}'; expected WORKSPACE/REPO"
            )));
        }
        match profile.default_workspace.as_deref().filter(|w| !w.is_empty()) {
            Some(workspace) => Ok(RepoContext::new(workspace, hint)),
            None => Err(ApiError::configuration(format!(
                "repository '{hint}' has no workspace; pass WORKSPACE/REPO or set default_workspace on profile '{}'",
                profile.name
            ))),
        }
    }

    /// Sends a request and decodes the JSON response into `T`.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Configuration`]: the profile has no usable credential or
    ///   the repository cannot be resolved; raised before any network call
    /// - [`ApiError::Transport`]: the API could not be reached
    /// - [`ApiError::Api`]: non-2xx status, with the decoded error body
    /// - [`ApiError::MalformedResponse`]: 2xx body that does not decode as `T`
    pub async fn send<T, B>(
        &self,
        profile: &Profile,
        method: Method,
        endpoint: &Endpoint,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let (url, text) = self.execute(profile, method, endpoint, body).await?;
        serde_json::from_str(&text).map_err(|source| ApiError::MalformedResponse { url, source })
    }

    /// Sends a request and discards the response body.
    pub async fn send_empty<B>(
        &self,
        profile: &Profile,
        method: Method,
        endpoint: &Endpoint,
        body: Option<&B>,
    ) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.execute(profile, method, endpoint, body).await.map(|_| ())
    }

    /// Sends a request and returns the response body undecoded.
    ///
    /// For endpoints whose success body may be empty or not JSON at all,
    /// such as file contents under `src/`.
    pub async fn send_text<B>(
        &self,
        profile: &Profile,
        method: Method,
        endpoint: &Endpoint,
        body: Option<&B>,
    ) -> Result<String, ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.execute(profile, method, endpoint, body)
            .await
            .map(|(_, text)| text)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        profile: &Profile,
        endpoint: &Endpoint,
    ) -> Result<T, ApiError> {
        self.send::<T, ()>(profile, Method::GET, endpoint, None).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        profile: &Profile,
        endpoint: &Endpoint,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(profile, Method::POST, endpoint, Some(body)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        profile: &Profile,
        endpoint: &Endpoint,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(profile, Method::PUT, endpoint, Some(body)).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        profile: &Profile,
        endpoint: &Endpoint,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(profile, Method::PATCH, endpoint, Some(body)).await
    }

    pub async fn delete(&self, profile: &Profile, endpoint: &Endpoint) -> Result<(), ApiError> {
        self.send_empty::<()>(profile, Method::DELETE, endpoint, None)
            .await
    }

    /// Performs the request and returns the URL and the body of a 2xx
    /// response.
    async fn execute<B>(
        &self,
        profile: &Profile,
        method: Method,
        endpoint: &Endpoint,
        body: Option<&B>,
    ) -> Result<(String, String), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let credential = AuthCredential::for_profile(profile)?;
        let url = self.resolve_url(profile, endpoint)?;

        debug!(%method, %url, profile = %profile.name, "sending request");

        let mut request = credential.apply_to_request(self.http.request(method.clone(), &url));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        debug!(%method, %url, status = status.as_u16(), "received response");

        if !status.is_success() {
            return Err(ApiError::Api {
                status,
                error: BitbucketError::from_response(status, &text),
            });
        }

        Ok((url, text))
    }
}

/// Joins `path` onto `base` with exactly one `/`; a path that is only a
/// query string is appended directly.
fn join(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else if path.starts_with('?') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}
