//
//  bitbucket-client
//  context/resolver.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Repository Context Resolver
//!
//! Parses git remote URLs into [`RepoContext`] values and provides the
//! production [`RepositoryLocator`].
//!
//! ## Supported URL Formats
//!
//! - SSH: `git@bitbucket.org:workspace/repo.git`
//! - SSH URL: `ssh://git@bitbucket.org/workspace/repo.git`
//! - HTTPS: `https://bitbucket.org/workspace/repo.git`
//! - HTTPS with user: `https://user@bitbucket.org/workspace/repo`

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{GitContext, RepoContext, RepositoryLocator};
use crate::api::common::ApiError;

static SSH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@([^:/\s]+):([^/\s]+)/([^/\s]+?)(?:\.git)?/?$").unwrap()
});

static SSH_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ssh://(?:[^@/]+@)?([^:/]+)(?::\d+)?/([^/]+)/([^/]+?)(?:\.git)?/?$").unwrap()
});

static HTTPS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(?:[^@/]+@)?([^/:]+)(?::\d+)?/([^/]+)/([^/]+?)(?:\.git)?/?$").unwrap()
});

/// Parses a git remote URL into a repository context.
///
/// Returns `None` when the URL matches none of the supported formats.
pub fn parse_remote_url(url: &str) -> Option<RepoContext> {
    let url = url.trim();
    [&*SSH_PATTERN, &*SSH_URL_PATTERN, &*HTTPS_PATTERN]
        .into_iter()
        .find_map(|pattern| pattern.captures(url))
        .map(|caps| RepoContext {
            host: caps[1].to_string(),
            workspace: caps[2].to_string(),
            repo_slug: caps[3].to_string(),
        })
}

/// Locates the repository from the `origin` remote of a git checkout.
#[derive(Debug, Clone, Default)]
pub struct GitRemoteLocator {
    path: Option<PathBuf>,
}

impl GitRemoteLocator {
    /// Locator for the checkout containing the working directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Locator for the checkout containing `path`.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

impl RepositoryLocator for GitRemoteLocator {
    fn locate(&self) -> Result<RepoContext, ApiError> {
        let git = match &self.path {
            Some(path) => GitContext::open_at(path),
            None => GitContext::open(),
        }
        .map_err(|e| {
            debug!("git repository discovery failed: {e}");
            ApiError::configuration(
                "repository not specified and the current directory is not a git repository; pass --repo WORKSPACE/REPO",
            )
        })?;

        let url = git
            .origin_url()
            .ok()
            .flatten()
            .ok_or_else(|| {
                ApiError::configuration(
                    "repository not specified and no 'origin' remote is configured; pass --repo WORKSPACE/REPO",
                )
            })?;

        parse_remote_url(&url).ok_or_else(|| {
            ApiError::configuration(format!(
                "could not determine repository from origin remote '{}'; pass --repo WORKSPACE/REPO",
                url
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cloud_ssh() {
        let ctx = parse_remote_url("git@bitbucket.org:workspace/repo.git").unwrap();
        assert_eq!(ctx.host, "bitbucket.org");
        assert_eq!(ctx.workspace, "workspace");
        assert_eq!(ctx.repo_slug, "repo");
    }

    #[test]
    fn test_parse_cloud_https() {
        let ctx = parse_remote_url("https://bitbucket.org/workspace/repo.git").unwrap();
        assert_eq!(ctx.host, "bitbucket.org");
        assert_eq!(ctx.workspace, "workspace");
        assert_eq!(ctx.repo_slug, "repo");
    }

    #[test]
    fn test_parse_https_with_user_and_no_suffix() {
        let ctx = parse_remote_url("https://jdoe@bitbucket.org/team/api-server").unwrap();
        assert_eq!(ctx.full_name(), "team/api-server");
    }

    #[test]
    fn test_parse_ssh_url() {
        let ctx = parse_remote_url("ssh://git@bitbucket.org/team/tools.git").unwrap();
        assert_eq!(ctx.full_name(), "team/tools");
    }

    #[test]
    fn test_parse_rejects_unknown_format() {
        assert!(parse_remote_url("/local/path/to/repo").is_none());
        assert!(parse_remote_url("https://bitbucket.org/only-one-segment").is_none());
    }

    #[test]
    fn test_locator_reads_origin_remote() {
        let dir = tempfile::tempdir().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();
        repo.remote("origin", "https://bitbucket.org/acme/widgets.git")
            .unwrap();

        let ctx = GitRemoteLocator::at(dir.path()).locate().unwrap();
        assert_eq!(ctx.full_name(), "acme/widgets");
    }

    #[test]
    fn test_locator_without_origin_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        git2::Repository::init(dir.path()).unwrap();

        let err = GitRemoteLocator::at(dir.path()).locate().unwrap_err();
        assert!(matches!(err, ApiError::Configuration(_)));
    }
}
