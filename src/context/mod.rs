//
//  bitbucket-client
//  context/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Repository Context Module
//!
//! Resolves the `workspace/repository` pair that repository-scoped API calls
//! are made against.
//!
//! ## Overview
//!
//! The dispatcher only needs one thing from this module: a
//! [`RepositoryLocator`] it can ask for the current repository when a command
//! did not name one. The production locator, [`GitRemoteLocator`], reads the
//! `origin` remote of the git repository containing the working directory.
//!
//! ## Architecture
//!
//! - [`GitContext`]: Low-level git repository operations
//! - [`GitRemoteLocator`]: Remote URL parsing and origin lookup
//! - [`RepoContext`]: The resolved repository information
//!
//! ## Example
//!
//! ```rust
//! use bitbucket_client::context::{RepoContext, RepositoryLocator};
//!
//! let fixed = RepoContext::from_slug("myworkspace/my-repo").unwrap();
//! let located = fixed.locate().unwrap();
//! assert_eq!(located.full_name(), "myworkspace/my-repo");
//! ```

mod git;
mod resolver;

pub use git::*;
pub use resolver::*;

use crate::api::common::ApiError;

/// A resolved `workspace/repository` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoContext {
    /// Host the repository lives on (e.g. `bitbucket.org`).
    pub host: String,
    /// Workspace slug.
    pub workspace: String,
    /// Repository slug.
    pub repo_slug: String,
}

impl RepoContext {
    /// Creates a context on `bitbucket.org`.
    pub fn new(workspace: impl Into<String>, repo_slug: impl Into<String>) -> Self {
        Self {
            host: crate::config::BITBUCKET_CLOUD.to_string(),
            workspace: workspace.into(),
            repo_slug: repo_slug.into(),
        }
    }

    /// Parses a `WORKSPACE/REPO` argument.
    ///
    /// Returns `None` unless the input has exactly two non-empty segments.
    pub fn from_slug(slug: &str) -> Option<Self> {
        let (workspace, repo) = slug.trim_matches('/').split_once('/')?;
        if workspace.is_empty() || repo.is_empty() || repo.contains('/') {
            return None;
        }
        Some(Self::new(workspace, repo))
    }

    /// Returns `workspace/repository`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.workspace, self.repo_slug)
    }
}

/// Supplies the repository a command runs against when none was named.
///
/// Implementations report failures as [`ApiError::Configuration`]: a missing
/// repository is a flag the user did not provide, not a runtime failure.
pub trait RepositoryLocator: Send + Sync {
    /// Returns the current repository.
    fn locate(&self) -> Result<RepoContext, ApiError>;
}

impl RepositoryLocator for RepoContext {
    fn locate(&self) -> Result<RepoContext, ApiError> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slug() {
        let ctx = RepoContext::from_slug("workspace/repo").unwrap();
        assert_eq!(ctx.workspace, "workspace");
        assert_eq!(ctx.repo_slug, "repo");
        assert_eq!(ctx.host, "bitbucket.org");
    }

    #[test]
    fn test_from_slug_rejects_malformed_input() {
        assert!(RepoContext::from_slug("repo").is_none());
        assert!(RepoContext::from_slug("/repo").is_none());
        assert!(RepoContext::from_slug("a/b/c").is_none());
    }
}
