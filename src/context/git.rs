//
//  bitbucket-client
//  context/git.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Git Repository Operations
//!
//! Thin wrapper over `git2` for the one question the client asks of the local
//! checkout: where does `origin` point?
//!
//! ## Notes
//!
//! - Uses libgit2 via the `git2` crate for reliable cross-platform support
//! - [`GitContext::open`] walks up from the working directory to find the
//!   repository root

use anyhow::Result;
use git2::Repository;

pub struct GitContext {
    repo: Repository,
}

impl GitContext {
    pub fn open() -> Result<Self> {
        let repo = Repository::discover(".")?;
        Ok(Self { repo })
    }

    pub fn open_at(path: &std::path::Path) -> Result<Self> {
        let repo = Repository::discover(path)?;
        Ok(Self { repo })
    }

    pub fn remote_url(&self, name: &str) -> Result<Option<String>> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(|s| s.to_string())),
            Err(_) => Ok(None),
        }
    }

    pub fn origin_url(&self) -> Result<Option<String>> {
        self.remote_url("origin")
    }
}
