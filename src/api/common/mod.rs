//
//  bitbucket-client
//  api/common/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Common API Types
//!
//! This module provides the error taxonomy and wire types shared by the
//! dispatcher, the pagination engine and the OAuth flow.
//!
//! # Overview
//!
//! - [`ApiError`] - Every failure the request engine can report
//! - [`BitbucketError`] - Decoded API error body (see [`error`])
//! - [`PaginatedEnvelope`] - One page of a collection response
//!
//! # Example
//!
//! ```rust
//! use bitbucket_client::api::common::ApiError;
//!
//! fn describe(result: Result<(), ApiError>) -> &'static str {
//!     match result {
//!         Ok(()) => "ok",
//!         Err(ApiError::Configuration(_)) => "fix your profile",
//!         Err(ApiError::Transport(_)) => "check your network",
//!         Err(ApiError::Api { .. }) => "the API refused the request",
//!         Err(ApiError::MalformedResponse { .. }) => "unexpected response shape",
//!         Err(ApiError::Authorization(_)) => "log in again",
//!         Err(ApiError::Vault(_)) => "keychain unavailable",
//!     }
//! }
//!
//! assert_eq!(describe(Err(ApiError::Configuration("x".into()))), "fix your profile");
//! ```

use reqwest::StatusCode;
use thiserror::Error;

mod error;
mod pagination;

pub use error::*;
pub use pagination::*;

/// Unified error type for the request engine.
///
/// # Variants
///
/// | Variant | Raised when |
/// |---------|-------------|
/// | `Configuration` | A profile is missing, has no usable credential, or lacks a required field |
/// | `Transport` | DNS, connection or timeout failure reaching the API |
/// | `Api` | Non-2xx response; carries the decoded body |
/// | `MalformedResponse` | 2xx response whose body does not match the expected shape |
/// | `Authorization` | The interactive OAuth flow failed |
/// | `Vault` | The credential store rejected an operation |
///
/// # Notes
///
/// - `Configuration` errors are always raised before any network call.
/// - Nothing in the engine retries; every variant is returned to the caller.
#[derive(Error, Debug)]
pub enum ApiError {
    /// A profile or flag is missing or invalid.
    ///
    /// The message names the offending field.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The API could not be reached.
    ///
    /// Displays the underlying network failure text unchanged.
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("{error}")]
    Api {
        /// The HTTP status of the response.
        status: StatusCode,
        /// The decoded error body.
        error: BitbucketError,
    },

    /// A success response could not be deserialized.
    #[error("Malformed response from {url}")]
    MalformedResponse {
        /// The URL that produced the response.
        url: String,
        /// The deserialization failure.
        #[source]
        source: serde_json::Error,
    },

    /// The OAuth authorization flow failed.
    #[error("Authorization failed: {0}")]
    Authorization(String),

    /// The credential vault failed.
    #[error("Credential vault error: {0}")]
    Vault(String),
}

impl ApiError {
    /// Shorthand for [`ApiError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Shorthand for [`ApiError::Authorization`].
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization(message.into())
    }

    /// Returns the HTTP status for `Api` errors.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// Returns `true` for a 404 response.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}
