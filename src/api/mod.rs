//
//  bitbucket-client
//  api/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # API Client Layer
//!
//! The request engine for the Bitbucket Cloud REST API (v2.0 at
//! `api.bitbucket.org`).
//!
//! ## Architecture
//!
//! - [`client`]: [`ApiClient`], which sends one authenticated request for a
//!   profile and classifies the outcome
//! - `pagination`: [`ApiClient::get_all`], which walks `next` links until a
//!   collection is exhausted
//! - [`common`]: [`ApiError`], the error body decoder and the page envelope
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bitbucket_client::api::{ApiClient, Endpoint};
//! use bitbucket_client::auth::Profile;
//!
//! # async fn example() -> Result<(), bitbucket_client::api::ApiError> {
//! let profile = Profile {
//!     name: "work".to_string(),
//!     access_token: Some("token".to_string()),
//!     ..Default::default()
//! };
//!
//! let client = ApiClient::new()?;
//! let prs: Vec<serde_json::Value> = client
//!     .get_all(&profile, &Endpoint::repository("acme/widgets", "pullrequests"))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every failure is an [`ApiError`]. Configuration problems surface before
//! the network is touched; nothing is retried.

pub mod client;
pub mod common;
mod pagination;

pub use client::{ApiClient, Endpoint, DEFAULT_BASE_URL, REQUEST_TIMEOUT};
pub use common::{ApiError, BitbucketError};
