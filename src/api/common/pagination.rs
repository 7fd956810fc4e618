//
//  bitbucket-client
//  api/common/pagination.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Pagination Envelope for Bitbucket Cloud Collections
//!
//! Bitbucket Cloud uses cursor-based pagination: every collection response is
//! one page wrapped in an envelope that carries a fully-qualified `next` URL
//! while more pages remain.
//!
//! ```json
//! {
//!   "values": [ ... ],
//!   "page": 1,
//!   "pagelen": 50,
//!   "size": 113,
//!   "next": "https://api.bitbucket.org/2.0/repositories/ws?page=2"
//! }
//! ```
//!
//! [`ApiClient::get_all`](crate::api::ApiClient::get_all) walks these
//! envelopes.

use serde::{Deserialize, Serialize};

/// One page of a collection response.
///
/// # Type Parameters
///
/// - `T` - The element type contained in `values`
///
/// # Fields
///
/// | Field | Type | Description |
/// |-------|------|-------------|
/// | `values` | `Vec<T>` | Elements of this page, in server order |
/// | `page` | `Option<u32>` | Page number (1-indexed) |
/// | `page_size` | `Option<u32>` | Maximum elements per page (`pagelen` on the wire) |
/// | `size` | `Option<u32>` | Total elements across all pages |
/// | `next` | `Option<String>` | Absolute URL of the next page |
/// | `previous` | `Option<String>` | Absolute URL of the previous page |
///
/// # Example
///
/// ```rust
/// use bitbucket_client::api::common::PaginatedEnvelope;
///
/// let json = r#"{
///     "values": ["a", "b"],
///     "page": 1,
///     "pagelen": 2,
///     "size": 3,
///     "next": "https://api.bitbucket.org/2.0/things?page=2"
/// }"#;
///
/// let page: PaginatedEnvelope<String> = serde_json::from_str(json).unwrap();
/// assert_eq!(page.values.len(), 2);
/// assert!(page.next_url().is_some());
/// ```
///
/// # Notes
///
/// - `values.len()` never exceeds `page_size` for a well-formed page.
/// - An absent `next` marks the terminal page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedEnvelope<T> {
    /// Elements of the current page.
    ///
    /// May be empty when the collection itself is empty.
    #[serde(default = "Vec::new")]
    pub values: Vec<T>,

    /// Current page number (1-indexed).
    #[serde(default)]
    pub page: Option<u32>,

    /// Maximum number of elements per page.
    #[serde(default, rename = "pagelen")]
    pub page_size: Option<u32>,

    /// Total number of elements across all pages.
    ///
    /// Omitted by some endpoints for performance on large result sets.
    #[serde(default)]
    pub size: Option<u32>,

    /// URL of the next page, fetched verbatim.
    #[serde(default)]
    pub next: Option<String>,

    /// URL of the previous page.
    #[serde(default)]
    pub previous: Option<String>,
}

impl<T> PaginatedEnvelope<T> {
    /// Returns the URL for the next page of results, if any.
    pub fn next_url(&self) -> Option<&str> {
        self.next.as_deref()
    }
}
