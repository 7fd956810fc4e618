//
//  bitbucket-client
//  api/common/error.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Structured API Error Decoding
//!
//! Bitbucket Cloud reports failures with a nested envelope:
//!
//! ```json
//! {
//!   "type": "error",
//!   "error": {
//!     "message": "Bad request",
//!     "detail": "optional longer explanation",
//!     "fields": { "links.avatar": ["required key not provided"] }
//!   }
//! }
//! ```
//!
//! [`BitbucketError::decode`] flattens that envelope into a [`BitbucketError`].
//! Bodies that do not follow the Cloud shape (Server/DC `errors` arrays, bare
//! `message` objects, OAuth `error`/`error_description` pairs, plain text) are
//! still turned into a usable value so callers always get something to show.
//!
//! # Rendering
//!
//! The `Display` form is `message[: detail][ (field: msg1, msg2; field2: msg3)]`.
//!
//! ```rust
//! use bitbucket_client::api::common::BitbucketError;
//!
//! let body = r#"{"type":"error","error":{"message":"Bad request","fields":{"name":"too long"}}}"#;
//! let error = BitbucketError::decode(body);
//! assert_eq!(error.to_string(), "Bad request (name: too long)");
//! ```

use std::collections::BTreeMap;
use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Decoded representation of an API error response body.
///
/// # Fields
///
/// | Field | Description |
/// |-------|-------------|
/// | `kind` | Discriminator from the envelope's `type` key (usually `"error"`) |
/// | `message` | Human-authored summary, always present |
/// | `detail` | Optional longer explanation |
/// | `fields` | Field path mapped to its violation messages |
///
/// # Notes
///
/// - `fields` values are always lists; a single string from the API becomes
///   a one-element list.
/// - Field order carries no meaning; rendering walks the map in key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitbucketError {
    /// The envelope's `type` discriminator.
    #[serde(rename = "type")]
    pub kind: String,

    /// Human-readable message provided by the API.
    pub message: String,

    /// Optional extended explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Per-field validation messages.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Vec<String>>,
}

#[derive(Deserialize)]
struct CloudEnvelope {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    error: CloudErrorBody,
}

#[derive(Deserialize)]
struct CloudErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    fields: Option<BTreeMap<String, FieldMessages>>,
}

/// The API sends either `"field": "msg"` or `"field": ["msg", ...]`.
/// Anything else is kept as its JSON text.
#[derive(Deserialize)]
#[serde(untagged)]
enum FieldMessages {
    One(String),
    Many(Vec<String>),
    Other(Value),
}

impl From<FieldMessages> for Vec<String> {
    fn from(messages: FieldMessages) -> Self {
        match messages {
            FieldMessages::One(message) => vec![message],
            FieldMessages::Many(messages) => messages,
            FieldMessages::Other(value) => vec![value.to_string()],
        }
    }
}

impl BitbucketError {
    /// Creates an error of type `"error"` with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: "error".to_string(),
            message: message.into(),
            detail: None,
            fields: BTreeMap::new(),
        }
    }

    /// Decodes an error response body.
    ///
    /// Never fails: a body that matches none of the known shapes produces an
    /// `"API error"` message carrying the raw body as `detail`.
    ///
    /// # Parameters
    ///
    /// * `body` - The raw response body
    ///
    /// # Example
    ///
    /// ```rust
    /// use bitbucket_client::api::common::BitbucketError;
    ///
    /// let error = BitbucketError::decode(
    ///     r#"{"type":"error","error":{"message":"Repository not found"}}"#,
    /// );
    /// assert_eq!(error.message, "Repository not found");
    /// assert!(error.fields.is_empty());
    /// ```
    pub fn decode(body: &str) -> Self {
        Self::decode_body(None, body)
    }

    /// Decodes an error response body, using the HTTP status in the fallback
    /// message when the body is not structured.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        Self::decode_body(Some(status), body)
    }

    fn decode_body(status: Option<StatusCode>, body: &str) -> Self {
        if let Ok(envelope) = serde_json::from_str::<CloudEnvelope>(body) {
            if let Some(error) = Self::from_envelope(envelope) {
                return error;
            }
        }

        if let Ok(json) = serde_json::from_str::<Value>(body) {
            if let Some(error) = Self::from_loose_json(&json) {
                return error;
            }
        }

        let message = match status {
            Some(status) => format!("API error ({})", status),
            None => "API error".to_string(),
        };
        let body = body.trim();
        Self {
            detail: (!body.is_empty()).then(|| body.to_string()),
            ..Self::new(message)
        }
    }

    fn from_envelope(envelope: CloudEnvelope) -> Option<Self> {
        let CloudErrorBody {
            message,
            mut detail,
            fields,
        } = envelope.error;

        // {"error": {"detail": "..."}} is sent by a handful of endpoints
        let message = match message {
            Some(message) => message,
            None => detail.take()?,
        };

        Some(Self {
            kind: envelope.kind.unwrap_or_else(|| "error".to_string()),
            message,
            detail,
            fields: fields
                .unwrap_or_default()
                .into_iter()
                .map(|(field, messages)| (field, messages.into()))
                .collect(),
        })
    }

    fn from_loose_json(json: &Value) -> Option<Self> {
        // Server/DC: {"errors": [{"message": "..."}]}
        if let Some(errors) = json.get("errors").and_then(Value::as_array) {
            let messages: Vec<&str> = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect();
            if !messages.is_empty() {
                return Some(Self::new(messages.join("; ")));
            }
        }

        // OAuth endpoints: {"error": "invalid_grant", "error_description": "..."}
        if let Some(code) = json.get("error").and_then(Value::as_str) {
            return Some(Self {
                detail: json
                    .get("error_description")
                    .and_then(Value::as_str)
                    .map(String::from),
                ..Self::new(code)
            });
        }

        json.get("message")
            .and_then(Value::as_str)
            .map(|message| Self::new(message))
    }
}

impl fmt::Display for BitbucketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;

        if let Some(detail) = &self.detail {
            write!(f, ": {}", detail)?;
        }

        if !self.fields.is_empty() {
            let rendered: Vec<String> = self
                .fields
                .iter()
                .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
                .collect();
            write!(f, " ({})", rendered.join("; "))?;
        }

        Ok(())
    }
}

impl std::error::Error for BitbucketError {}
