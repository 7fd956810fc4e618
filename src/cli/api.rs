//
//  bitbucket-client
//  cli/api.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Direct API access command
//!
//! Sends authenticated requests to arbitrary endpoints, similar to `gh api`.
//! Paths are relative to the current repository unless `--root` is given or
//! they start with `/2.0/`.
//!
//! ## Examples
//!
//! ```bash
//! # Repository of the current checkout
//! bb api ""
//!
//! # Open pull requests of another repository, every page
//! bb api --repo acme/widgets "pullrequests?state=OPEN" --paginate
//!
//! # Sibling roots
//! bb api --root user workspaces
//!
//! # Create an issue
//! bb api -X POST issues -F title="Bug report" -F content.raw="Details"
//! ```

use std::fs;

use anyhow::{bail, Result};
use clap::Args;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::api::{ApiClient, ApiError, Endpoint};
use crate::auth::{ErrorProcessing, KeyringVault, Profile};
use crate::config::Config;
use crate::output::OutputWriter;

use super::GlobalOptions;

#[derive(Args, Debug, Default)]
pub struct ApiCommand {
    /// Endpoints to request, in order
    #[arg(required = true)]
    pub endpoints: Vec<String>,

    /// HTTP method
    #[arg(long, short = 'X', default_value = "GET")]
    pub method: String,

    /// Body field as key=value; values are typed as JSON where possible
    #[arg(long, short = 'F', action = clap::ArgAction::Append)]
    pub field: Vec<String>,

    /// Body field as key=value, always a string
    #[arg(long, action = clap::ArgAction::Append)]
    pub raw_field: Vec<String>,

    /// Read the JSON body from a file ("-" for stdin)
    #[arg(long, short = 'f')]
    pub input: Option<String>,

    /// Fetch every page and print the combined values
    #[arg(long)]
    pub paginate: bool,

    /// Resolve paths against the API root instead of the repository
    #[arg(long)]
    pub root: bool,
}

impl ApiCommand {
    pub async fn run(&self, global: &GlobalOptions) -> Result<()> {
        let method = self.parse_method()?;
        if self.paginate && method != Method::GET {
            bail!("--paginate only applies to GET requests");
        }
        let body = self.build_body()?;

        let vault = KeyringVault::new();
        let config = Config::load()?;
        let mut profile = global.load_profile(&config, &vault)?;
        global.authorize(&mut profile, &vault).await?;

        let client = global.api_client()?;
        let writer = global.output(&profile);
        let repository = global.repo.clone().unwrap_or_default();

        self.execute_all(&client, &profile, &writer, &method, &repository, body.as_ref())
            .await
    }

    /// Requests every endpoint, applying the profile's error policy.
    async fn execute_all(
        &self,
        client: &ApiClient,
        profile: &Profile,
        writer: &OutputWriter,
        method: &Method,
        repository: &str,
        body: Option<&Value>,
    ) -> Result<()> {
        for raw in &self.endpoints {
            let endpoint = parse_endpoint(raw, self.root, repository);
            match self.execute(client, profile, method, &endpoint, body).await {
                Ok(Reply::Json(value)) => writer.write(&value)?,
                Ok(Reply::Text(text)) => println!("{}", text.trim_end()),
                Ok(Reply::Empty) => writer.write_success(&format!("{method} {endpoint}")),
                Err(e) => match profile.error_processing {
                    ErrorProcessing::Stop => {
                        return Err(anyhow::Error::new(e).context(format!("{method} {endpoint}")))
                    }
                    ErrorProcessing::Warn => writer.write_warning(&format!("{endpoint}: {e}")),
                    ErrorProcessing::Ignore => debug!(%endpoint, "ignoring failed request: {e}"),
                },
            }
        }
        Ok(())
    }

    async fn execute(
        &self,
        client: &ApiClient,
        profile: &Profile,
        method: &Method,
        endpoint: &Endpoint,
        body: Option<&Value>,
    ) -> Result<Reply, ApiError> {
        if self.paginate {
            let values: Vec<Value> = client.get_all(profile, endpoint).await?;
            return Ok(Reply::Json(Value::Array(values)));
        }
        if *method == Method::DELETE {
            client
                .send_empty(profile, method.clone(), endpoint, body)
                .await?;
            return Ok(Reply::Empty);
        }
        let text = client
            .send_text(profile, method.clone(), endpoint, body)
            .await?;
        Ok(Reply::from_body(text))
    }

    fn parse_method(&self) -> Result<Method> {
        match self.method.to_uppercase().as_str() {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "PATCH" => Ok(Method::PATCH),
            "DELETE" => Ok(Method::DELETE),
            _ => bail!("Unsupported HTTP method: {}", self.method),
        }
    }

    fn build_body(&self) -> Result<Option<Value>> {
        if let Some(input) = &self.input {
            let content = if input == "-" {
                let mut buffer = String::new();
                std::io::Read::read_to_string(&mut std::io::stdin(), &mut buffer)?;
                buffer
            } else {
                fs::read_to_string(input)?
            };
            return Ok(Some(serde_json::from_str(&content)?));
        }

        if self.field.is_empty() && self.raw_field.is_empty() {
            return Ok(None);
        }

        let mut body = serde_json::Map::new();
        for field in &self.field {
            let (key, value) = split_field(field)?;
            set_nested_value(&mut body, key, typed_value(value));
        }
        for field in &self.raw_field {
            let (key, value) = split_field(field)?;
            set_nested_value(&mut body, key, Value::String(value.to_string()));
        }
        Ok(Some(Value::Object(body)))
    }
}

/// A successful response, as printed by `bb api`.
#[derive(Debug, PartialEq)]
enum Reply {
    Json(Value),
    /// Non-JSON body, printed verbatim.
    Text(String),
    Empty,
}

impl Reply {
    fn from_body(text: String) -> Self {
        if text.trim().is_empty() {
            return Self::Empty;
        }
        match serde_json::from_str(&text) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Text(text),
        }
    }
}

/// Turns a command-line path into an [`Endpoint`].
///
/// Full URLs are used verbatim. A leading `/2.0` (or `root`) makes the path
/// relative to the API root; anything else is below the repository.
fn parse_endpoint(raw: &str, root: bool, repository: &str) -> Endpoint {
    let raw = raw.trim();
    if raw.starts_with("http://") || raw.starts_with("https://") {
        return Endpoint::absolute(raw);
    }

    let versioned = raw
        .strip_prefix("/2.0")
        .filter(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'));
    let path = versioned.unwrap_or(raw).trim_start_matches('/');

    if root || versioned.is_some() {
        Endpoint::root(path)
    } else {
        Endpoint::repository(repository, path)
    }
}

fn split_field(field: &str) -> Result<(&str, &str)> {
    match field.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key, value)),
        _ => bail!("Invalid field format: {}. Expected key=value", field),
    }
}

fn typed_value(raw: &str) -> Value {
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => {
            if let Ok(n) = raw.parse::<i64>() {
                Value::Number(n.into())
            } else if raw.starts_with('[') || raw.starts_with('{') {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
            } else {
                Value::String(raw.to_string())
            }
        }
    }
}

/// Inserts `value` at a dotted `key` path, creating objects on the way.
fn set_nested_value(obj: &mut serde_json::Map<String, Value>, key: &str, value: Value) {
    match key.split_once('.') {
        None => {
            obj.insert(key.to_string(), value);
        }
        Some((first, rest)) => {
            let nested = obj
                .entry(first.to_string())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            if !nested.is_object() {
                *nested = Value::Object(serde_json::Map::new());
            }
            if let Value::Object(nested) = nested {
                set_nested_value(nested, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::OutputFormat;
    use crate::context::RepoContext;
    use serde_json::json;

    fn command(endpoints: &[&str]) -> ApiCommand {
        ApiCommand {
            endpoints: endpoints.iter().map(|e| e.to_string()).collect(),
            method: "GET".into(),
            ..Default::default()
        }
    }

    fn profile(policy: ErrorProcessing) -> Profile {
        Profile {
            name: "test".into(),
            access_token: Some("t".into()),
            error_processing: policy,
            ..Default::default()
        }
    }

    fn client(base: &str) -> ApiClient {
        ApiClient::new()
            .unwrap()
            .with_base_url(base)
            .with_locator(RepoContext::new("acme", "widgets"))
    }

    fn writer() -> OutputWriter {
        OutputWriter::new(OutputFormat::Json).with_color(false)
    }

    #[test]
    fn test_parse_endpoint() {
        assert_eq!(
            parse_endpoint("pullrequests", false, "acme/widgets"),
            Endpoint::repository("acme/widgets", "pullrequests")
        );
        assert_eq!(
            parse_endpoint("/2.0/repositories/acme", false, ""),
            Endpoint::root("repositories/acme")
        );
        assert_eq!(parse_endpoint("/user", true, ""), Endpoint::root("user"));
        assert_eq!(
            parse_endpoint("/2.0x/odd", false, ""),
            Endpoint::repository("", "2.0x/odd")
        );
        assert_eq!(
            parse_endpoint("https://api.bitbucket.org/2.0/user", false, ""),
            Endpoint::absolute("https://api.bitbucket.org/2.0/user")
        );
    }

    #[test]
    fn test_parse_method() {
        let mut cmd = command(&["x"]);
        cmd.method = "patch".into();
        assert_eq!(cmd.parse_method().unwrap(), Method::PATCH);
        cmd.method = "TRACE".into();
        assert!(cmd.parse_method().is_err());
    }

    #[test]
    fn test_build_body_from_fields() {
        let cmd = ApiCommand {
            field: vec![
                "title=Bug".into(),
                "content.raw=Details".into(),
                "priority=3".into(),
                "private=true".into(),
            ],
            raw_field: vec!["version=3".into()],
            ..command(&["issues"])
        };
        assert_eq!(
            cmd.build_body().unwrap(),
            Some(json!({
                "title": "Bug",
                "content": {"raw": "Details"},
                "priority": 3,
                "private": true,
                "version": "3"
            }))
        );
        assert_eq!(command(&["x"]).build_body().unwrap(), None);

        let bad = ApiCommand {
            field: vec!["novalue".into()],
            ..command(&["x"])
        };
        assert!(bad.build_body().is_err());
    }

    #[tokio::test]
    async fn test_stop_policy_aborts_on_first_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repositories/acme/widgets/missing")
            .with_status(404)
            .with_body(r#"{"type":"error","error":{"message":"Not found"}}"#)
            .create_async()
            .await;
        let never = server
            .mock("GET", "/repositories/acme/widgets/issues")
            .expect(0)
            .create_async()
            .await;

        let err = command(&["missing", "issues"])
            .execute_all(
                &client(&server.url()),
                &profile(ErrorProcessing::Stop),
                &writer(),
                &Method::GET,
                "",
                None,
            )
            .await
            .unwrap_err();

        never.assert_async().await;
        assert!(err.downcast_ref::<ApiError>().is_some_and(ApiError::is_not_found));
    }

    #[tokio::test]
    async fn test_warn_policy_continues() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repositories/acme/widgets/missing")
            .with_status(404)
            .with_body(r#"{"type":"error","error":{"message":"Not found"}}"#)
            .create_async()
            .await;
        let reached = server
            .mock("GET", "/repositories/acme/widgets/issues")
            .with_status(200)
            .with_body(r#"{"values": []}"#)
            .expect(2)
            .create_async()
            .await;

        for policy in [ErrorProcessing::Warn, ErrorProcessing::Ignore] {
            command(&["missing", "issues"])
                .execute_all(
                    &client(&server.url()),
                    &profile(policy),
                    &writer(),
                    &Method::GET,
                    "",
                    None,
                )
                .await
                .unwrap();
        }
        reached.assert_async().await;
    }

    #[test]
    fn test_reply_from_body() {
        assert_eq!(Reply::from_body(String::new()), Reply::Empty);
        assert_eq!(Reply::from_body(" \n".into()), Reply::Empty);
        assert_eq!(
            Reply::from_body(r#"{"id": 1}"#.into()),
            Reply::Json(json!({"id": 1}))
        );
        assert_eq!(
            Reply::from_body("fn main() {}\n".into()),
            Reply::Text("fn main() {}\n".into())
        );
    }

    #[tokio::test]
    async fn test_put_with_no_content_succeeds() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/repositories/acme/widgets/issues/1/vote")
            .match_header("authorization", "Bearer t")
            .with_status(204)
            .create_async()
            .await;

        command(&["issues/1/vote"])
            .execute_all(
                &client(&server.url()),
                &profile(ErrorProcessing::Stop),
                &writer(),
                &Method::PUT,
                "",
                None,
            )
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_plain_text_body_is_returned_verbatim() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repositories/acme/widgets/src/main/src/lib.rs")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("pub mod api;\n")
            .create_async()
            .await;

        let reply = command(&["src/main/src/lib.rs"])
            .execute(
                &client(&server.url()),
                &profile(ErrorProcessing::Stop),
                &Method::GET,
                &Endpoint::repository("", "src/main/src/lib.rs"),
                None,
            )
            .await
            .unwrap();
        assert_eq!(reply, Reply::Text("pub mod api;\n".into()));
    }

    #[tokio::test]
    async fn test_delete_discards_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/repositories/acme/widgets/issues/1")
            .match_header("authorization", "Bearer t")
            .with_status(204)
            .create_async()
            .await;

        command(&["issues/1"])
            .execute_all(
                &client(&server.url()),
                &profile(ErrorProcessing::Stop),
                &writer(),
                &Method::DELETE,
                "",
                None,
            )
            .await
            .unwrap();
        mock.assert_async().await;
    }
}
