//
//  bitbucket-client
//  auth/callback.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Local callback server for the OAuth authorization code flow.
//!
//! The server listens on `http://localhost:{port}/` and hands the first
//! callback it receives to the waiting flow through a one-shot rendezvous.
//! Later hits are answered with an HTML page but never change what the
//! flow sees.
//!
//! The server stops on [`CallbackServer::shutdown`] or when it is dropped,
//! whichever comes first.
//!
//! # Example
//!
//! ```ignore
//! use bitbucket_client::auth::CallbackServer;
//! use std::time::Duration;
//!
//! let mut server = CallbackServer::bind(8085, Some("random-state".into())).await?;
//! let result = server.wait(Duration::from_secs(300)).await;
//! server.shutdown().await;
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::common::ApiError;

/// How long a graceful shutdown may take before the server task is aborted.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of one authorization attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationResult {
    /// The provider redirected back with a code.
    Granted { code: String },
    /// The provider (or the state check) rejected the attempt.
    Denied {
        error: String,
        description: Option<String>,
    },
}

/// Query parameters received in the callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Single-assignment cell resolved by the first callback.
#[derive(Clone)]
struct Rendezvous {
    sender: Arc<Mutex<Option<oneshot::Sender<AuthorizationResult>>>>,
}

impl Rendezvous {
    fn new() -> (Self, oneshot::Receiver<AuthorizationResult>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sender: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Delivers `result` if nothing was delivered before. Returns whether
    /// this call delivered it.
    fn resolve(&self, result: AuthorizationResult) -> bool {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(tx) => tx.send(result).is_ok(),
            None => false,
        }
    }
}

#[derive(Clone)]
struct CallbackState {
    rendezvous: Rendezvous,
    expected_state: Option<Arc<str>>,
}

/// A running callback server.
pub struct CallbackServer {
    addr: SocketAddr,
    receiver: Option<oneshot::Receiver<AuthorizationResult>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl CallbackServer {
    /// Binds `localhost:{port}` and starts serving.
    ///
    /// Port `0` picks a free port; [`port`](Self::port) reports the one in
    /// use. When `expected_state` is set, callbacks carrying a different
    /// `state` resolve as `Denied { error: "invalid_state" }`.
    pub async fn bind(port: u16, expected_state: Option<String>) -> Result<Self, ApiError> {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
            .await
            .map_err(|e| {
                ApiError::authorization(format!(
                    "failed to bind callback server to localhost:{port}: {e}"
                ))
            })?;
        let addr = listener.local_addr().map_err(|e| {
            ApiError::authorization(format!("failed to read callback server address: {e}"))
        })?;

        let (rendezvous, receiver) = Rendezvous::new();
        let app = Router::new()
            .route("/", get(handle_callback))
            .with_state(CallbackState {
                rendezvous,
                expected_state: expected_state.map(Arc::from),
            });

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = server.await {
                warn!("callback server error: {e}");
            }
        });

        debug!("OAuth callback server listening on http://{addr}/");

        Ok(Self {
            addr,
            receiver: Some(receiver),
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// The redirect URI to register with the provider.
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/", self.port())
    }

    /// Returns `true` until the server task has finished.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Waits up to `timeout` for the first callback.
    ///
    /// Can be called once; the result is delivered exactly once.
    pub async fn wait(&mut self, timeout: Duration) -> Result<AuthorizationResult, ApiError> {
        let receiver = self
            .receiver
            .take()
            .ok_or_else(|| ApiError::authorization("callback result was already consumed"))?;

        match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(ApiError::authorization(
                "callback server stopped before the browser responded",
            )),
            Err(_) => Err(ApiError::authorization(format!(
                "timed out after {}s waiting for the browser callback",
                timeout.as_secs()
            ))),
        }
    }

    /// Stops the server, waiting at most [`SHUTDOWN_TIMEOUT`] before
    /// aborting the serving task.
    pub async fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let Some(mut task) = self.task.take() else {
            return;
        };
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, &mut task).await.is_err() {
            warn!(
                "callback server did not stop within {}s; aborting",
                SHUTDOWN_TIMEOUT.as_secs()
            );
            task.abort();
            let _ = task.await;
        }
        debug!("OAuth callback server on {} stopped", self.addr);
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn handle_callback(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> impl IntoResponse {
    let Some(result) = process_callback(state.expected_state.as_deref(), params) else {
        return (StatusCode::BAD_REQUEST, Html(MISSING_PARAMS_HTML));
    };

    let granted = matches!(result, AuthorizationResult::Granted { .. });
    if !state.rendezvous.resolve(result) {
        debug!("ignoring repeated OAuth callback");
        return (StatusCode::OK, Html(ALREADY_HANDLED_HTML));
    }

    if granted {
        (StatusCode::OK, Html(SUCCESS_HTML))
    } else {
        (StatusCode::BAD_REQUEST, Html(ERROR_HTML))
    }
}

/// Turns callback parameters into a result.
///
/// Returns `None` when the request carries neither `code` nor `error`.
fn process_callback(
    expected_state: Option<&str>,
    params: CallbackParams,
) -> Option<AuthorizationResult> {
    if params.code.is_none() && params.error.is_none() {
        return None;
    }

    if let Some(expected) = expected_state {
        if params.state.as_deref() != Some(expected) {
            return Some(AuthorizationResult::Denied {
                error: "invalid_state".to_string(),
                description: Some("the state parameter did not match this login".to_string()),
            });
        }
    }

    Some(match (params.error, params.code) {
        (Some(error), _) => AuthorizationResult::Denied {
            error,
            description: params.error_description,
        },
        (None, Some(code)) => AuthorizationResult::Granted { code },
        (None, None) => return None,
    })
}

const SUCCESS_HTML: &str = "<!DOCTYPE html>\
<html><head><title>Authentication Successful</title></head>\
<body style=\"font-family: system-ui, sans-serif; text-align: center; padding: 50px;\">\
<h1>Authentication Successful!</h1>\
<p>You can close this window and return to the terminal.</p>\
<script>window.close();</script>\
</body></html>";

const ERROR_HTML: &str = "<!DOCTYPE html>\
<html><head><title>Authentication Failed</title></head>\
<body style=\"font-family: system-ui, sans-serif; text-align: center; padding: 50px;\">\
<h1>Authentication Failed</h1>\
<p>The authorization was denied or an error occurred.</p>\
<p>You can close this window and try again.</p>\
</body></html>";

const ALREADY_HANDLED_HTML: &str = "<!DOCTYPE html>\
<html><head><title>Already Handled</title></head>\
<body style=\"font-family: system-ui, sans-serif; text-align: center; padding: 50px;\">\
<h1>Login already handled</h1>\
<p>You may close this window.</p>\
</body></html>";

const MISSING_PARAMS_HTML: &str = "<!DOCTYPE html>\
<html><head><title>Bad Request</title></head>\
<body style=\"font-family: system-ui, sans-serif; text-align: center; padding: 50px;\">\
<h1>Missing authorization code</h1>\
</body></html>";
