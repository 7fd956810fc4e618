//
//  bitbucket-client
//  auth/testing.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Test doubles for the OAuth flow and the vault.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use url::Url;

use super::{
    AuthorizationGrant, BrowserLauncher, MemoryVault, Profile, TokenExchanger, TokenResponse,
    Vault,
};
use crate::api::common::ApiError;

#[derive(Debug, Clone)]
enum Behavior {
    Grant(String),
    Deny(String),
    ForgeState(String),
    Silent,
    Fail,
}

/// A "browser" that answers the authorize URL by calling the redirect URI
/// itself.
#[derive(Debug, Clone)]
pub struct CallbackBrowser {
    behavior: Behavior,
    opened: Arc<AtomicUsize>,
    redirect_uri: Arc<Mutex<Option<String>>>,
}

impl CallbackBrowser {
    fn with(behavior: Behavior) -> Self {
        Self {
            behavior,
            opened: Arc::default(),
            redirect_uri: Arc::default(),
        }
    }

    pub fn granting(code: &str) -> Self {
        Self::with(Behavior::Grant(code.into()))
    }

    pub fn denying(error: &str) -> Self {
        Self::with(Behavior::Deny(error.into()))
    }

    pub fn forging_state(code: &str) -> Self {
        Self::with(Behavior::ForgeState(code.into()))
    }

    /// Never calls back.
    pub fn silent() -> Self {
        Self::with(Behavior::Silent)
    }

    /// Fails to launch.
    pub fn failing() -> Self {
        Self::with(Behavior::Fail)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn redirect_uri(&self) -> Option<String> {
        self.redirect_uri.lock().unwrap().clone()
    }
}

impl BrowserLauncher for CallbackBrowser {
    fn open(&self, url: &str) -> std::io::Result<()> {
        self.opened.fetch_add(1, Ordering::SeqCst);

        let url = Url::parse(url).map_err(std::io::Error::other)?;
        let param = |name: &str| {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
                .unwrap_or_default()
        };
        let redirect = param("redirect_uri");
        let state = param("state");
        *self.redirect_uri.lock().unwrap() = Some(redirect.clone());

        let query = match &self.behavior {
            Behavior::Fail => return Err(std::io::Error::other("no display available")),
            Behavior::Silent => return Ok(()),
            Behavior::Grant(code) => format!("code={code}&state={state}"),
            Behavior::Deny(error) => {
                format!("error={error}&error_description=User+denied+access&state={state}")
            }
            Behavior::ForgeState(code) => format!("code={code}&state=forged"),
        };

        let target = format!("{}?{query}", redirect.replace("localhost", "127.0.0.1"));
        tokio::spawn(async move {
            let client = reqwest::Client::builder()
                .pool_max_idle_per_host(0)
                .build()
                .unwrap();
            let _ = client.get(target).send().await;
        });
        Ok(())
    }
}

/// Exchanger that mints predictable tokens without any network.
#[derive(Debug, Default, Clone)]
pub struct FakeExchanger;

#[async_trait]
impl TokenExchanger for FakeExchanger {
    async fn exchange(
        &self,
        _profile: &Profile,
        grant: &AuthorizationGrant,
    ) -> Result<TokenResponse, ApiError> {
        Ok(TokenResponse {
            access_token: format!("token-for-{}", grant.code),
            refresh_token: Some(format!("refresh-for-{}", grant.code)),
            token_type: "bearer".into(),
            expires_in: Some(7200),
            scopes: vec![],
        })
    }

    async fn refresh(
        &self,
        _profile: &Profile,
        refresh_token: &str,
    ) -> Result<TokenResponse, ApiError> {
        Ok(TokenResponse {
            access_token: format!("refreshed-{refresh_token}"),
            refresh_token: None,
            token_type: "bearer".into(),
            expires_in: Some(7200),
            scopes: vec![],
        })
    }
}

/// A [`MemoryVault`] whose deletes fail for one service.
#[derive(Debug, Default)]
pub struct LockedVault {
    pub inner: MemoryVault,
    pub locked_service: String,
}

impl LockedVault {
    pub fn locking(service: &str) -> Self {
        Self {
            inner: MemoryVault::new(),
            locked_service: service.to_string(),
        }
    }
}

impl Vault for LockedVault {
    fn get(&self, service: &str, username: &str) -> Result<Option<String>, ApiError> {
        self.inner.get(service, username)
    }

    fn set(&self, service: &str, username: &str, secret: &str) -> Result<(), ApiError> {
        self.inner.set(service, username, secret)
    }

    fn delete(&self, service: &str, username: &str) -> Result<(), ApiError> {
        if service == self.locked_service {
            return Err(ApiError::Vault(format!("{service} is locked")));
        }
        self.inner.delete(service, username)
    }
}
