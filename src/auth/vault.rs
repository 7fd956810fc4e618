//
//  bitbucket-client
//  auth/vault.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Credential Vault Adapter
//!
//! Opaque secret storage addressed by `(service, username)`.
//!
//! ## Platform Support
//!
//! [`KeyringVault`] uses the platform-native secure storage:
//!
//! - **macOS**: Keychain Services
//! - **Linux**: Secret Service API (GNOME Keyring, KWallet)
//! - **Windows**: Windows Credential Manager
//!
//! [`MemoryVault`] keeps secrets in process memory and backs the test suite.
//!
//! ## Storage Model
//!
//! - **Service**: the profile's vault key (`bb:<profile>` unless configured)
//! - **Username**: `access-token`, the profile's user, or its client id
//! - **Password**: the secret itself
//!
//! Every backend failure is reported as [`ApiError::Vault`]; keyring error
//! types never escape this module.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use keyring::Entry;
use tracing::debug;

use crate::api::common::ApiError;

/// Get/set/delete of a secret by `(service, username)`.
///
/// `delete` of an absent entry succeeds.
pub trait Vault: Send + Sync {
    /// Returns the stored secret, or `None` when no entry exists.
    fn get(&self, service: &str, username: &str) -> Result<Option<String>, ApiError>;

    /// Creates or replaces an entry.
    fn set(&self, service: &str, username: &str, secret: &str) -> Result<(), ApiError>;

    /// Removes an entry.
    fn delete(&self, service: &str, username: &str) -> Result<(), ApiError>;
}

/// Vault backed by the system keyring.
///
/// # Notes
///
/// - The keyring may require user interaction (password, biometrics) on first access.
/// - On Linux, ensure a secret service daemon (GNOME Keyring, KWallet) is running.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringVault;

impl KeyringVault {
    pub fn new() -> Self {
        Self
    }

    fn entry(service: &str, username: &str) -> Result<Entry, ApiError> {
        Entry::new(service, username).map_err(|e| vault_error("open", service, username, e))
    }
}

impl Vault for KeyringVault {
    fn get(&self, service: &str, username: &str) -> Result<Option<String>, ApiError> {
        match Self::entry(service, username)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(vault_error("read", service, username, e)),
        }
    }

    fn set(&self, service: &str, username: &str, secret: &str) -> Result<(), ApiError> {
        debug!(service, username, "storing secret in keyring");
        Self::entry(service, username)?
            .set_password(secret)
            .map_err(|e| vault_error("write", service, username, e))
    }

    fn delete(&self, service: &str, username: &str) -> Result<(), ApiError> {
        match Self::entry(service, username)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(vault_error("delete", service, username, e)),
        }
    }
}

fn vault_error(action: &str, service: &str, username: &str, err: keyring::Error) -> ApiError {
    ApiError::Vault(format!(
        "failed to {action} '{username}' in keyring service '{service}': {err}"
    ))
}

/// In-memory vault.
#[derive(Debug, Default)]
pub struct MemoryVault {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), String>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Vault for MemoryVault {
    fn get(&self, service: &str, username: &str) -> Result<Option<String>, ApiError> {
        Ok(self
            .lock()
            .get(&(service.to_string(), username.to_string()))
            .cloned())
    }

    fn set(&self, service: &str, username: &str, secret: &str) -> Result<(), ApiError> {
        self.lock().insert(
            (service.to_string(), username.to_string()),
            secret.to_string(),
        );
        Ok(())
    }

    fn delete(&self, service: &str, username: &str) -> Result<(), ApiError> {
        self.lock()
            .remove(&(service.to_string(), username.to_string()));
        Ok(())
    }
}

/// A username/password pair read from the vault for one request.
///
/// The password is redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    /// Reads the password stored for `username` under `service`.
    pub fn load(
        vault: &dyn Vault,
        service: &str,
        username: &str,
    ) -> Result<Option<Self>, ApiError> {
        Ok(vault.get(service, username)?.map(|password| Self {
            username: username.to_string(),
            password,
        }))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
