//! Credential lookup
//!
//! Resolution order: explicit overrides, environment variable, OS keychain
//! (`keyring`). A credential missing from all three is a configuration error.

use crate::error::{AppError, Result};
use keyring::Entry;
use std::collections::HashMap;
use tracing::debug;

const SERVICE: &str = "market-signal";

/// Credentials the upstream adapters need
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Credential {
    OpenAi,
    NewsApi,
}

impl Credential {
    pub fn env_var(&self) -> &'static str {
        match self {
            Credential::OpenAi => "OPENAI_API_KEY",
            Credential::NewsApi => "NEWSAPI_API_KEY",
        }
    }

    fn keychain_account(&self) -> &'static str {
        match self {
            Credential::OpenAi => "openai-api-key",
            Credential::NewsApi => "newsapi-api-key",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "openai" => Some(Credential::OpenAi),
            "newsapi" => Some(Credential::NewsApi),
            _ => None,
        }
    }
}

/// Credential store shared by the adapters
#[derive(Debug, Clone)]
pub struct CredentialStore {
    overrides: HashMap<Credential, String>,
    use_env: bool,
    use_keychain: bool,
}

impl CredentialStore {
    /// Store reading environment variables and the OS keychain
    pub fn new() -> Self {
        Self {
            overrides: HashMap::new(),
            use_env: true,
            use_keychain: true,
        }
    }

    /// Store that only knows the given credentials
    pub fn isolated(overrides: HashMap<Credential, String>) -> Self {
        Self {
            overrides,
            use_env: false,
            use_keychain: false,
        }
    }

    /// Resolve a credential; blank values count as missing
    pub fn resolve(&self, credential: Credential) -> Result<String> {
        if let Some(value) = self.overrides.get(&credential).filter(|v| !v.trim().is_empty()) {
            return Ok(value.clone());
        }

        if self.use_env {
            if let Ok(value) = std::env::var(credential.env_var()) {
                if !value.trim().is_empty() {
                    return Ok(value);
                }
            }
        }

        if self.use_keychain {
            if let Some(value) = self.from_keychain(credential) {
                return Ok(value);
            }
        }

        Err(AppError::Config(format!(
            "{} is not configured. Set the environment variable or store it in the keychain.",
            credential.env_var()
        )))
    }

    /// Store a credential in the OS keychain
    pub fn store(&self, credential: Credential, secret: &str) -> Result<()> {
        let entry = Entry::new(SERVICE, credential.keychain_account())?;
        entry.set_password(secret)?;
        Ok(())
    }

    /// Delete a credential from the OS keychain
    pub fn delete(&self, credential: Credential) -> Result<()> {
        let entry = Entry::new(SERVICE, credential.keychain_account())?;
        match entry.delete_password() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()), // Already deleted
            Err(e) => Err(e.into()),
        }
    }

    fn from_keychain(&self, credential: Credential) -> Option<String> {
        let entry = match Entry::new(SERVICE, credential.keychain_account()) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Keychain unavailable for {:?}: {}", credential, e);
                return None;
            }
        };

        match entry.get_password() {
            Ok(secret) if !secret.trim().is_empty() => Some(secret),
            Ok(_) | Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                debug!("Keychain lookup failed for {:?}: {}", credential, e);
                None
            }
        }
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}
