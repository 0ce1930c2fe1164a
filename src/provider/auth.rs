//! Authentication session built from an already-issued OAuth access token.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::config::Config;
use crate::error::{Result, UnsublyError};

/// Environment variable that overrides the token file.
pub const TOKEN_ENV: &str = "UNSUBLY_ACCESS_TOKEN";

/// Shape of the token files written by common OAuth helpers.
#[derive(Debug, Deserialize)]
struct TokenFile {
    token: Option<String>,
    access_token: Option<String>,
}

/// Bearer credentials for one process.
///
/// Constructed once and handed to the provider client.
#[derive(Clone)]
pub struct AuthSession {
    access_token: String,
}

impl AuthSession {
    pub fn new(access_token: impl Into<String>) -> Result<Self> {
        let access_token = access_token.into().trim().to_string();
        if access_token.is_empty() {
            return Err(UnsublyError::Authentication(
                "access token is empty".into(),
            ));
        }
        Ok(Self { access_token })
    }

    /// Read a `token.json`-style file (`token` or `access_token` field).
    pub fn from_token_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| UnsublyError::io(path, e))?;
        let parsed: TokenFile = serde_json::from_str(&contents).map_err(|e| {
            UnsublyError::Authentication(format!(
                "cannot parse token file '{}': {e}",
                path.display()
            ))
        })?;
        let token = parsed.token.or(parsed.access_token).ok_or_else(|| {
            UnsublyError::Authentication(format!(
                "token file '{}' has no access token",
                path.display()
            ))
        })?;
        Self::new(token)
    }

    /// `$UNSUBLY_ACCESS_TOKEN`, else the configured token file.
    pub fn resolve(config: &Config) -> Result<Self> {
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            debug!("Using access token from environment");
            return Self::new(token);
        }
        match &config.gmail.token_file {
            Some(path) => {
                debug!(path = %path.display(), "Using access token file");
                Self::from_token_file(path)
            }
            None => Err(UnsublyError::Authentication(format!(
                "no credentials: set {TOKEN_ENV} or gmail.token_file"
            ))),
        }
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"<redacted>")
            .finish()
    }
}
