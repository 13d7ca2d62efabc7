//! Authorization header selection for synthesis connections.
//!
//! Credentials must already be in hand: this module never talks to a token
//! endpoint. An IAM access token obtained elsewhere is passed as
//! [`Authenticator::BearerToken`].

use base64::Engine as _;
use base64::engine::general_purpose;
use tokio_tungstenite::tungstenite::http::header::{AUTHORIZATION, HeaderMap, HeaderValue};

use crate::{Error, Result};

const API_KEY_USERNAME: &str = "apikey";

#[derive(Clone, PartialEq, Eq)]
pub enum Authenticator {
    NoAuth,
    BearerToken(String),
    Basic { username: String, password: String },
}

impl Authenticator {
    /// Basic credentials in the `apikey:<key>` form the service accepts.
    #[must_use]
    pub fn api_key(key: impl Into<String>) -> Self {
        Self::Basic {
            username: API_KEY_USERNAME.to_string(),
            password: key.into(),
        }
    }

    #[must_use]
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::BearerToken(token.into())
    }

    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// # Errors
    /// Returns an error if a credential is empty or wrapped in braces or quotes.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::NoAuth => Ok(()),
            Self::BearerToken(token) => check_credential("bearer token", token),
            Self::Basic { username, password } => {
                check_credential("username", username)?;
                check_credential("password", password)
            }
        }
    }

    /// Insert the `Authorization` header for this credential, if any.
    ///
    /// # Errors
    /// Returns an error if the credential cannot be encoded as a header value.
    #[allow(clippy::result_large_err)]
    pub fn authenticate(&self, headers: &mut HeaderMap) -> Result<()> {
        let value = match self {
            Self::NoAuth => return Ok(()),
            Self::BearerToken(token) => format!("Bearer {token}"),
            Self::Basic { username, password } => {
                let encoded = general_purpose::STANDARD.encode(format!("{username}:{password}"));
                format!("Basic {encoded}")
            }
        };
        let mut value = HeaderValue::from_str(&value)?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    /// Build an authenticator from `{prefix}_*` environment variables.
    ///
    /// `{prefix}_AUTH_TYPE` selects `noauth`, `bearertoken` or `basic`. Without it the
    /// first of `{prefix}_APIKEY`, `{prefix}_BEARER_TOKEN` and
    /// `{prefix}_USERNAME`/`{prefix}_PASSWORD` that is set wins.
    ///
    /// # Errors
    /// Returns an error if no usable credential is configured.
    #[allow(clippy::result_large_err)]
    pub fn from_env(prefix: &str) -> Result<Self> {
        let var = |name: &str| {
            std::env::var(format!("{prefix}_{name}"))
                .ok()
                .filter(|value| !value.is_empty())
        };

        let auth_type = var("AUTH_TYPE").map(|t| t.to_ascii_lowercase());
        let authenticator = match auth_type.as_deref() {
            Some("noauth") => Self::NoAuth,
            Some("bearertoken") => var("BEARER_TOKEN").map(Self::BearerToken).ok_or_else(|| {
                Error::Configuration(format!("{prefix}_BEARER_TOKEN is required"))
            })?,
            Some("basic") => match (var("USERNAME"), var("PASSWORD")) {
                (Some(username), Some(password)) => Self::Basic { username, password },
                _ => {
                    return Err(Error::Configuration(format!(
                        "{prefix}_USERNAME and {prefix}_PASSWORD are required"
                    )));
                }
            },
            Some(other) => {
                return Err(Error::Configuration(format!(
                    "unsupported {prefix}_AUTH_TYPE: {other}"
                )));
            }
            None => {
                if let Some(key) = var("APIKEY") {
                    Self::api_key(key)
                } else if let Some(token) = var("BEARER_TOKEN") {
                    Self::BearerToken(token)
                } else if let (Some(username), Some(password)) = (var("USERNAME"), var("PASSWORD")) {
                    Self::Basic { username, password }
                } else {
                    return Err(Error::Configuration(format!(
                        "no credentials found in {prefix}_* environment variables"
                    )));
                }
            }
        };

        authenticator.validate()?;
        Ok(authenticator)
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAuth => f.write_str("NoAuth"),
            Self::BearerToken(_) => f.write_str("BearerToken(..)"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

#[allow(clippy::result_large_err)]
fn check_credential(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::Configuration(format!("{name} must not be empty")));
    }
    let wrapped = |c: char| matches!(c, '{' | '}' | '"');
    if value.starts_with(wrapped) || value.ends_with(wrapped) {
        return Err(Error::Configuration(format!(
            "{name} must not start or end with braces or quotes"
        )));
    }
    Ok(())
}
