use std::time::Duration;

use tokio_tungstenite::tungstenite::http::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use url::Url;

use crate::auth::Authenticator;
use crate::{Error, Result};

pub const DEFAULT_SERVICE_URL: &str = "https://api.us-south.text-to-speech.watson.cloud.ibm.com";
pub const DEFAULT_SERVICE_NAME: &str = "TEXT_TO_SPEECH";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

const SYNTHESIZE_PATH: [&str; 2] = ["v1", "synthesize"];
const SDK_USER_AGENT: &str = concat!("watson-tts-ws/", env!("CARGO_PKG_VERSION"));

/// A configured Text to Speech service.
#[derive(Debug, Clone)]
pub struct TextToSpeech {
    pub(crate) service_url: Url,
    pub(crate) authenticator: Authenticator,
    pub(crate) headers: HeaderMap,
    pub(crate) idle_timeout: Option<Duration>,
    pub(crate) connect_timeout: Option<Duration>,
}

impl TextToSpeech {
    #[must_use]
    pub fn builder() -> TextToSpeechBuilder {
        TextToSpeechBuilder::new()
    }

    /// A service at the default URL.
    ///
    /// # Errors
    /// Returns an error if the authenticator is invalid.
    #[allow(clippy::result_large_err)]
    pub fn new(authenticator: Authenticator) -> Result<Self> {
        Self::builder().authenticator(authenticator).build()
    }

    /// Load the service URL and credentials from `{prefix}_URL`, `{prefix}_APIKEY` and friends.
    ///
    /// # Errors
    /// Returns an error if no credentials are configured or the URL is invalid.
    #[allow(clippy::result_large_err)]
    pub fn from_env(prefix: &str) -> Result<Self> {
        let authenticator = Authenticator::from_env(prefix)?;
        let mut builder = Self::builder().authenticator(authenticator);
        if let Ok(url) = std::env::var(format!("{prefix}_URL")) {
            if !url.is_empty() {
                builder = builder.service_url(url);
            }
        }
        builder.build()
    }

    #[must_use]
    pub const fn service_url(&self) -> &Url {
        &self.service_url
    }

    /// The WebSocket URL for a synthesize request.
    ///
    /// # Errors
    /// Returns an error if the service URL cannot carry a path.
    #[allow(clippy::result_large_err)]
    pub fn synthesize_url(&self, voice: Option<&str>, customization_id: Option<&str>) -> Result<Url> {
        let mut url = self.service_url.clone();
        let scheme = websocket_scheme(url.scheme())?;
        url.set_scheme(scheme)
            .map_err(|()| Error::Configuration(format!("cannot switch service URL to {scheme}")))?;
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|()| Error::Configuration("service URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(SYNTHESIZE_PATH);

        if voice.is_some() || customization_id.is_some() {
            let mut query = url.query_pairs_mut();
            if let Some(voice) = voice {
                query.append_pair("voice", voice);
            }
            if let Some(id) = customization_id {
                query.append_pair("customization_id", id);
            }
        }
        Ok(url)
    }

    /// Service-wide headers plus authorization, before per-request headers.
    ///
    /// # Errors
    /// Returns an error if the credential cannot be encoded as a header.
    #[allow(clippy::result_large_err)]
    pub(crate) fn base_headers(&self) -> Result<HeaderMap> {
        let mut headers = self.headers.clone();
        headers
            .entry(USER_AGENT)
            .or_insert(HeaderValue::from_static(SDK_USER_AGENT));
        self.authenticator.authenticate(&mut headers)?;
        Ok(headers)
    }
}

pub struct TextToSpeechBuilder {
    service_url: Option<String>,
    authenticator: Option<Authenticator>,
    headers: Vec<(String, String)>,
    idle_timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
}

impl TextToSpeechBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            service_url: None,
            authenticator: None,
            headers: Vec::new(),
            idle_timeout: None,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
        }
    }

    /// Base URL of the service instance, e.g.
    /// `https://api.eu-de.text-to-speech.watson.cloud.ibm.com/instances/<id>`.
    #[must_use]
    pub fn service_url(mut self, url: impl Into<String>) -> Self {
        self.service_url = Some(url.into());
        self
    }

    #[must_use]
    pub fn authenticator(mut self, authenticator: Authenticator) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Header sent with every synthesis connection.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// End a session when the service goes quiet for this long.
    #[must_use]
    pub const fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// `None` waits on the handshake indefinitely.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// # Errors
    /// Returns an error if the authenticator is missing or invalid, or the URL or a header is malformed.
    #[allow(clippy::result_large_err)]
    pub fn build(self) -> Result<TextToSpeech> {
        let authenticator = self
            .authenticator
            .ok_or_else(|| Error::Configuration("authenticator required".to_string()))?;
        authenticator.validate()?;

        let raw_url = self.service_url.as_deref().unwrap_or(DEFAULT_SERVICE_URL);
        let service_url = Url::parse(raw_url.trim_end_matches('/'))?;
        websocket_scheme(service_url.scheme())?;

        let mut headers = HeaderMap::new();
        for (name, value) in self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())?;
            headers.insert(name, HeaderValue::from_str(&value)?);
        }

        Ok(TextToSpeech {
            service_url,
            authenticator,
            headers,
            idle_timeout: self.idle_timeout,
            connect_timeout: self.connect_timeout,
        })
    }
}

impl Default for TextToSpeechBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::result_large_err)]
fn websocket_scheme(scheme: &str) -> Result<&'static str> {
    match scheme {
        "https" | "wss" => Ok("wss"),
        "http" | "ws" => Ok("ws"),
        other => Err(Error::Configuration(format!("unsupported service URL scheme: {other}"))),
    }
}
