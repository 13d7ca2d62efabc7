use tokio_tungstenite::tungstenite::http::header::{HeaderMap, HeaderName, HeaderValue};
use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::protocol::{SynthesizeRequest, TimingKind};

/// Options for one synthesis request.
#[derive(Debug, Clone, Default)]
pub struct SynthesizeOptions {
    text: String,
    accept: Option<String>,
    voice: Option<String>,
    customization_id: Option<String>,
    timings: Vec<TimingKind>,
    headers: Vec<(String, String)>,
    cancellation: Option<CancellationToken>,
}

impl SynthesizeOptions {
    /// `text` may be plain text or SSML.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Requested audio format, e.g. [`crate::protocol::request::AUDIO_OGG_OPUS`].
    #[must_use]
    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    #[must_use]
    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    #[must_use]
    pub fn customization_id(mut self, customization_id: impl Into<String>) -> Self {
        self.customization_id = Some(customization_id.into());
        self
    }

    /// Ask the service for per-word timing information.
    #[must_use]
    pub fn word_timings(mut self) -> Self {
        if !self.timings.contains(&TimingKind::Words) {
            self.timings.push(TimingKind::Words);
        }
        self
    }

    /// Extra header for the upgrade request. Overrides a service-wide header of the same name.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn voice_name(&self) -> Option<&str> {
        self.voice.as_deref()
    }

    #[must_use]
    pub fn customization(&self) -> Option<&str> {
        self.customization_id.as_deref()
    }

    #[must_use]
    pub fn cancellation_token(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// The JSON payload sent on the connection.
    #[must_use]
    pub fn request(&self) -> SynthesizeRequest {
        SynthesizeRequest {
            text: self.text.clone(),
            accept: self.accept.clone(),
            timings: self.timings.clone(),
        }
    }

    /// Merge the per-request headers into `headers`.
    ///
    /// # Errors
    /// Returns an error if a header name or value is invalid.
    #[allow(clippy::result_large_err)]
    pub fn apply_headers(&self, headers: &mut HeaderMap) -> Result<()> {
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())?;
            headers.insert(name, HeaderValue::from_str(value)?);
        }
        Ok(())
    }
}
