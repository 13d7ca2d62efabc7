use serde::{Deserialize, Serialize};

pub const AUDIO_BASIC: &str = "audio/basic";
pub const AUDIO_FLAC: &str = "audio/flac";
pub const AUDIO_L16: &str = "audio/l16";
pub const AUDIO_MP3: &str = "audio/mp3";
pub const AUDIO_MPEG: &str = "audio/mpeg";
pub const AUDIO_MULAW: &str = "audio/mulaw";
pub const AUDIO_OGG: &str = "audio/ogg";
pub const AUDIO_OGG_OPUS: &str = "audio/ogg;codecs=opus";
pub const AUDIO_OGG_VORBIS: &str = "audio/ogg;codecs=vorbis";
pub const AUDIO_WAV: &str = "audio/wav";
pub const AUDIO_WEBM: &str = "audio/webm";
pub const AUDIO_WEBM_OPUS: &str = "audio/webm;codecs=opus";
pub const AUDIO_WEBM_VORBIS: &str = "audio/webm;codecs=vorbis";

/// Formats that need an explicit `rate` parameter in the accept value.
const RATE_REQUIRED: &[&str] = &[AUDIO_L16, AUDIO_MULAW];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimingKind {
    Words,
}

/// The single text frame sent on a synthesis connection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SynthesizeRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timings: Vec<TimingKind>,
}

impl SynthesizeRequest {
    /// # Errors
    /// Returns an error if the text is empty or the accept value lacks a required rate.
    #[allow(clippy::result_large_err)]
    pub fn validate(&self) -> crate::Result<()> {
        if self.text.trim().is_empty() {
            return Err(crate::Error::InvalidOptions("text must not be empty".to_string()));
        }
        if let Some(accept) = &self.accept {
            validate_accept(accept)?;
        }
        Ok(())
    }
}

#[allow(clippy::result_large_err)]
fn validate_accept(accept: &str) -> crate::Result<()> {
    let mut parts = accept.split(';').map(str::trim);
    let mime = parts.next().unwrap_or_default().to_ascii_lowercase();
    if mime.is_empty() {
        return Err(crate::Error::InvalidOptions("accept must not be empty".to_string()));
    }
    if RATE_REQUIRED.contains(&mime.as_str())
        && !parts.any(|param| param.to_ascii_lowercase().starts_with("rate="))
    {
        return Err(crate::Error::InvalidOptions(format!(
            "{mime} requires a rate parameter, e.g. {mime};rate=22050"
        )));
    }
    Ok(())
}
