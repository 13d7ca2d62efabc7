//! Streaming synthesis over the Text to Speech WebSocket interface.
//!
//! One call opens one connection, sends one request, and streams the
//! service's audio and metadata to a [`SynthesizeCallback`] until the
//! connection ends. [`TextToSpeech::synthesize_events`] offers the same
//! session as a stream of [`SynthesisEvent`] values.

mod builder;
mod callback;
pub mod events;
mod listener;
mod options;
mod session;

pub use builder::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_SERVICE_NAME, DEFAULT_SERVICE_URL, TextToSpeech,
    TextToSpeechBuilder,
};
pub use callback::{DetailedResponse, SynthesizeCallback};
pub use events::{ChannelCallback, EventStream, SynthesisEvent};
pub use listener::{SessionSettings, SynthesisListener};
pub use options::SynthesizeOptions;
pub use session::run_session;
