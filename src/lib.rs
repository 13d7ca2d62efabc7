#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::multiple_crate_versions)]

pub mod auth;
pub mod error;
pub mod protocol;
pub mod sdk;
pub mod transport;

pub use auth::Authenticator;
pub use error::{Error, Result, ServiceError};
pub use protocol::{
    ControlMessage, MarkTiming, StreamDescriptor, SynthesizeRequest, TimingInformation, TimingKind,
    WordTiming,
};
pub use sdk::{
    ChannelCallback, DetailedResponse, EventStream, SessionSettings, SynthesisEvent,
    SynthesisListener, SynthesizeCallback, SynthesizeOptions, TextToSpeech, TextToSpeechBuilder,
    run_session,
};
pub use transport::{Connection, WsStream};

pub use tokio_util::sync::CancellationToken;

pub(crate) const TRACE_LOG_MAX_BYTES: usize = 1024;
const TRACE_TRUNCATE_SUFFIX: &str = "... (truncated)";

pub(crate) fn safe_truncate(s: &str, max_bytes: usize) -> std::borrow::Cow<'_, str> {
    if s.len() <= max_bytes {
        return std::borrow::Cow::Borrowed(s);
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    std::borrow::Cow::Owned(format!(
        "{} {} {} bytes",
        &s[..end],
        TRACE_TRUNCATE_SUFFIX,
        s.len() - end
    ))
}
