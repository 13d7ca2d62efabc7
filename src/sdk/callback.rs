use async_trait::async_trait;
use bytes::Bytes;
use tokio_tungstenite::tungstenite::http::HeaderMap;

use crate::Error;
use crate::protocol::{StreamDescriptor, TimingInformation};

const STATUS_OK: u16 = 200;

/// A chunk of synthesized audio, shaped like a regular service response.
#[derive(Debug, Clone)]
pub struct DetailedResponse {
    pub status_code: u16,
    pub headers: HeaderMap,
    pub result: Bytes,
}

impl DetailedResponse {
    pub(crate) fn audio_chunk(result: Bytes) -> Self {
        Self {
            status_code: STATUS_OK,
            headers: HeaderMap::new(),
            result,
        }
    }
}

/// Receives the events of one synthesis session.
///
/// Callbacks for a session are invoked one at a time. `on_open` comes first,
/// `on_close` comes last, and `on_error` fires at most once. Each callback is
/// awaited before the next frame is read, so a slow callback slows the read
/// loop.
#[async_trait]
pub trait SynthesizeCallback: Send + Sync {
    async fn on_open(&self) {}

    async fn on_close(&self) {}

    async fn on_error(&self, error: Error);

    /// One call per binary frame, in arrival order.
    async fn on_data(&self, response: DetailedResponse);

    async fn on_timing_information(&self, _timings: TimingInformation) {}

    async fn on_content_type(&self, _descriptor: StreamDescriptor) {}
}
