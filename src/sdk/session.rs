use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::http::HeaderMap;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, warn};
use url::Url;

use super::builder::TextToSpeech;
use super::callback::SynthesizeCallback;
use super::events::{ChannelCallback, EventStream};
use super::listener::{SessionSettings, SynthesisListener};
use super::options::SynthesizeOptions;
use crate::transport::{self, Connection};
use crate::Result;

/// Run one synthesis session on an established connection.
///
/// `on_open` fires before the request is written. The reader and writer then
/// run as separate tasks, and this returns only after `on_close`.
pub async fn run_session<C: Connection>(
    connection: C,
    callback: Arc<dyn SynthesizeCallback>,
    payload: String,
    settings: SessionSettings,
) {
    let (sink, stream) = connection.split();
    let listener = Arc::new(SynthesisListener::new(sink, callback, settings));
    let (done_tx, done_rx) = oneshot::channel();

    listener.open().await;

    // Both tasks are aborted if this future is dropped before the session ends.
    let reader = Arc::clone(&listener);
    let _read_task = AbortOnDropHandle::new(tokio::spawn(async move {
        reader.receive(stream, done_tx).await;
    }));

    let writer = Arc::clone(&listener);
    let mut write_task = AbortOnDropHandle::new(tokio::spawn(async move {
        if let Err(err) = writer.send_request(payload).await {
            warn!("Synthesize request not sent: {err}");
        }
    }));

    // The reader trips the shutdown token on exit, so the writer always finishes.
    // Awaiting it first keeps a late write failure ahead of `on_close`.
    if let Err(err) = (&mut write_task).await {
        warn!("Synthesize request task failed: {err}");
    }
    listener.close(done_rx).await;
}

struct PreparedSession {
    url: Url,
    headers: HeaderMap,
    payload: String,
    settings: SessionSettings,
}

impl TextToSpeech {
    /// Synthesize `options` over a WebSocket, streaming events to `callback`.
    ///
    /// Returns once the session has fully terminated. A failed connection is
    /// reported through `on_error` only, without `on_open` or `on_close`.
    ///
    /// # Errors
    /// Returns an error, before any network activity, if the options or headers are invalid.
    pub async fn synthesize_using_websocket(
        &self,
        options: SynthesizeOptions,
        callback: Arc<dyn SynthesizeCallback>,
    ) -> Result<()> {
        let prepared = self.prepare(&options)?;
        self.connect_and_run(prepared, callback).await;
        Ok(())
    }

    /// Like [`Self::synthesize_using_websocket`], but yields the events as a stream.
    ///
    /// Dropping the stream cancels the session at the next event.
    ///
    /// The session runs on a spawned task, so this must be called from within a
    /// Tokio runtime.
    ///
    /// # Errors
    /// Returns an error if the options or headers are invalid.
    #[allow(clippy::result_large_err)]
    pub fn synthesize_events(&self, options: SynthesizeOptions) -> Result<EventStream> {
        let mut prepared = self.prepare(&options)?;
        let session_token = prepared.settings.cancellation.child_token();
        prepared.settings.cancellation = session_token.clone();
        let (callback, events) = ChannelCallback::channel();
        let callback = callback.cancel_on_disconnect(session_token);
        let service = self.clone();
        tokio::spawn(async move {
            service.connect_and_run(prepared, Arc::new(callback)).await;
        });
        Ok(events)
    }

    #[allow(clippy::result_large_err)]
    fn prepare(&self, options: &SynthesizeOptions) -> Result<PreparedSession> {
        let request = options.request();
        request.validate()?;
        let payload = serde_json::to_string(&request)?;

        let url = self.synthesize_url(options.voice_name(), options.customization())?;
        let mut headers = self.base_headers()?;
        options.apply_headers(&mut headers)?;

        debug!(
            "Prepared synthesize request: voice={:?}, accept={:?}, {} bytes of text",
            options.voice_name(),
            request.accept,
            request.text.len()
        );

        Ok(PreparedSession {
            url,
            headers,
            payload,
            settings: SessionSettings {
                idle_timeout: self.idle_timeout,
                cancellation: options.cancellation_token().cloned().unwrap_or_default(),
            },
        })
    }

    async fn connect_and_run(&self, prepared: PreparedSession, callback: Arc<dyn SynthesizeCallback>) {
        let connection =
            match transport::connect(&prepared.url, prepared.headers, self.connect_timeout).await {
                Ok(connection) => connection,
                Err(err) => {
                    warn!("Failed to connect to Text to Speech: {err}");
                    callback.on_error(err).await;
                    return;
                }
            };

        run_session(connection, callback, prepared.payload, prepared.settings).await;
    }
}
