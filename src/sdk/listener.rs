use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{Mutex, oneshot};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::callback::{DetailedResponse, SynthesizeCallback};
use crate::protocol::ControlMessage;
use crate::transport::{Connection, WsResult};
use crate::{Error, Result, TRACE_LOG_MAX_BYTES, safe_truncate};

/// Upper bound on the local close handshake.
const LOCAL_CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-session knobs for the read loop.
#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    /// Give up when no frame arrives for this long.
    pub idle_timeout: Option<Duration>,
    /// Cancelling this closes the connection and ends the session without an error.
    pub cancellation: CancellationToken,
}

enum Termination {
    Normal,
    Cancelled,
    Failed(Error),
}

/// Drives one synthesis request over one connection.
///
/// The write half sits behind a mutex shared by the writer (one request) and
/// the reader (the local close). Only the reader closes the connection, once,
/// when its loop exits.
pub struct SynthesisListener<C> {
    sink: Mutex<SplitSink<C, Message>>,
    callback: Arc<dyn SynthesizeCallback>,
    idle_timeout: Option<Duration>,
    cancellation: CancellationToken,
    // Child of `cancellation`; also tripped when the request write fails or the reader exits.
    shutdown: CancellationToken,
    request_sent: AtomicBool,
    error_reported: AtomicBool,
}

impl<C: Connection> SynthesisListener<C> {
    pub fn new(
        sink: SplitSink<C, Message>,
        callback: Arc<dyn SynthesizeCallback>,
        settings: SessionSettings,
    ) -> Self {
        let shutdown = settings.cancellation.child_token();
        Self {
            sink: Mutex::new(sink),
            callback,
            idle_timeout: settings.idle_timeout,
            cancellation: settings.cancellation,
            shutdown,
            request_sent: AtomicBool::new(false),
            error_reported: AtomicBool::new(false),
        }
    }

    pub async fn open(&self) {
        debug!("Synthesis session opened");
        self.callback.on_open().await;
    }

    /// Write the request payload as a single text frame.
    ///
    /// A transport failure goes to the error callback and stops the reader.
    ///
    /// # Errors
    /// Returns [`Error::RequestAlreadySent`] if a request was already written on this connection.
    pub async fn send_request(&self, payload: String) -> Result<()> {
        if self.request_sent.swap(true, Ordering::AcqRel) {
            return Err(Error::RequestAlreadySent);
        }

        trace!("Sending synthesize request: {}", safe_truncate(&payload, TRACE_LOG_MAX_BYTES));
        let write = async {
            let mut sink = self.sink.lock().await;
            sink.send(Message::Text(payload.into())).await
        };
        let sent = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => {
                debug!("Session ended before the synthesize request was written");
                return Ok(());
            }
            sent = write => sent,
        };

        match sent {
            Ok(()) => {}
            Err(err) if is_normal_closure(&err) => {
                debug!("Connection already closed before the synthesize request was sent");
            }
            Err(err) => {
                warn!("Failed to send synthesize request: {err}");
                self.report_error(err.into()).await;
                self.shutdown.cancel();
            }
        }
        Ok(())
    }

    /// Read and dispatch frames until the connection ends, then close it and
    /// fire the termination signal.
    pub async fn receive(&self, mut stream: SplitStream<C>, done: oneshot::Sender<()>) {
        match self.read_frames(&mut stream).await {
            Termination::Normal => info!("Synthesis stream closed by the service"),
            Termination::Cancelled if self.cancellation.is_cancelled() => {
                info!("Synthesis session cancelled");
            }
            Termination::Cancelled => debug!("Synthesis read loop stopped after a failed write"),
            Termination::Failed(err) => {
                warn!("Synthesis session failed: {err}");
                self.report_error(err).await;
            }
        }

        // Releases a writer still blocked on the sink.
        self.shutdown.cancel();
        self.close_connection().await;

        if done.send(()).is_err() {
            debug!("Termination signal had no waiter");
        }
    }

    /// Wait for the reader to finish, then report the session closed.
    pub async fn close(&self, done: oneshot::Receiver<()>) {
        if done.await.is_err() {
            warn!("Synthesis reader stopped without signalling termination");
        }
        self.callback.on_close().await;
        debug!("Synthesis session closed");
    }

    async fn read_frames(&self, stream: &mut SplitStream<C>) -> Termination {
        loop {
            let frame = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return Termination::Cancelled,
                frame = self.next_frame(stream) => frame,
            };

            let message = match frame {
                Ok(Some(Ok(message))) => message,
                Ok(Some(Err(err))) if is_normal_closure(&err) => return Termination::Normal,
                Ok(Some(Err(err))) => return Termination::Failed(err.into()),
                Ok(None) => return Termination::Normal,
                Err(err) => return Termination::Failed(err),
            };

            if let Some(termination) = self.dispatch(message).await {
                return termination;
            }
        }
    }

    async fn next_frame(&self, stream: &mut SplitStream<C>) -> Result<Option<WsResult<Message>>> {
        match self.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, stream.next())
                .await
                .map_err(|_| Error::Timeout(limit)),
            None => Ok(stream.next().await),
        }
    }

    async fn dispatch(&self, message: Message) -> Option<Termination> {
        match message {
            Message::Text(text) => match ControlMessage::parse(&text) {
                Ok(ControlMessage::Error(err)) => {
                    return Some(Termination::Failed(Error::Service(err)));
                }
                Ok(ControlMessage::StreamDescriptor(descriptor)) => {
                    debug!("Received stream descriptor: {:?}", descriptor.content_type());
                    self.callback.on_content_type(descriptor).await;
                }
                Ok(ControlMessage::Timing(timings)) => {
                    debug!(
                        "Received timing information: {} words, {} marks",
                        timings.words.len(),
                        timings.marks.len()
                    );
                    self.callback.on_timing_information(timings).await;
                }
                Err(err) => {
                    warn!(
                        "Unrecognized control message: {}",
                        safe_truncate(&text, TRACE_LOG_MAX_BYTES)
                    );
                    return Some(Termination::Failed(err.into()));
                }
            },
            Message::Binary(data) => {
                trace!("Received audio chunk: {} bytes", data.len());
                self.callback.on_data(DetailedResponse::audio_chunk(data)).await;
            }
            Message::Close(frame) => return Some(close_termination(frame)),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
        None
    }

    async fn close_connection(&self) {
        let close = async {
            let mut sink = self.sink.lock().await;
            sink.close().await
        };
        match tokio::time::timeout(LOCAL_CLOSE_TIMEOUT, close).await {
            Ok(Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                debug!("Synthesis connection closed locally");
            }
            Ok(Err(err)) => warn!("Failed to close synthesis connection: {err}"),
            Err(_) => warn!(
                "Synthesis connection did not close within {LOCAL_CLOSE_TIMEOUT:?}; dropping it"
            ),
        }
    }

    async fn report_error(&self, error: Error) {
        if self.error_reported.swap(true, Ordering::AcqRel) {
            debug!("Suppressing follow-up error: {error}");
            return;
        }
        self.callback.on_error(error).await;
    }
}

const fn is_normal_closure(err: &WsError) -> bool {
    matches!(err, WsError::ConnectionClosed | WsError::AlreadyClosed)
}

fn close_termination(frame: Option<CloseFrame>) -> Termination {
    match frame {
        None => Termination::Normal,
        Some(frame) if frame.code == CloseCode::Normal => Termination::Normal,
        Some(frame) => Termination::Failed(Error::AbnormalClosure {
            code: frame.code.into(),
            reason: frame.reason.to_string(),
        }),
    }
}
