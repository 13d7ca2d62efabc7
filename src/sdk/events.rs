use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::callback::{DetailedResponse, SynthesizeCallback};
use crate::Error;
use crate::protocol::{StreamDescriptor, TimingInformation};

const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Session callbacks as values, for callers that prefer matching over a trait impl.
#[derive(Debug)]
pub enum SynthesisEvent {
    Open,
    ContentType(StreamDescriptor),
    Audio(DetailedResponse),
    Timing(TimingInformation),
    Error(Error),
    Close,
}

impl SynthesisEvent {
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Close)
    }
}

/// Forwards every callback into a bounded channel.
///
/// A full channel holds up the read loop rather than dropping audio.
pub struct ChannelCallback {
    tx: mpsc::Sender<SynthesisEvent>,
    disconnect: Option<CancellationToken>,
}

impl ChannelCallback {
    #[must_use]
    pub fn channel() -> (Self, EventStream) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (
            Self {
                tx,
                disconnect: None,
            },
            EventStream::new(rx),
        )
    }

    /// Cancel `token` once the [`EventStream`] has been dropped.
    #[must_use]
    pub fn cancel_on_disconnect(mut self, token: CancellationToken) -> Self {
        self.disconnect = Some(token);
        self
    }

    async fn forward(&self, event: SynthesisEvent) {
        if self.tx.send(event).await.is_ok() {
            return;
        }
        match &self.disconnect {
            Some(token) if !token.is_cancelled() => {
                tracing::debug!("Event stream dropped; cancelling synthesis session");
                token.cancel();
            }
            _ => tracing::debug!("Synthesis event dropped: receiver gone"),
        }
    }
}

#[async_trait]
impl SynthesizeCallback for ChannelCallback {
    async fn on_open(&self) {
        self.forward(SynthesisEvent::Open).await;
    }

    async fn on_close(&self) {
        self.forward(SynthesisEvent::Close).await;
    }

    async fn on_error(&self, error: Error) {
        self.forward(SynthesisEvent::Error(error)).await;
    }

    async fn on_data(&self, response: DetailedResponse) {
        self.forward(SynthesisEvent::Audio(response)).await;
    }

    async fn on_timing_information(&self, timings: TimingInformation) {
        self.forward(SynthesisEvent::Timing(timings)).await;
    }

    async fn on_content_type(&self, descriptor: StreamDescriptor) {
        self.forward(SynthesisEvent::ContentType(descriptor)).await;
    }
}

pub struct EventStream {
    rx: mpsc::Receiver<SynthesisEvent>,
}

impl EventStream {
    #[must_use]
    pub const fn new(rx: mpsc::Receiver<SynthesisEvent>) -> Self {
        Self { rx }
    }

    /// Await the next event; `None` once the session is over and all events are drained.
    pub async fn next_event(&mut self) -> Option<SynthesisEvent> {
        self.rx.recv().await
    }
}

impl Stream for EventStream {
    type Item = SynthesisEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.rx).poll_recv(cx)
    }
}
