pub mod ws;

pub use ws::{WsStream, connect};

use futures::{Sink, Stream};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

pub type WsResult<T> = std::result::Result<T, WsError>;

/// A bidirectional WebSocket message channel a synthesis session can run on.
///
/// [`WsStream`] is the production implementation; anything else that speaks
/// tungstenite messages (a proxy, a test double) works too.
pub trait Connection:
    Stream<Item = WsResult<Message>> + Sink<Message, Error = WsError> + Send + 'static
{
}

impl<T> Connection for T where
    T: Stream<Item = WsResult<Message>> + Sink<Message, Error = WsError> + Send + 'static
{
}
