use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{WebSocketStream, accept_hdr_async};
use watson_tts_ws::{
    Authenticator, DetailedResponse, Error, StreamDescriptor, SynthesisEvent, SynthesizeCallback,
    SynthesizeOptions, TextToSpeech, TimingInformation,
};

type ServerSocket = WebSocketStream<TcpStream>;

struct Upgrade {
    uri: String,
    authorization: Option<String>,
}

/// Accept one connection, report the upgrade request, then hand the socket to `script`.
async fn serve_once<F, Fut>(script: F) -> (String, oneshot::Receiver<Upgrade>, JoinHandle<()>)
where
    F: FnOnce(ServerSocket) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (upgrade_tx, upgrade_rx) = oneshot::channel();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let inspect = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
            let upgrade = Upgrade {
                uri: req.uri().to_string(),
                authorization: req
                    .headers()
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
            };
            let _ = upgrade_tx.send(upgrade);
            Ok(resp)
        };
        let ws = accept_hdr_async(stream, inspect).await.unwrap();
        script(ws).await;
    });

    (format!("http://{addr}"), upgrade_rx, handle)
}

async fn close_normally(ws: &mut ServerSocket) {
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: String::from("done").into(),
    };
    ws.send(Message::Close(Some(frame))).await.unwrap();
    while let Some(Ok(_)) = ws.next().await {}
}

fn service(url: &str) -> TextToSpeech {
    TextToSpeech::builder()
        .service_url(url)
        .authenticator(Authenticator::bearer("test-token"))
        .connect_timeout(Some(Duration::from_secs(5)))
        .build()
        .unwrap()
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }
}

#[async_trait]
impl SynthesizeCallback for Recorder {
    async fn on_open(&self) {
        self.push("open");
    }

    async fn on_close(&self) {
        self.push("close");
    }

    async fn on_error(&self, error: Error) {
        match error {
            Error::Service(err) => self.push(format!("error:{}", err.error)),
            Error::WebSocket(_) => self.push("error:websocket"),
            other => self.push(format!("error:{other}")),
        }
    }

    async fn on_data(&self, response: DetailedResponse) {
        self.push(format!("data:{}", response.result.len()));
    }

    async fn on_timing_information(&self, timings: TimingInformation) {
        self.push(format!("timing:{}", timings.words.len()));
    }

    async fn on_content_type(&self, descriptor: StreamDescriptor) {
        self.push(format!("content_type:{}", descriptor.content_type().unwrap_or("?")));
    }
}

#[tokio::test]
async fn synthesizes_audio_over_websocket() {
    let (request_tx, request_rx) = oneshot::channel::<serde_json::Value>();
    let (url, upgrade_rx, server) = serve_once(|mut ws| async move {
        let Some(Ok(Message::Text(request))) = ws.next().await else {
            panic!("expected the synthesize request");
        };
        request_tx.send(serde_json::from_str(&request).unwrap()).unwrap();

        let descriptor = r#"{"binary_streams":[{"content_type":"audio/wav"}]}"#;
        ws.send(Message::Text(descriptor.to_string().into())).await.unwrap();
        ws.send(Message::Binary(vec![0u8; 5].into())).await.unwrap();
        ws.send(Message::Binary(vec![0u8; 3].into())).await.unwrap();
        ws.send(Message::Text(r#"{"words":[["hi",0,0.3]]}"#.to_string().into()))
            .await
            .unwrap();
        close_normally(&mut ws).await;
    })
    .await;

    let recorder = Arc::new(Recorder::default());
    let options = SynthesizeOptions::new("hi")
        .voice("en-US_AllisonV3Voice")
        .accept("audio/wav")
        .word_timings();

    tokio::time::timeout(
        Duration::from_secs(10),
        service(&url).synthesize_using_websocket(options, recorder.clone()),
    )
    .await
    .expect("session finished")
    .unwrap();
    server.await.unwrap();

    assert_eq!(
        recorder.events(),
        vec!["open", "content_type:audio/wav", "data:5", "data:3", "timing:1", "close"]
    );

    let upgrade = upgrade_rx.await.unwrap();
    assert_eq!(upgrade.uri, "/v1/synthesize?voice=en-US_AllisonV3Voice");
    assert_eq!(upgrade.authorization.as_deref(), Some("Bearer test-token"));

    let request = request_rx.await.unwrap();
    assert_eq!(
        request,
        serde_json::json!({ "text": "hi", "accept": "audio/wav", "timings": ["words"] })
    );
}

#[tokio::test]
async fn service_error_ends_session() {
    let (url, _upgrade, server) = serve_once(|mut ws| async move {
        let _request = ws.next().await;
        ws.send(Message::Text(r#"{"error":"bad voice"}"#.to_string().into()))
            .await
            .unwrap();
        // The client closes after an error frame; drain until it does.
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await;

    let recorder = Arc::new(Recorder::default());
    tokio::time::timeout(
        Duration::from_secs(10),
        service(&url).synthesize_using_websocket(SynthesizeOptions::new("hi"), recorder.clone()),
    )
    .await
    .expect("session finished")
    .unwrap();
    server.await.unwrap();

    assert_eq!(recorder.events(), vec!["open", "error:bad voice", "close"]);
}

#[tokio::test]
async fn connection_failure_reports_error_only() {
    // Bind and drop to get a port nothing listens on.
    let addr = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();

    let recorder = Arc::new(Recorder::default());
    tokio::time::timeout(
        Duration::from_secs(10),
        service(&format!("http://{addr}"))
            .synthesize_using_websocket(SynthesizeOptions::new("hi"), recorder.clone()),
    )
    .await
    .expect("session finished")
    .unwrap();

    assert_eq!(recorder.events(), vec!["error:websocket"]);
}

#[tokio::test]
async fn invalid_options_fail_before_connecting() {
    let recorder = Arc::new(Recorder::default());
    let result = service("http://127.0.0.1:9")
        .synthesize_using_websocket(SynthesizeOptions::new(""), recorder.clone())
        .await;

    assert!(matches!(result, Err(Error::InvalidOptions(_))));
    assert!(recorder.events().is_empty());
}

#[tokio::test]
async fn event_stream_yields_session_events() {
    let (url, _upgrade, server) = serve_once(|mut ws| async move {
        let _request = ws.next().await;
        ws.send(Message::Binary(vec![1u8, 2, 3, 4].into())).await.unwrap();
        close_normally(&mut ws).await;
    })
    .await;

    let mut events = service(&url)
        .synthesize_events(SynthesizeOptions::new("hello"))
        .unwrap();

    let mut seen = Vec::new();
    while let Some(event) = tokio::time::timeout(Duration::from_secs(10), events.next())
        .await
        .expect("event arrived")
    {
        let done = event.is_terminal();
        seen.push(event);
        if done {
            break;
        }
    }
    server.await.unwrap();

    assert_eq!(seen.len(), 3);
    assert!(matches!(seen[0], SynthesisEvent::Open));
    match &seen[1] {
        SynthesisEvent::Audio(chunk) => assert_eq!(&chunk.result[..], &[1u8, 2, 3, 4]),
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(matches!(seen[2], SynthesisEvent::Close));
}
