use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ServiceError;

const UNSPECIFIED_SERVICE_ERROR: &str = "unspecified service error";

/// A JSON control message carried in a text frame.
///
/// The frame's keys decide its kind: any `error` key makes it an error,
/// otherwise a `binary_streams` key makes it a stream descriptor, and anything
/// else is read as timing information.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMessage {
    Error(ServiceError),
    StreamDescriptor(StreamDescriptor),
    Timing(TimingInformation),
}

impl ControlMessage {
    /// # Errors
    /// Returns an error if the text is not a JSON object, or a descriptor or
    /// timing object does not have the expected shape.
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        let Value::Object(frame) = serde_json::from_str::<Value>(text)? else {
            return Err(serde_json::Error::custom("control message is not a JSON object"));
        };

        if frame.contains_key("error") {
            return Ok(Self::Error(service_error(&frame)));
        }
        if frame.contains_key("binary_streams") {
            return serde_json::from_value(Value::Object(frame)).map(Self::StreamDescriptor);
        }
        serde_json::from_value(Value::Object(frame)).map(Self::Timing)
    }
}

// Any `error` key is terminal, whatever its value.
fn service_error(frame: &Map<String, Value>) -> ServiceError {
    let error = match frame.get("error") {
        Some(Value::String(message)) => message.clone(),
        Some(Value::Object(body)) => body
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| Value::Object(body.clone()).to_string(), str::to_string),
        Some(Value::Null) | None => UNSPECIFIED_SERVICE_ERROR.to_string(),
        Some(other) => other.to_string(),
    };
    let code = frame
        .get("code")
        .and_then(Value::as_u64)
        .and_then(|code| u16::try_from(code).ok());
    ServiceError { error, code }
}

/// Description of the audio streams the service is about to send.
///
/// Entries are kept as raw JSON; only `content_type` is looked at.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub binary_streams: Vec<Value>,
}

impl StreamDescriptor {
    /// The content type of the first stream, if the service reported one.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.binary_streams
            .iter()
            .find_map(|stream| stream.get("content_type").and_then(Value::as_str))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TimingInformation {
    #[serde(default)]
    pub words: Vec<WordTiming>,
    #[serde(default)]
    pub marks: Vec<MarkTiming>,
}

/// `[word, start_seconds, end_seconds]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WordTiming(pub String, pub f64, pub f64);

impl WordTiming {
    #[must_use]
    pub fn word(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub const fn start(&self) -> f64 {
        self.1
    }

    #[must_use]
    pub const fn end(&self) -> f64 {
        self.2
    }
}

/// `[mark_name, time_seconds]` for an SSML `<mark>` element.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarkTiming(pub String, pub f64);

impl MarkTiming {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub const fn time(&self) -> f64 {
        self.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_takes_priority() {
        let msg = ControlMessage::parse(r#"{"error":"bad voice","binary_streams":[]}"#).unwrap();
        match msg {
            ControlMessage::Error(err) => {
                assert_eq!(err.error, "bad voice");
                assert_eq!(err.code, None);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn error_with_code() {
        let msg = ControlMessage::parse(r#"{"error":"Model not found","code":404}"#).unwrap();
        assert!(matches!(msg, ControlMessage::Error(ServiceError { code: Some(404), .. })));
    }

    #[test]
    fn error_with_malformed_code_is_still_an_error() {
        let msg = ControlMessage::parse(r#"{"error":"boom","code":"E42"}"#).unwrap();
        assert!(matches!(msg, ControlMessage::Error(ServiceError { code: None, .. })));
    }

    #[test]
    fn stream_descriptor_exposes_content_type() {
        let msg = ControlMessage::parse(
            r#"{"binary_streams":[{"content_type":"audio/ogg;codecs=opus"}]}"#,
        )
        .unwrap();
        match msg {
            ControlMessage::StreamDescriptor(descriptor) => {
                assert_eq!(descriptor.content_type(), Some("audio/ogg;codecs=opus"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn opaque_descriptor_without_content_type() {
        let msg = ControlMessage::parse(r#"{"binary_streams":[{"rate":22050}]}"#).unwrap();
        match msg {
            ControlMessage::StreamDescriptor(descriptor) => {
                assert_eq!(descriptor.content_type(), None);
                assert_eq!(descriptor.binary_streams.len(), 1);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn words_parse_as_timing() {
        let msg = ControlMessage::parse(r#"{"words":[["hi",0,0.3],["there",0.3,0.71]]}"#).unwrap();
        match msg {
            ControlMessage::Timing(timing) => {
                assert_eq!(timing.words.len(), 2);
                assert_eq!(timing.words[0].word(), "hi");
                assert!((timing.words[0].end() - 0.3).abs() < f64::EPSILON);
                assert_eq!(timing.words[1].word(), "there");
                assert!(timing.marks.is_empty());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn marks_parse_as_timing() {
        let msg = ControlMessage::parse(r#"{"marks":[["here",0.52]]}"#).unwrap();
        match msg {
            ControlMessage::Timing(timing) => {
                assert_eq!(timing.marks[0].name(), "here");
                assert!(timing.words.is_empty());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn structured_error_body_is_still_an_error() {
        let msg = ControlMessage::parse(r#"{"error":{"message":"bad voice"},"code":400}"#).unwrap();
        assert_eq!(
            msg,
            ControlMessage::Error(ServiceError {
                error: "bad voice".to_string(),
                code: Some(400),
            })
        );

        let msg = ControlMessage::parse(r#"{"error":{"reason":"quota"}}"#).unwrap();
        match msg {
            ControlMessage::Error(err) => assert!(err.error.contains("quota")),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn null_error_is_still_an_error() {
        let msg = ControlMessage::parse(r#"{"error":null,"words":[]}"#).unwrap();
        match msg {
            ControlMessage::Error(err) => assert_eq!(err.error, UNSPECIFIED_SERVICE_ERROR),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn malformed_descriptor_is_not_timing() {
        assert!(ControlMessage::parse(r#"{"binary_streams":null}"#).is_err());
        assert!(ControlMessage::parse(r#"{"binary_streams":"audio/wav"}"#).is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(ControlMessage::parse("not json").is_err());
        assert!(ControlMessage::parse(r#""just a string""#).is_err());
        assert!(ControlMessage::parse("[]").is_err());
    }
}
