//! Server-sent event feed of assistant message snapshots.
//!
//! `GET {base}/events?userId=…` keeps a connection open and emits one SSE
//! event per snapshot. Each event's `data:` lines join into a JSON
//! `Message`. Comment lines (`:keepalive`) and other fields are ignored.
//!
//! Frames can split across body chunks at any byte, including inside a
//! multi-byte character, so raw bytes are buffered until a full line is
//! available.

use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};

use parley_types::chat::Message;
use parley_types::error::ChatServiceError;

use super::client::status_error;

/// Longest line the parser buffers while waiting for its newline.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Incremental SSE frame parser.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to hold no newline.
    scanned: usize,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a body chunk; returns the data payload of every event it completed.
    ///
    /// Fails with `Decode` once a pending line grows past `MAX_LINE_BYTES`;
    /// the partial line and event are discarded.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, ChatServiceError> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
            let end = self.scanned + offset;
            let line = String::from_utf8_lossy(&self.buffer[start..end]);
            take_line(&mut self.data, &mut events, &line);
            start = end + 1;
            self.scanned = start;
        }
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();

        if self.buffer.len() > MAX_LINE_BYTES {
            let pending = self.buffer.len();
            self.buffer.clear();
            self.scanned = 0;
            self.data.clear();
            return Err(ChatServiceError::Decode(format!(
                "stream line exceeds {MAX_LINE_BYTES} bytes ({pending} pending)"
            )));
        }
        Ok(events)
    }
}

fn take_line(data: &mut Vec<String>, events: &mut Vec<String>, line: &str) {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.is_empty() {
        if !data.is_empty() {
            events.push(data.join("\n"));
            data.clear();
        }
    } else if let Some(value) = line.strip_prefix("data:") {
        data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
    }
}

/// Decode one event payload into a message snapshot.
pub fn parse_event_data(data: &str) -> Result<Message, ChatServiceError> {
    serde_json::from_str(data)
        .map_err(|e| ChatServiceError::Decode(format!("stream event: {e}")))
}

/// Open the event stream and yield decoded snapshots.
///
/// Connection and status failures, and oversized lines, yield one `Err` and
/// end the stream. A payload that fails to decode yields an `Err` and the
/// stream continues.
pub fn open_event_stream(
    client: &reqwest::Client,
    url: reqwest::Url,
    user_id: &str,
    api_key: &SecretString,
) -> Pin<Box<dyn Stream<Item = Result<Message, ChatServiceError>> + Send + 'static>> {
    let request = client
        .get(url)
        .query(&[("userId", user_id)])
        .bearer_auth(api_key.expose_secret())
        .header("Accept", "text/event-stream");

    Box::pin(async_stream::stream! {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                yield Err(ChatServiceError::Transport(format!("event stream connect: {e}")));
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            yield Err(status_error(status.as_u16(), body));
            return;
        }

        tracing::debug!("event stream connected");
        let mut byte_stream = response.bytes_stream();
        let mut parser = SseParser::new();

        while let Some(chunk) = byte_stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(ChatServiceError::Transport(format!("event stream read: {e}")));
                    return;
                }
            };
            match parser.push(&chunk) {
                Ok(events) => {
                    for data in events {
                        yield parse_event_data(&data);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: {\"a\":1}\n\n").unwrap();
        assert_eq!(events, vec!["{\"a\":1}".to_string()]);
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"data: hel").unwrap().is_empty());
        assert!(parser.push(b"lo\n").unwrap().is_empty());
        assert_eq!(parser.push(b"\n").unwrap(), vec!["hello".to_string()]);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let mut parser = SseParser::new();
        let bytes = "data: héllo\n\n".as_bytes();
        // Split inside the two-byte 'é'.
        let split = 8;
        assert!(parser.push(&bytes[..split]).unwrap().is_empty());
        assert_eq!(parser.push(&bytes[split..]).unwrap(), vec!["héllo".to_string()]);
    }

    #[test]
    fn test_crlf_and_comments_and_multiline_data() {
        let mut parser = SseParser::new();
        let events = parser.push(b":keepalive\r\n\r\nevent: message\r\ndata: one\r\ndata: two\r\n\r\n").unwrap();
        assert_eq!(events, vec!["one\ntwo".to_string()]);
    }

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: a\n\ndata: b\n\ndata: c").unwrap();
        assert_eq!(events, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(parser.push(b"\n\n").unwrap(), vec!["c".to_string()]);
    }

    #[test]
    fn test_long_line_in_many_chunks() {
        let mut parser = SseParser::new();
        let payload = "x".repeat(10_000);
        assert!(parser.push(b"data: ").unwrap().is_empty());
        for piece in payload.as_bytes().chunks(7) {
            assert!(parser.push(piece).unwrap().is_empty());
        }
        assert_eq!(parser.push(b"\n\n").unwrap(), vec![payload]);
    }

    #[test]
    fn test_oversized_line_is_rejected_and_parser_recovers() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"data: ").unwrap().is_empty());
        let err = parser.push(&vec![b'x'; MAX_LINE_BYTES]).unwrap_err();
        assert!(matches!(err, ChatServiceError::Decode(_)));

        assert_eq!(parser.push(b"data: ok\n\n").unwrap(), vec!["ok".to_string()]);
    }

    #[test]
    fn test_parse_event_data_snapshot() {
        let message = parse_event_data(
            r#"{"content":"He","isUser":false,"timestamp":"2026-01-05T10:00:00Z","isStreaming":true,"conversationId":"c1"}"#,
        )
        .unwrap();
        assert_eq!(message.content, "He");
        assert!(message.is_streaming);
        assert!(!message.is_user);
        assert_eq!(message.conversation_id.unwrap().as_str(), "c1");
    }

    #[test]
    fn test_parse_event_data_rejects_garbage() {
        let err = parse_event_data("not json").unwrap_err();
        assert!(matches!(err, ChatServiceError::Decode(_)));
    }
}
