//! Streaming record encoders layered over chunked transfer encoding.
//!
//! OpenAI clients expect event-stream frames (`data: <json>\n\n`, closed by
//! `data: [DONE]\n\n`); Ollama clients expect one JSON object per line.
//! Each record is written as exactly one HTTP chunk.

use std::io;

use bytes::{BufMut, BytesMut};
use http::StatusCode;
use serde::Serialize;
use tokio::io::AsyncWrite;

use llmgate_core::utils::json;

use crate::wire::ChunkedWriter;

/// Event-stream terminator sent after the last OpenAI record.
pub const SSE_DONE: &[u8] = b"data: [DONE]\n\n";

/// Record framing of a streamed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    /// `data: <json>\n\n` frames.
    EventStream,
    /// `<json>\n` lines.
    Ndjson,
}

impl StreamFormat {
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::EventStream => "text/event-stream",
            Self::Ndjson => "application/x-ndjson",
        }
    }

    /// Frame one serialized record.
    pub fn frame(self, record: &[u8]) -> BytesMut {
        let mut frame = BytesMut::with_capacity(record.len() + 8);
        match self {
            Self::EventStream => {
                frame.put_slice(b"data: ");
                frame.put_slice(record);
                frame.put_slice(b"\n\n");
            }
            Self::Ndjson => {
                frame.put_slice(record);
                frame.put_u8(b'\n');
            }
        }
        frame
    }
}

/// Writes framed JSON records as chunks of one streamed response.
pub struct StreamWriter<'a, W> {
    chunks: ChunkedWriter<'a, W>,
    format: StreamFormat,
}

impl<'a, W> StreamWriter<'a, W>
where
    W: AsyncWrite + Unpin,
{
    /// Send `200` chunked headers for `format`.
    pub async fn start(out: &'a mut W, format: StreamFormat) -> io::Result<Self> {
        let chunks = ChunkedWriter::start(out, StatusCode::OK, format.content_type()).await?;
        Ok(Self { chunks, format })
    }

    /// Serialize `record` and send it as one framed chunk.
    pub async fn send<T: Serialize + ?Sized>(&mut self, record: &T) -> io::Result<()> {
        let body = json::to_vec(record).map_err(io::Error::other)?;
        let frame = self.format.frame(&body);
        self.chunks.write_chunk(&frame).await
    }

    /// Send pre-framed bytes as one chunk.
    pub async fn send_raw(&mut self, payload: &[u8]) -> io::Result<()> {
        self.chunks.write_chunk(payload).await
    }

    /// Send the terminating chunk, preceded by `[DONE]` for event streams.
    pub async fn finish(mut self) -> io::Result<()> {
        if self.format == StreamFormat::EventStream {
            self.chunks.write_chunk(SSE_DONE).await?;
        }
        self.chunks.finish().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_stream_frame() {
        let frame = StreamFormat::EventStream.frame(br#"{"a":1}"#);
        assert_eq!(&frame[..], b"data: {\"a\":1}\n\n");
    }

    #[test]
    fn test_ndjson_frame() {
        let frame = StreamFormat::Ndjson.frame(br#"{"a":1}"#);
        assert_eq!(&frame[..], b"{\"a\":1}\n");
    }

    #[tokio::test]
    async fn test_event_stream_ends_with_done() {
        let mut out = Vec::new();

        let mut writer = StreamWriter::start(&mut out, StreamFormat::EventStream)
            .await
            .unwrap();
        writer.send(&json!({"x": "y"})).await.unwrap();
        writer.finish().await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Content-Type: text/event-stream\r\n"));
        assert!(text.ends_with("e\r\ndata: [DONE]\n\n\r\n0\r\n\r\n"));
        assert!(text.contains("data: {\"x\":\"y\"}\n\n"));
    }

    #[tokio::test]
    async fn test_ndjson_escapes_control_characters() {
        let mut out = Vec::new();

        let mut writer = StreamWriter::start(&mut out, StreamFormat::Ndjson)
            .await
            .unwrap();
        writer.send(&json!({"response": "a\u{1}b"})).await.unwrap();
        writer.finish().await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("{\"response\":\"a\\u0001b\"}\n"));
        assert!(!text.contains("[DONE]"));
    }
}
