//! Raw HTTP/1.1 request parsing and response framing.
//!
//! Every connection carries exactly one request and is closed after the
//! response. The request is read into a single fixed-size buffer and parsed
//! in place: method, path and body are views into that buffer. Header fields
//! are not interpreted by the parser and the body is whatever follows the
//! blank line. Requests larger than the buffer are not supported.
//!
//! Responses are either plain (`Content-Length`) or chunked
//! (`Transfer-Encoding: chunked`, one frame per write). Every response
//! carries the CORS headers and `Connection: close`.

use std::io;

use bytes::{BufMut, BytesMut};
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use llmgate_core::utils::json;

/// CORS headers attached to every response.
pub const CORS_HEADERS: &str = "Access-Control-Allow-Origin: *\r\n\
                                Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
                                Access-Control-Allow-Headers: Content-Type, Authorization\r\n";

/// Terminating chunk of a chunked response.
pub const LAST_CHUNK: &[u8] = b"0\r\n\r\n";

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// A parsed request, borrowing from the connection's read buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub body: &'a [u8],
}

impl<'a> HttpRequest<'a> {
    /// The path without its query string.
    pub fn route_path(&self) -> &'a str {
        self.path.split_once('?').map_or(self.path, |(path, _)| path)
    }
}

/// Reasons a request buffer cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RequestParseError {
    /// No blank line terminates the header block.
    #[error("request headers are incomplete")]
    Incomplete,

    /// The request line lacks a method or a path.
    #[error("malformed request line")]
    MalformedRequestLine,
}

/// Parse a complete request held in `buf`.
pub fn parse_request(buf: &[u8]) -> Result<HttpRequest<'_>, RequestParseError> {
    let header_end = find(buf, HEADER_TERMINATOR).ok_or(RequestParseError::Incomplete)?;
    let head = &buf[..header_end];
    let body = &buf[header_end + HEADER_TERMINATOR.len()..];

    let line_end = find(head, b"\r\n").unwrap_or(head.len());
    let line = std::str::from_utf8(&head[..line_end])
        .map_err(|_| RequestParseError::MalformedRequestLine)?;

    let mut parts = line.split(' ');
    let method = parts
        .next()
        .filter(|m| !m.is_empty())
        .ok_or(RequestParseError::MalformedRequestLine)?;
    let path = parts
        .next()
        .filter(|p| !p.is_empty())
        .ok_or(RequestParseError::MalformedRequestLine)?;

    Ok(HttpRequest { method, path, body })
}

/// Read one request into `buf`, returning the number of bytes filled.
///
/// Stops at end of stream, when `buf` is full, or once the header block has
/// arrived together with as many body bytes as a `Content-Length` header
/// announces. Without that header the headers alone complete the request.
pub async fn read_request<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
        if is_complete(&buf[..filled]) {
            break;
        }
    }
    Ok(filled)
}

fn is_complete(buf: &[u8]) -> bool {
    let Some(header_end) = find(buf, HEADER_TERMINATOR) else {
        return false;
    };
    let body_len = buf.len() - header_end - HEADER_TERMINATOR.len();
    content_length(&buf[..header_end]).is_none_or(|expected| body_len >= expected)
}

fn content_length(head: &[u8]) -> Option<usize> {
    let head = std::str::from_utf8(head).ok()?;
    head.split("\r\n").skip(1).find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("content-length")
            .then(|| value.trim().parse().ok())
            .flatten()
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn status_line(status: StatusCode) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n",
        status.as_u16(),
        status.canonical_reason().unwrap_or("")
    )
}

/// Write a complete response with a `Content-Length` body.
pub async fn write_response<W>(
    out: &mut W,
    status: StatusCode,
    content_type: &str,
    body: &[u8],
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let head = format!(
        "{}Content-Type: {content_type}\r\nContent-Length: {}\r\n{CORS_HEADERS}Connection: close\r\n\r\n",
        status_line(status),
        body.len()
    );
    out.write_all(head.as_bytes()).await?;
    out.write_all(body).await?;
    out.flush().await
}

/// Serialize `value` and write it as an `application/json` response.
pub async fn write_json<W, T>(out: &mut W, status: StatusCode, value: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: ?Sized + Serialize,
{
    let body = json::to_vec(value).map_err(io::Error::other)?;
    write_response(out, status, "application/json", &body).await
}

/// Answer a CORS preflight: `204`, CORS headers, no body.
pub async fn write_preflight<W>(out: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let head = format!(
        "{}{CORS_HEADERS}Connection: close\r\n\r\n",
        status_line(StatusCode::NO_CONTENT)
    );
    out.write_all(head.as_bytes()).await?;
    out.flush().await
}

/// A response body sent with chunked transfer encoding.
///
/// Each [`ChunkedWriter::write_chunk`] call becomes one
/// `<hex-length>\r\n<bytes>\r\n` frame and is flushed immediately.
pub struct ChunkedWriter<'a, W> {
    out: &'a mut W,
}

impl<'a, W> ChunkedWriter<'a, W>
where
    W: AsyncWrite + Unpin,
{
    /// Send the response head and return a writer for the body.
    pub async fn start(out: &'a mut W, status: StatusCode, content_type: &str) -> io::Result<Self> {
        let head = format!(
            "{}Content-Type: {content_type}\r\nTransfer-Encoding: chunked\r\nCache-Control: no-cache\r\n{CORS_HEADERS}Connection: close\r\n\r\n",
            status_line(status)
        );
        out.write_all(head.as_bytes()).await?;
        out.flush().await?;
        Ok(Self { out })
    }

    /// Send one chunk. Empty payloads are skipped, since a zero-length
    /// chunk would end the body.
    pub async fn write_chunk(&mut self, payload: &[u8]) -> io::Result<()> {
        if payload.is_empty() {
            return Ok(());
        }
        let mut frame = BytesMut::with_capacity(payload.len() + 12);
        frame.put_slice(format!("{:x}\r\n", payload.len()).as_bytes());
        frame.put_slice(payload);
        frame.put_slice(b"\r\n");
        self.out.write_all(&frame).await?;
        self.out.flush().await
    }

    /// Send the terminating chunk.
    pub async fn finish(self) -> io::Result<()> {
        self.out.write_all(LAST_CHUNK).await?;
        self.out.flush().await
    }
}
