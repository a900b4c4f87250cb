//! Raw HTTP exchange and chunked-body decoding.

#![allow(dead_code)]

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Send `request` verbatim and read until the server closes.
pub async fn exchange(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr)
        .await
        .expect("Failed to connect to gateway");
    stream
        .write_all(request)
        .await
        .expect("Failed to send request");
    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .await
        .expect("Failed to read response");
    response
}

/// Build a `POST` request with a JSON body.
pub fn post(path: &str, body: &str) -> Vec<u8> {
    format!(
        "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()
}

/// Split a response into its header block and body.
pub fn split(response: &[u8]) -> (String, Vec<u8>) {
    let end = response
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("Response has no header terminator");
    let head = String::from_utf8(response[..end].to_vec()).expect("Headers are not UTF-8");
    (head, response[end + 4..].to_vec())
}

/// Decode a chunked body into its chunk payloads, checking the framing.
pub fn dechunk(body: &[u8]) -> Vec<Vec<u8>> {
    let mut chunks = Vec::new();
    let mut rest = body;
    loop {
        let line_end = rest
            .windows(2)
            .position(|w| w == b"\r\n")
            .expect("Chunk size line is not terminated");
        let size_hex = std::str::from_utf8(&rest[..line_end]).expect("Chunk size is not UTF-8");
        let size = usize::from_str_radix(size_hex, 16).expect("Chunk size is not hex");
        rest = &rest[line_end + 2..];
        if size == 0 {
            assert_eq!(rest, b"\r\n", "Body must end with the terminating chunk");
            return chunks;
        }
        chunks.push(rest[..size].to_vec());
        assert_eq!(&rest[size..size + 2], b"\r\n", "Chunk payload is not terminated");
        rest = &rest[size + 2..];
    }
}

/// Chunk payloads as strings.
pub fn dechunk_text(body: &[u8]) -> Vec<String> {
    dechunk(body)
        .into_iter()
        .map(|c| String::from_utf8(c).expect("Chunk is not UTF-8"))
        .collect()
}
