//! Request serialization
//!
//! The header block is frozen at submission time (it embeds the endpoint's
//! `Host` and the body's `Content-Length`); the request line is prepended
//! when the request is actually drained onto the wire.

use headers::Headers;
use client::Method;

/// Serializes the caller's headers into a complete header block:
/// every caller pair as `Name: Value`, a synthesized `Host` when the
/// caller did not provide one, and the terminating
/// `Content-Length` + blank line.
pub fn serialize_headers(headers: &Headers, host: &str, port: u16,
    content_length: usize) -> Vec<u8>
{
    let mut block = Vec::with_capacity(64);
    let mut has_host = false;
    for (name, value) in headers.iter() {
        if name.eq_ignore_ascii_case("Host") {
            has_host = true;
        }
        block.extend_from_slice(name.as_bytes());
        block.extend_from_slice(b": ");
        block.extend_from_slice(value);
        block.extend_from_slice(b"\r\n");
    }
    if !has_host {
        block.extend_from_slice(
            format!("Host: {}:{}\r\n", host, port).as_bytes());
    }
    block.extend_from_slice(
        format!("Content-Length: {}\r\n\r\n", content_length).as_bytes());
    block
}

/// Builds the wire message: `<METHOD> <path> HTTP/1.1` followed by the
/// frozen header block. The body travels separately.
pub fn build_message(method: Method, path: &str, header_block: &[u8])
    -> Vec<u8>
{
    let mut message =
        Vec::with_capacity(path.len() + header_block.len() + 16);
    message.extend_from_slice(method.as_str().as_bytes());
    message.push(b' ');
    message.extend_from_slice(path.as_bytes());
    message.extend_from_slice(b" HTTP/1.1\r\n");
    message.extend_from_slice(header_block);
    message
}
