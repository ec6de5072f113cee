//! A non-blocking HTTP/1.1 client without an event loop
//!
//! The client never blocks and never spawns: all progress is made by the
//! caller repeatedly invoking [`HttpClient::process_item`], which drives the
//! underlying [`Transport`] and the connection state machine one step.
//! Requests are submitted with [`HttpClient::execute_request`] and complete
//! through per-request callbacks, in submission order.
//!
//! The response parser ([`ResponseCodec`]) is usable on its own: it accepts
//! arbitrarily fragmented bytes of an HTTP/1.1 response stream and emits
//! exactly one completion per response, handling both `Content-Length` and
//! `Transfer-Encoding: chunked` framing.
extern crate httparse;
extern crate netbuf;
#[macro_use(quick_error)] extern crate quick_error;
#[macro_use] extern crate matches;
#[macro_use] extern crate log;

pub mod client;
pub mod transport;
mod chunked;
mod codec;
mod headers;

pub use client::{HttpClient, Error, Method};
pub use codec::{ResponseCodec, Response, ParseError};
pub use headers::{Headers, HeaderError};
pub use transport::{Transport, TransportEvents};
pub use transport::{OpenResult, SendResult, IoErrorKind};
