//! The byte-stream transport contract the client is built over
//!
//! A transport is anything that can open a connection to one remote
//! endpoint, push byte buffers at it, and hand back whatever bytes arrive:
//! a plain TCP socket, a TLS session, an in-memory pipe in tests. All of
//! its work is assumed non-blocking; completions are reported through
//! `TransportEvents` callbacks invoked synchronously from within
//! `Transport::process`.

use std::io;

/// Outcome of an asynchronous open attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenResult {
    Ok,
    Failed,
}

/// Outcome of an asynchronous send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendResult {
    Ok,
    Failed,
}

/// Classified transport-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoErrorKind {
    /// The transport ran out of memory or buffers
    Memory,
    /// The peer disconnected
    Disconnection,
    /// Anything else
    Other,
}

/// Receiver of transport events.
///
/// All methods are invoked from inside `Transport::process`, on the
/// caller's thread, one at a time.
pub trait TransportEvents {
    /// An `open` issued earlier has finished.
    fn on_open_complete(&mut self, result: OpenResult);

    /// Bytes arrived from the peer. The slice is only valid for the
    /// duration of the call.
    fn on_bytes_received(&mut self, data: &[u8]);

    /// A `send` issued earlier has finished.
    fn on_send_complete(&mut self, result: SendResult);

    /// A `close` issued earlier has finished; the connection is gone.
    fn on_close_complete(&mut self);

    /// The transport failed outside of any particular operation.
    fn on_io_error(&mut self, error: IoErrorKind);
}

/// A non-blocking connection to a single remote endpoint.
///
/// `open`, `close` and `send` only *start* the operation; each completes
/// through the matching `TransportEvents` callback during a later
/// `process` call. An `Err` return means the operation could not even be
/// started.
pub trait Transport {
    fn open(&mut self) -> io::Result<()>;

    fn close(&mut self) -> io::Result<()>;

    /// Queues `data` for transmission. The slice is copied or written out
    /// before the call returns.
    fn send(&mut self, data: &[u8]) -> io::Result<()>;

    /// Makes whatever progress the underlying I/O allows and reports it
    /// through `handler`. Never blocks.
    fn process(&mut self, handler: &mut dyn TransportEvents);

    /// The remote hostname and port this transport is pointed at, as used
    /// for the `Host` request header.
    fn endpoint(&self) -> (&str, u16);
}
