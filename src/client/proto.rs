//! Connection lifecycle and request/response pairing
//!
//! All progress happens inside `process_item`: the transport gets driven
//! one step (which feeds received bytes into the codec and surfaces
//! open/send/close completions), then the state machine reacts. User
//! callbacks are always delivered from here, never from inside `open`,
//! `close` or `execute_request`.

use std::collections::VecDeque;

use codec::{ResponseCodec, Response, ParseError};
use headers::Headers;
use transport::{Transport, TransportEvents};
use transport::{OpenResult, SendResult, IoErrorKind};
use client::{Method, Error};
use client::encoder;

/// Called exactly once per submitted request, with the parsed response or
/// the error that took its place.
pub type ResponseHandler =
    Box<dyn FnOnce(Result<Response, Error>) + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    NotConnected,
    Opening,
    /// Transport reported open; user callback not yet delivered
    Opened,
    Open,
    Closing,
    /// Transport reported closed; user callback not yet delivered
    Closed,
    /// Failed; the kind is delivered on the next process step
    Error(Error),
}

struct RequestData {
    method: Method,
    path: String,
    /// Frozen at submission: caller headers + Host + Content-Length
    header_block: Vec<u8>,
    body: Vec<u8>,
}

/// One queue entry pairing a request with its response handler.
///
/// The two halves are consumed independently (`request` when the bytes
/// go out, `on_response` when the matching response completes), but the
/// entry is created atomically, which is what keeps send order and
/// response order in lockstep.
struct Pending {
    request: Option<RequestData>,
    on_response: Option<ResponseHandler>,
}

struct Inner {
    state: State,
    codec: ResponseCodec,
    queue: VecDeque<Pending>,
    on_open: Option<Box<dyn FnOnce(Result<(), Error>) + 'static>>,
    on_error: Option<Box<dyn FnMut(Error) + 'static>>,
    on_close: Option<Box<dyn FnOnce() + 'static>>,
    trace: bool,
}

/// A non-blocking HTTP/1.1 client over a [`Transport`].
///
/// ```no_run
/// # use nb_http::{HttpClient, Method, Transport};
/// # fn run<T: Transport>(transport: T) {
/// let mut client = HttpClient::new(transport);
/// client.open(
///     |result| println!("connected: {:?}", result),
///     |err| println!("connection failed: {}", err),
/// ).unwrap();
/// client.execute_request(Method::Get, "/status", None, b"", |result| {
///     let response = result.unwrap();
///     println!("{}", response.status);
/// }).unwrap();
/// loop {
///     client.process_item();
///     // ... until the response callback fired
/// }
/// # }
/// ```
pub struct HttpClient<T: Transport> {
    transport: T,
    inner: Inner,
}

impl<T: Transport> HttpClient<T> {
    pub fn new(transport: T) -> HttpClient<T> {
        HttpClient {
            transport: transport,
            inner: Inner {
                state: State::NotConnected,
                codec: ResponseCodec::new(),
                queue: VecDeque::new(),
                on_open: None,
                on_error: None,
                on_close: None,
                trace: false,
            },
        }
    }

    /// Starts opening the connection. Rejected unless the client is
    /// not connected. `on_open_complete` fires from a later process step
    /// once the transport is up; `on_error` fires for every asynchronous
    /// failure until the client is re-opened.
    pub fn open<F, E>(&mut self, on_open_complete: F, on_error: E)
        -> Result<(), Error>
        where F: FnOnce(Result<(), Error>) + 'static,
              E: FnMut(Error) + 'static,
    {
        if !matches!(self.inner.state, State::NotConnected) {
            error!("open attempt on a client that is not closed");
            return Err(Error::InvalidState);
        }
        if let Err(err) = self.transport.open() {
            error!("failure opening http connection: {}", err);
            return Err(Error::OpenFailed);
        }
        self.inner.on_open = Some(Box::new(on_open_complete));
        self.inner.on_error = Some(Box::new(on_error));
        self.inner.state = State::Opening;
        Ok(())
    }

    /// Starts closing the connection; `on_close` fires once the transport
    /// confirms. Rejected when not connected. When there is no live
    /// connection left to tear down (the client already failed or
    /// finished closing) the state collapses to not-connected right away
    /// and `on_close` is never invoked.
    pub fn close<F>(&mut self, on_close: F) -> Result<(), Error>
        where F: FnOnce() + 'static
    {
        match self.inner.state {
            State::NotConnected => {
                error!("close attempt on a client that is not open");
                Err(Error::InvalidState)
            }
            State::Opening | State::Opened | State::Open => {
                match self.transport.close() {
                    Ok(()) => {
                        self.inner.on_close = Some(Box::new(on_close));
                        self.inner.state = State::Closing;
                        Ok(())
                    }
                    Err(err) => {
                        error!("failure on close attempt: {}", err);
                        self.inner.state = State::Error(Error::Other);
                        Err(Error::Other)
                    }
                }
            }
            State::Closing | State::Closed | State::Error(_) => {
                self.inner.state = State::NotConnected;
                Ok(())
            }
        }
    }

    /// Queues a request. The header block (including the synthesized
    /// `Host` and the `Content-Length`) is frozen now; the bytes go out
    /// on a process step once the connection reaches the open state.
    /// `on_response` fires exactly once, in submission order relative to
    /// the client's other requests.
    pub fn execute_request<F>(&mut self, method: Method, path: &str,
        headers: Option<&Headers>, body: &[u8], on_response: F)
        -> Result<(), Error>
        where F: FnOnce(Result<Response, Error>) + 'static
    {
        if path.is_empty() {
            return Err(Error::InvalidArg);
        }
        if matches!(self.inner.state, State::NotConnected) {
            return Err(Error::InvalidState);
        }
        let header_block = {
            // A request without caller headers still gets Host and
            // Content-Length from a transient empty store
            let transient;
            let headers = match headers {
                Some(headers) => headers,
                None => {
                    transient = Headers::new();
                    &transient
                }
            };
            let (host, port) = self.transport.endpoint();
            encoder::serialize_headers(headers, host, port, body.len())
        };
        self.inner.queue.push_back(Pending {
            request: Some(RequestData {
                method: method,
                path: path.to_string(),
                header_block: header_block,
                body: body.to_vec(),
            }),
            on_response: Some(Box::new(on_response)),
        });
        Ok(())
    }

    /// The process step. Drives the transport one tick (delivering any
    /// received bytes to the parser and completions to the state
    /// machine), then advances the client: pending user callbacks are
    /// delivered and, while open, queued requests are written out in
    /// submission order.
    pub fn process_item(&mut self) {
        self.transport.process(&mut self.inner);
        match self.inner.state {
            State::NotConnected | State::Opening | State::Closing => {}
            State::Opened => {
                if let Some(on_open) = self.inner.on_open.take() {
                    on_open(Ok(()));
                }
                self.inner.state = State::Open;
            }
            State::Open => self.drain_requests(),
            State::Closed => {
                if let Some(on_close) = self.inner.on_close.take() {
                    on_close();
                }
                self.inner.state = State::NotConnected;
            }
            State::Error(kind) => {
                if let Some(ref mut on_error) = self.inner.on_error {
                    on_error(kind);
                }
                self.inner.state = State::NotConnected;
            }
        }
    }

    /// Enables wire tracing on both the client and its parser.
    pub fn set_trace(&mut self, enable: bool) {
        self.inner.trace = enable;
        self.inner.codec.set_trace(enable);
    }

    fn drain_requests(&mut self) {
        while let Some(pending) = self.inner.queue.iter_mut()
            .find(|pending| pending.request.is_some())
        {
            {
                let request = pending.request.as_ref().unwrap();
                let message = encoder::build_message(
                    request.method, &request.path, &request.header_block);
                if let Err(err) = self.transport.send(&message) {
                    error!("failure sending http request: {}", err);
                    self.inner.state = State::Error(Error::SendFailed);
                    return;
                }
                if self.inner.trace {
                    trace!("==> {}", String::from_utf8_lossy(&message));
                }
                if !request.body.is_empty() {
                    if let Err(err) = self.transport.send(&request.body) {
                        error!("failure sending request body: {}", err);
                        self.inner.state =
                            State::Error(Error::SendFailed);
                        return;
                    }
                    if self.inner.trace {
                        trace!("==> {}",
                               String::from_utf8_lossy(&request.body));
                    }
                }
            }
            pending.request = None;
        }
    }
}

fn dispatch_response(queue: &mut VecDeque<Pending>,
    result: Result<Response, ParseError>)
{
    let handler = queue.iter_mut()
        .find(|pending| pending.on_response.is_some())
        .and_then(|pending| pending.on_response.take());
    match handler {
        Some(on_response) => {
            on_response(result.map_err(|_| Error::Other));
        }
        None => {
            warn!("response received with no request waiting; dropped");
        }
    }
    // Entries whose request went out and whose response arrived are spent
    while queue.front().map_or(false, |pending| {
        pending.request.is_none() && pending.on_response.is_none()
    }) {
        queue.pop_front();
    }
}

impl TransportEvents for Inner {
    fn on_open_complete(&mut self, result: OpenResult) {
        if !matches!(self.state, State::Opening) {
            warn!("spurious open completion in state {:?}", self.state);
            return;
        }
        match result {
            OpenResult::Ok => {
                self.state = State::Opened;
            }
            OpenResult::Failed => {
                error!("failure opening http connection");
                self.state = State::Error(Error::OpenFailed);
            }
        }
    }

    fn on_bytes_received(&mut self, data: &[u8]) {
        let Inner {
            ref mut codec,
            ref mut queue,
            ref mut state,
            ..
        } = *self;
        codec.feed(data, |result| {
            if result.is_err() {
                // The stream is beyond recovery; the requester has been
                // told, the connection gets torn down on the next tick
                *state = State::Error(Error::Other);
            }
            dispatch_response(queue, result);
        });
    }

    fn on_send_complete(&mut self, result: SendResult) {
        if let SendResult::Failed = result {
            error!("failure sending request");
            self.state = State::Error(Error::SendFailed);
        }
    }

    fn on_close_complete(&mut self) {
        self.state = State::Closed;
    }

    fn on_io_error(&mut self, error: IoErrorKind) {
        let kind = match error {
            IoErrorKind::Memory => Error::Memory,
            IoErrorKind::Disconnection => Error::Disconnection,
            IoErrorKind::Other => Error::Other,
        };
        error!("transport error: {:?}", kind);
        self.state = State::Error(kind);
    }
}
