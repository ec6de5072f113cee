//! Incremental HTTP/1.1 response parsing

use std::str;

use httparse::{self, InvalidChunkSize};
use netbuf::Buf;

use chunked;
use headers::{Headers, HeaderError, is_chunked};

/// Number of headers to allocate on a stack
const MIN_HEADERS: usize = 16;
/// A hard limit on the number of headers
const MAX_HEADERS: usize = 1024;

/// Trailing `\r\n\r\n` some peers append after a fixed-length body
const END_TOKEN_LEN: usize = 4;

quick_error! {
    #[derive(Debug)]
    /// Reason a response stream failed to parse
    pub enum ParseError {
        /// Bad status line or header block
        Head(err: httparse::Error) {
            description("bad response head")
            display("bad response head: {}", err)
            from()
        }
        /// A parsed header could not be stored
        HeaderStore(err: HeaderError) {
            description("bad header")
            display("bad header: {}", err)
            from()
        }
        /// Bad `Content-Length` header
        BadContentLength {
            description("bad content length")
        }
        /// Bad chunk size line
        ChunkSize(err: InvalidChunkSize) {
            description("invalid chunk size")
            display("invalid chunk size: {}", err)
            from()
        }
        /// More body bytes arrived than `Content-Length` declared
        BodyOverrun {
            description("body exceeds the declared content length")
        }
    }
}

/// A complete parsed response, lent to the completion callback.
///
/// Everything borrows the codec's internal storage and is reclaimed the
/// moment the callback returns.
#[derive(Debug, Clone, Copy)]
pub struct Response<'a> {
    pub status: u16,
    pub headers: &'a Headers,
    /// `None` both for bodyless responses and for an empty chunked body
    pub body: Option<&'a [u8]>,
}

#[derive(Debug)]
enum State {
    /// Accumulating the status line and header block
    Head,
    /// Accumulating a `Content-Length` body
    FixedBody { expected: usize },
    /// Accumulating a chunked body
    Chunked(chunked::State),
    /// Discarding trailer lines after the terminal chunk
    Trailers { body_len: usize },
}

enum Step {
    Again,
    Blocked,
    Done(Option<usize>),
    Failed(ParseError),
}

/// An incremental HTTP/1.1 response parser.
///
/// Feed it the bytes coming off a connection, in whatever fragments they
/// arrive; it invokes the completion callback exactly once per response
/// and then resets itself for the next one. Fragment boundaries may fall
/// anywhere, including inside the status line or a chunk-size line.
pub struct ResponseCodec {
    buf: Buf,
    state: State,
    status: u16,
    headers: Headers,
    trace: bool,
}

impl ResponseCodec {
    pub fn new() -> ResponseCodec {
        ResponseCodec {
            buf: Buf::new(),
            state: State::Head,
            status: 0,
            headers: Headers::new(),
            trace: false,
        }
    }

    /// Drops any partially parsed response and starts from a clean slate.
    pub fn reinitialize(&mut self) {
        self.reset();
    }

    /// When enabled, completed responses are dumped through `log::trace!`.
    pub fn set_trace(&mut self, enable: bool) {
        self.trace = enable;
    }

    /// Consumes one received fragment. `on_response` is invoked at most
    /// once: with `Ok` when this fragment completes a response, with `Err`
    /// when it makes the stream unparseable. Either way the codec has
    /// reset itself by the time `feed` returns. Empty fragments are
    /// ignored.
    pub fn feed<F>(&mut self, data: &[u8], on_response: F)
        where F: FnOnce(Result<Response, ParseError>)
    {
        if data.is_empty() {
            return;
        }
        self.buf.extend(data);
        let outcome = loop {
            match self.step() {
                Step::Again => continue,
                Step::Blocked => return,
                Step::Done(body_len) => break Ok(body_len),
                Step::Failed(err) => break Err(err),
            }
        };
        match outcome {
            Ok(body_len) => {
                {
                    let response = Response {
                        status: self.status,
                        headers: &self.headers,
                        body: body_len.map(|len| &self.buf[..len]),
                    };
                    if self.trace {
                        trace!("HTTP status: {}", response.status);
                        for (name, value) in response.headers.iter() {
                            trace!("{}: {}", name,
                                   String::from_utf8_lossy(value));
                        }
                    }
                    on_response(Ok(response));
                }
                self.reset();
            }
            Err(err) => {
                error!("failed to parse response: {}", err);
                on_response(Err(err));
                self.reset();
            }
        }
    }

    fn step(&mut self) -> Step {
        match self.state {
            State::Head => self.parse_head(),
            State::FixedBody { expected } => {
                let len = self.buf.len();
                if len == expected || len == expected + END_TOKEN_LEN {
                    Step::Done(Some(expected))
                } else if len > expected {
                    Step::Failed(ParseError::BodyOverrun)
                } else {
                    Step::Blocked
                }
            }
            State::Chunked(ref mut progress) => {
                if let Err(err) = progress.parse(&mut self.buf) {
                    return Step::Failed(err.into());
                }
                if !progress.is_done() {
                    return Step::Blocked;
                }
                let body_len = progress.buffered();
                if self.buf.len() - body_len <= END_TOKEN_LEN {
                    Step::Done(body(body_len))
                } else {
                    self.state = State::Trailers { body_len: body_len };
                    Step::Again
                }
            }
            State::Trailers { body_len } => {
                loop {
                    let (line_len, blank) = {
                        let tail = &self.buf[body_len..];
                        match tail.iter().position(|&b| b == b'\n') {
                            None => return Step::Blocked,
                            Some(lf) => {
                                let blank = lf == 0
                                    || (lf == 1 && tail[0] == b'\r');
                                (lf + 1, blank)
                            }
                        }
                    };
                    self.buf.remove_range(body_len..body_len + line_len);
                    if blank {
                        return Step::Done(body(body_len));
                    }
                }
            }
        }
    }

    fn parse_head(&mut self) -> Step {
        let (consumed, code, body_len, is_chunked_body) = {
            let buf = &self.buf[..];
            let mut vec;
            let mut stack = [httparse::EMPTY_HEADER; MIN_HEADERS];
            let mut raw = httparse::Response::new(&mut stack);
            let mut result = raw.parse(buf);
            if matches!(result, Err(httparse::Error::TooManyHeaders)) {
                vec = vec![httparse::EMPTY_HEADER; MAX_HEADERS];
                raw = httparse::Response::new(&mut vec);
                result = raw.parse(buf);
            }
            let bytes = match result {
                Ok(httparse::Status::Complete(bytes)) => bytes,
                Ok(httparse::Status::Partial) => return Step::Blocked,
                Err(err) => return Step::Failed(err.into()),
            };
            let code = raw.code.unwrap();
            let mut body_len = 0;
            let mut is_chunked_body = false;
            for header in raw.headers.iter() {
                if let Err(err) = self.headers.add_bytes(header.name,
                                                         header.value)
                {
                    return Step::Failed(err.into());
                }
                if header.name.eq_ignore_ascii_case("Content-Length") {
                    let value = str::from_utf8(header.value).ok()
                        .and_then(|v| v.trim().parse::<usize>().ok());
                    match value {
                        Some(len) => {
                            body_len = len;
                            is_chunked_body = false;
                        }
                        None => {
                            return Step::Failed(
                                ParseError::BadContentLength);
                        }
                    }
                } else if header.name
                    .eq_ignore_ascii_case("Transfer-Encoding")
                {
                    // Only a final "chunked" coding switches the framing
                    let last = header.value.split(|&b| b == b',').last();
                    if last.map_or(false, is_chunked) {
                        is_chunked_body = true;
                        body_len = 0;
                    }
                }
            }
            (bytes, code, body_len, is_chunked_body)
        };
        self.buf.consume(consumed);
        self.status = code;
        if is_chunked_body {
            self.state = State::Chunked(chunked::State::new());
            Step::Again
        } else if body_len > 0 {
            self.state = State::FixedBody { expected: body_len };
            Step::Again
        } else {
            Step::Done(None)
        }
    }

    fn reset(&mut self) {
        let len = self.buf.len();
        self.buf.consume(len);
        self.headers.clear();
        self.status = 0;
        self.state = State::Head;
    }
}

fn body(len: usize) -> Option<usize> {
    if len > 0 { Some(len) } else { None }
}
