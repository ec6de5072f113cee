//! Incremental `Transfer-Encoding: chunked` framing
//!
//! Size lines are decoded with `httparse::parse_chunk_size`; the parser
//! removes the framing (size lines, chunk-terminating CRLFs) from the
//! receive buffer in place, so the buffer prefix accumulates the
//! concatenated chunk payloads and no second body buffer is needed.

use std::cmp::min;

use httparse::{InvalidChunkSize, parse_chunk_size};
use netbuf::Buf;

#[derive(Debug, Clone)]
pub struct State {
    /// Decoded payload bytes accumulated at the front of the buffer
    buffered: usize,
    /// Payload bytes still missing for the current chunk
    pending: u64,
    /// A chunk-data CRLF still has to be stripped before the next line
    crlf: bool,
    done: bool,
}

impl State {
    pub fn new() -> State {
        State {
            buffered: 0,
            pending: 0,
            crlf: false,
            done: false,
        }
    }

    /// Advances over whatever whole framing elements `buf` currently
    /// holds. Safe to call again as more bytes arrive; stops cleanly at
    /// any fragment boundary, including mid-size-line.
    pub fn parse(&mut self, buf: &mut Buf) -> Result<(), InvalidChunkSize> {
        use httparse::Status::*;
        while !self.done {
            if self.pending > 0 {
                let avail = (buf.len() - self.buffered) as u64;
                if avail == 0 {
                    return Ok(());
                }
                let take = min(self.pending, avail);
                self.buffered += take as usize;
                self.pending -= take;
                if self.pending > 0 {
                    return Ok(());
                }
            }
            // Every chunk's payload is terminated by a CRLF of its own.
            // It has to go before the size line is decoded: fed to
            // `parse_chunk_size` it would read as a zero-size line.
            if self.crlf {
                let tail = &buf[self.buffered..];
                if tail.len() < 2 {
                    return Ok(());
                }
                if &tail[..2] != b"\r\n" {
                    return Err(InvalidChunkSize);
                }
                buf.remove_range(self.buffered..self.buffered + 2);
                self.crlf = false;
            }
            match parse_chunk_size(&buf[self.buffered..])? {
                Complete((bytes, 0)) => {
                    buf.remove_range(self.buffered..self.buffered + bytes);
                    self.done = true;
                }
                Complete((bytes, chunk_size)) => {
                    buf.remove_range(self.buffered..self.buffered + bytes);
                    self.pending = chunk_size;
                    self.crlf = true;
                }
                Partial => return Ok(()),
            }
        }
        Ok(())
    }

    /// Number of decoded payload bytes sitting at the start of the buffer.
    pub fn buffered(&self) -> usize {
        self.buffered
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod test {
    use netbuf::Buf;
    use super::State;

    fn feed(state: &mut State, buf: &mut Buf, bytes: &[u8]) {
        buf.extend(bytes);
        state.parse(buf).unwrap();
    }

    #[test]
    fn size_line_values() {
        let lines: &[(&[u8], usize)] = &[
            (b"1A", 26),
            (b"100", 256),
            (b"a5", 165),
            (b"a5;ext", 165),
        ];
        for &(line, size) in lines {
            let mut buf = Buf::new();
            let mut state = State::new();
            buf.extend(line);
            buf.extend(b"\r\n");
            buf.extend(&vec![b'x'; size]);
            buf.extend(b"\r\n0\r\n");
            state.parse(&mut buf).unwrap();
            assert!(state.is_done(), "{:?}", line);
            assert_eq!(state.buffered(), size, "{:?}", line);
        }
    }

    #[test]
    fn zero_size_line_terminates_immediately() {
        let mut buf = Buf::new();
        let mut state = State::new();
        feed(&mut state, &mut buf, b"0\r\n");
        assert!(state.is_done());
        assert_eq!(state.buffered(), 0);
    }

    #[test]
    fn single_chunk() {
        let mut buf = Buf::new();
        let mut state = State::new();
        feed(&mut state, &mut buf, b"4\r\nRust\r\n0\r\n");
        assert!(state.is_done());
        assert_eq!(state.buffered(), 4);
        assert_eq!(&buf[..state.buffered()], b"Rust");
    }

    #[test]
    fn multiple_chunks_with_extension() {
        let mut buf = Buf::new();
        let mut state = State::new();
        feed(&mut state, &mut buf,
             b"12;this is junk\r\n1234567890ABCDEFGH\r\n9\r\nIJKLMNOPQ\r\n0\r\n");
        assert!(state.is_done());
        assert_eq!(&buf[..state.buffered()],
                   &b"1234567890ABCDEFGHIJKLMNOPQ"[..]);
    }

    #[test]
    fn fragmented_size_line() {
        let mut buf = Buf::new();
        let mut state = State::new();
        feed(&mut state, &mut buf, b"4\r\nRust\r\n1");
        assert!(!state.is_done());
        feed(&mut state, &mut buf, b"A\r");
        assert!(!state.is_done());
        feed(&mut state, &mut buf, b"\nabcdefghijklm");
        assert!(!state.is_done());
        assert_eq!(state.buffered(), 17);
        feed(&mut state, &mut buf, b"nopqrstuvwxyz\r\n0\r\n");
        assert!(state.is_done());
        assert_eq!(&buf[..state.buffered()],
                   &b"Rustabcdefghijklmnopqrstuvwxyz"[..]);
    }

    #[test]
    fn byte_at_a_time() {
        let stream = b"3\r\nfoo\r\n3;x=y\r\nbar\r\n0\r\n";
        let mut buf = Buf::new();
        let mut state = State::new();
        for &b in stream.iter() {
            feed(&mut state, &mut buf, &[b]);
        }
        assert!(state.is_done());
        assert_eq!(&buf[..state.buffered()], b"foobar");
    }

    #[test]
    fn garbage_size_is_an_error() {
        let mut buf = Buf::new();
        let mut state = State::new();
        buf.extend(b"zz\r\nRust\r\n");
        assert!(state.parse(&mut buf).is_err());
    }
}
