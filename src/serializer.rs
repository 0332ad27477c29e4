//! Response-side message state machine.
//!
//! This enforces the order in which a response may be built: status line,
//! then headers, then exactly one body-framing declaration
//! (`add_length`/`add_chunked`, unless the status forbids a body), then body
//! chunks, then `done()`. Calling a method out of turn is a programmer error
//! in the handler and panics, the same way misusing `io::Write` on a half
//! closed socket would.

use std::fmt::Display;
use std::io::Write;

use netbuf::Buf;

use crate::version::HttpVersion;

quick_error! {
    #[derive(Debug)]
    pub enum HeaderError {
        DuplicateContentLength {
            description("Content-Length is added twice")
        }
        DuplicateTransferEncoding {
            description("Transfer-Encoding is added twice")
        }
        InvalidHeaderName {
            description("header name contains invalid characters")
        }
        InvalidHeaderValue {
            description("header value contains invalid characters")
        }
        TransferEncodingAfterContentLength {
            description("Transfer-Encoding added when Content-Length is \
                already specified")
        }
        ContentLengthAfterTransferEncoding {
            description("Content-Length added after Transfer-Encoding")
        }
        CantDetermineBodySize {
            description("neither Content-Length nor Transfer-Encoding \
                is present in the headers")
        }
        BodyLengthHeader {
            description("Content-Length and Transfer-Encoding must be set \
                using the specialized methods")
        }
        RequireBodyless {
            description("this message must not contain body length fields")
        }
    }
}

/// Whether the response in progress may carry an entity body.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Body {
    /// Ordinary response, body length is to be declared.
    Normal,
    /// Response to a `HEAD` request: body is computed but never written.
    Head,
    /// Status forbids a body: 1xx, 204, 304.
    Denied,
}

/// State of a single response being serialized onto a connection's write
/// buffer. One instance is created per response and discarded once `done()`
/// has been called.
#[derive(Debug)]
pub enum MessageState {
    /// Nothing has been sent.
    ResponseStart { version: HttpVersion, body: Body, close: bool },
    /// A 100-continue line has been sent; the real status is still pending.
    FinalResponseStart { version: HttpVersion, body: Body, close: bool },
    /// Status line is already in the buffer.
    Headers { body: Body, close: bool },
    /// The message declared a fixed-size body.
    FixedHeaders { is_head: bool, close: bool, content_length: u64 },
    /// The message declared a chunked body.
    ChunkedHeaders { is_head: bool, close: bool },
    /// The message contains no body at all (1xx/204/304).
    Bodyless,
    /// Body bytes remain to be written, `content_length` tracks the budget.
    FixedBody { is_head: bool, content_length: u64 },
    /// Chunked body bytes may still be written.
    ChunkedBody { is_head: bool },
    /// Message complete; nothing further may be written.
    Done,
}

fn invalid_header(value: &[u8]) -> bool {
    value.iter().any(|&x| x == b'\r' || x == b'\n')
}

impl MessageState {
    pub fn new(version: HttpVersion, close: bool) -> MessageState {
        MessageState::ResponseStart { version, body: Body::Normal, close }
    }

    pub fn new_head(version: HttpVersion, close: bool) -> MessageState {
        MessageState::ResponseStart { version, body: Body::Head, close }
    }

    /// Write a 100 (Continue) interim response.
    ///
    /// # Panics
    /// When the response is already started.
    pub fn response_continue(&mut self, buf: &mut Buf) {
        use self::MessageState::*;
        match *self {
            ResponseStart { version, body, close } => {
                write!(buf, "{} 100 Continue\r\n\r\n", version).unwrap();
                *self = FinalResponseStart { version, body, close };
            }
            ref state => {
                panic!("called response_continue() on response in state {:?}",
                    state)
            }
        }
    }

    /// Write the status line.
    ///
    /// # Panics
    /// When the status line is already written, or `code == 100` (100 is
    /// not a valid final status).
    pub fn response_status(&mut self, buf: &mut Buf, code: u16, reason: &str) {
        use self::Body::*;
        use self::MessageState::*;
        match *self {
            ResponseStart { version, mut body, close } |
            FinalResponseStart { version, mut body, close } => {
                assert!(code != 100);
                write!(buf, "{} {} {}\r\n", version, code, reason).unwrap();
                // 1xx, 204, 304 never carry an entity body (RFC 7230 §3.3.2)
                if (code >= 100 && code < 200) || code == 204 || code == 304 {
                    body = Denied;
                }
                *self = Headers { body, close };
            }
            ref state => {
                panic!("called response_status() on response in state {:?}",
                    state)
            }
        }
    }

    fn write_header(&mut self, buf: &mut Buf, name: &str, value: &[u8])
        -> Result<(), HeaderError>
    {
        if invalid_header(name.as_bytes()) {
            return Err(HeaderError::InvalidHeaderName);
        }
        let start = buf.len();
        buf.write_all(name.as_bytes()).unwrap();
        buf.write_all(b": ").unwrap();

        let value_start = buf.len();
        buf.write_all(value).unwrap();
        if invalid_header(&buf[value_start..]) {
            buf.remove_range(start..);
            return Err(HeaderError::InvalidHeaderValue);
        }

        buf.write_all(b"\r\n").unwrap();
        Ok(())
    }

    fn write_formatted<D: Display>(&mut self, buf: &mut Buf,
        name: &str, value: D)
        -> Result<(), HeaderError>
    {
        if invalid_header(name.as_bytes()) {
            return Err(HeaderError::InvalidHeaderName);
        }
        let start = buf.len();
        buf.write_all(name.as_bytes()).unwrap();
        buf.write_all(b": ").unwrap();

        let value_start = buf.len();
        write!(buf, "{}", value).unwrap();
        if invalid_header(&buf[value_start..]) {
            buf.remove_range(start..);
            return Err(HeaderError::InvalidHeaderValue);
        }

        buf.write_all(b"\r\n").unwrap();
        Ok(())
    }

    /// Add an ordinary header. `Content-Length`/`Transfer-Encoding` must go
    /// through [`add_length`]/[`add_chunked`] instead.
    ///
    /// # Panics
    /// When called outside the header-writing states.
    pub fn add_header(&mut self, buf: &mut Buf, name: &str, value: &[u8])
        -> Result<(), HeaderError>
    {
        use self::MessageState::*;
        use self::HeaderError::*;
        if name.eq_ignore_ascii_case("Content-Length")
            || name.eq_ignore_ascii_case("Transfer-Encoding") {
            return Err(BodyLengthHeader);
        }
        match *self {
            Headers { .. } | FixedHeaders { .. } | ChunkedHeaders { .. } => {
                self.write_header(buf, name, value)
            }
            ref state => {
                panic!("called add_header() on message in state {:?}", state)
            }
        }
    }

    /// Same as [`add_header`] but formats the value directly into the
    /// buffer — useful for dates and numeric headers.
    pub fn format_header<D: Display>(&mut self, buf: &mut Buf,
        name: &str, value: D)
        -> Result<(), HeaderError>
    {
        use self::MessageState::*;
        use self::HeaderError::*;
        if name.eq_ignore_ascii_case("Content-Length")
            || name.eq_ignore_ascii_case("Transfer-Encoding") {
            return Err(BodyLengthHeader);
        }
        match *self {
            Headers { .. } | FixedHeaders { .. } | ChunkedHeaders { .. } => {
                self.write_formatted(buf, name, value)
            }
            ref state => {
                panic!("called format_header() on message in state {:?}", state)
            }
        }
    }

    /// Declare a fixed-size body and write `Content-Length`.
    ///
    /// # Panics
    /// When called outside the `Headers` state.
    pub fn add_length(&mut self, buf: &mut Buf, n: u64)
        -> Result<(), HeaderError>
    {
        use self::MessageState::*;
        use self::HeaderError::*;
        use self::Body::*;
        match *self {
            FixedHeaders { .. } => Err(DuplicateContentLength),
            ChunkedHeaders { .. } => Err(ContentLengthAfterTransferEncoding),
            Headers { body: Denied, .. } => Err(RequireBodyless),
            Headers { body, close } => {
                self.write_formatted(buf, "Content-Length", n)?;
                *self = FixedHeaders {
                    is_head: body == Head,
                    close,
                    content_length: n,
                };
                Ok(())
            }
            ref state => {
                panic!("called add_length() on message in state {:?}", state)
            }
        }
    }

    /// Declare `Transfer-Encoding: chunked`.
    ///
    /// # Panics
    /// When called outside the `Headers` state.
    pub fn add_chunked(&mut self, buf: &mut Buf) -> Result<(), HeaderError> {
        use self::MessageState::*;
        use self::HeaderError::*;
        use self::Body::*;
        match *self {
            FixedHeaders { .. } => Err(TransferEncodingAfterContentLength),
            ChunkedHeaders { .. } => Err(DuplicateTransferEncoding),
            Headers { body: Denied, .. } => Err(RequireBodyless),
            Headers { body, close } => {
                self.write_header(buf, "Transfer-Encoding", b"chunked")?;
                *self = ChunkedHeaders { is_head: body == Head, close };
                Ok(())
            }
            ref state => {
                panic!("called add_chunked() on message in state {:?}", state)
            }
        }
    }

    /// True once `response_status`/`response_continue` has been called.
    pub fn is_started(&self) -> bool {
        !matches!(*self,
            MessageState::ResponseStart { .. } |
            MessageState::FinalResponseStart { .. })
    }

    /// Close the header section. Returns whether an entity body is expected.
    ///
    /// Automatically adds `Connection: close` when the connection was
    /// already decided to close.
    ///
    /// # Panics
    /// When called outside a header-writing state.
    pub fn done_headers(&mut self, buf: &mut Buf) -> Result<bool, HeaderError> {
        use self::Body::*;
        use self::MessageState::*;
        if matches!(*self,
            Headers { close: true, .. } |
            FixedHeaders { close: true, .. } |
            ChunkedHeaders { close: true, .. })
        {
            self.add_header(buf, "Connection", b"close").unwrap();
        }
        let expect_body = match *self {
            Headers { body: Denied, .. } => {
                *self = Bodyless;
                false
            }
            Headers { body: Normal, .. } => {
                return Err(HeaderError::CantDetermineBodySize);
            }
            FixedHeaders { is_head, content_length, .. } => {
                *self = FixedBody { is_head, content_length };
                !is_head
            }
            ChunkedHeaders { is_head, .. } => {
                *self = ChunkedBody { is_head };
                !is_head
            }
            ref state => {
                panic!("called done_headers() on message in state {:?}", state)
            }
        };
        buf.write_all(b"\r\n").unwrap();
        Ok(expect_body)
    }

    /// Write a chunk of the response body, chunk-encoding it if required.
    /// Empty chunks are a no-op in chunked mode.
    ///
    /// # Panics
    /// Outside a body-writing state, or past the declared fixed length.
    pub fn write_body(&mut self, buf: &mut Buf, data: &[u8]) {
        use self::MessageState::*;
        match *self {
            Bodyless => panic!("message must not contain a body"),
            FixedBody { is_head, ref mut content_length } => {
                if data.len() as u64 > *content_length {
                    panic!("fixed size response overflow: {} bytes left, \
                        got additional {}", content_length, data.len());
                }
                if !is_head {
                    buf.write_all(data).unwrap();
                }
                *content_length -= data.len() as u64;
            }
            ChunkedBody { is_head } => if !is_head && !data.is_empty() {
                write!(buf, "{:x}\r\n", data.len()).unwrap();
                buf.write_all(data).unwrap();
                buf.write_all(b"\r\n").unwrap();
            },
            ref state => {
                panic!("called write_body() on message in state {:?}", state)
            }
        }
    }

    /// True once headers are fully written (body state or done).
    pub fn is_after_headers(&self) -> bool {
        use self::MessageState::*;
        matches!(*self, Bodyless | Done | FixedBody { .. } | ChunkedBody { .. })
    }

    /// True once `done()` has completed successfully.
    pub fn is_complete(&self) -> bool {
        matches!(*self, MessageState::Done)
    }

    /// Finalize the message, writing the terminating chunk if needed.
    /// Idempotent once `Done`.
    ///
    /// # Panics
    /// When the body is in progress and not yet fully written.
    pub fn done(&mut self, buf: &mut Buf) {
        use self::MessageState::*;
        match *self {
            Bodyless => *self = Done,
            FixedBody { is_head: true, .. } |
            ChunkedBody { is_head: true } => *self = Done,
            FixedBody { is_head: false, content_length: 0 } => *self = Done,
            FixedBody { is_head: false, content_length } => {
                panic!("tried to close message with {} bytes remaining",
                    content_length)
            }
            ChunkedBody { is_head: false } => {
                buf.write_all(b"0\r\n\r\n").unwrap();
                *self = Done;
            }
            Done => {}
            ref state => {
                panic!("called done() on message in state {:?}", state)
            }
        }
    }
}
