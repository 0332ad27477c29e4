//! `WireParser`: an incremental, callback-driven HTTP/1.1 request parser
//! (spec §4.2).
//!
//! Grounded in the callback-driven `Handler` trait / per-byte state machine
//! shape of the joyent-http-parser-style Rust port in the retrieval pack
//! (`fa1d03f9_faultier-bee__src-parser.rs.rs`): a closed `ParserState` enum
//! drives transitions one input byte at a time, but — unlike that port,
//! which parses from a `Reader` one byte per loop iteration — this version
//! operates directly on the byte slice passed to [`WireParser::feed`],
//! batching each contiguous run of bytes belonging to the same logical
//! field into a single callback call instead of one call per byte. Chunk
//! size lines are decoded with `httparse::parse_chunk_size`, exactly as the
//! teacher's `chunked::State::parse` does. Body-length precedence
//! (chunked beats Content-Length; duplicate Content-Length is a protocol
//! error) mirrors the teacher's `server::headers::scan_headers`.

use httparse;

use crate::error::Error;
use crate::headers;
use crate::method::Method;
use crate::version::HttpVersion;

/// Event callbacks invoked synchronously during [`WireParser::feed`].
///
/// Each `on_*` callback for a multi-byte field (`on_url`, `on_header_field`,
/// `on_header_value`, `on_body`) may be invoked more than once for a single
/// logical field if that field's bytes are split across two `feed()` calls;
/// callers reassemble the full value themselves (see the connection
/// driver's "last-event closure" rule).
pub trait Handler {
    fn on_message_begin(&mut self) {}
    fn on_url(&mut self, _bytes: &[u8]) {}
    fn on_header_field(&mut self, _bytes: &[u8]) {}
    fn on_header_value(&mut self, _bytes: &[u8]) {}
    /// Fired once the header section is fully parsed, carrying everything
    /// spec §4.2 says becomes "readable from the parser" at this point
    /// (method, version, `should_keep_alive`, `upgrade`). Handed by value
    /// rather than read back off the `WireParser` so a `Handler` that
    /// doesn't itself own the parser (e.g. a connection driver split into a
    /// parser field and a handler field) can still act on it synchronously,
    /// before any `on_body` call for the same message.
    ///
    /// Return `true` to tell the parser not to expect a body for this
    /// message: the parser treats the message as complete at the end of the
    /// header section and leaves any further bytes in the fed slice
    /// unconsumed.
    fn on_headers_complete(&mut self, _info: &HeadersInfo) -> bool { false }
    fn on_body(&mut self, _bytes: &[u8]) {}
    fn on_message_complete(&mut self) {}
}

/// Snapshot of request-line/header-derived facts, valid only for the
/// duration of the [`Handler::on_headers_complete`] call it's passed to.
#[derive(Debug, Clone)]
pub struct HeadersInfo {
    pub method: Method,
    pub version: HttpVersion,
    pub should_keep_alive: bool,
    pub upgrade: bool,
    pub expect_continue: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    MessageBegin,
    Method,
    UrlStart,
    Url,
    VersionH,
    VersionT1,
    VersionT2,
    VersionP,
    VersionSlash,
    VersionMajor,
    VersionDot,
    VersionMinor,
    RequestLineCR,
    HeaderLineStart,
    HeaderName,
    HeaderValueOws,
    HeaderValue,
    HeaderValueCR,
    HeadersAlmostDone,
    BodyFixed,
    BodyChunkSize,
    BodyChunkData,
    BodyChunkDataCR,
    BodyChunkDataLF,
    BodyChunkTrailerStart,
    BodyChunkTrailerLine,
    BodyChunkTrailerCR,
    MessageComplete,
}

/// Which header the bytes currently being accumulated in `cur_name`/
/// `cur_value` correspond to, so the parser can resolve body framing and
/// connection semantics without exposing a second, parser-owned header map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderKind {
    Other,
    ContentLength,
    TransferEncoding,
    Connection,
    Expect,
    Host,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyLength {
    Fixed(u64),
    Chunked,
    None,
}

/// Incremental HTTP/1.1 request parser. Holds no reference to its caller;
/// all communication happens through the [`Handler`] passed to `feed`.
pub struct WireParser {
    state: State,
    max_header_bytes: usize,
    header_bytes_seen: usize,

    method: Vec<u8>,
    major: u16,
    minor: u16,

    cur_name: Vec<u8>,
    cur_value: Vec<u8>,
    cur_kind: HeaderKind,
    has_content_length: bool,
    has_host: bool,

    body_length: BodyLength,
    connection_close: bool,
    connection_keep_alive_seen: bool,
    upgrade: bool,
    expect_continue: bool,
    skip_body: bool,

    chunk_remaining: u64,

    http_version: Option<HttpVersion>,
}

impl WireParser {
    pub fn new(max_header_bytes: usize) -> WireParser {
        WireParser {
            state: State::MessageBegin,
            max_header_bytes,
            header_bytes_seen: 0,
            method: Vec::with_capacity(8),
            major: 0,
            minor: 0,
            cur_name: Vec::with_capacity(24),
            cur_value: Vec::with_capacity(32),
            cur_kind: HeaderKind::Other,
            has_content_length: false,
            has_host: false,
            body_length: BodyLength::None,
            connection_close: false,
            connection_keep_alive_seen: false,
            upgrade: false,
            expect_continue: false,
            skip_body: false,
            chunk_remaining: 0,
            http_version: None,
        }
    }

    /// Resets all per-request state so the same parser instance can parse
    /// the next request on a keep-alive connection.
    pub fn reset(&mut self) {
        self.state = State::MessageBegin;
        self.header_bytes_seen = 0;
        self.method.clear();
        self.major = 0;
        self.minor = 0;
        self.cur_name.clear();
        self.cur_value.clear();
        self.cur_kind = HeaderKind::Other;
        self.has_content_length = false;
        self.has_host = false;
        self.body_length = BodyLength::None;
        self.connection_close = false;
        self.connection_keep_alive_seen = false;
        self.upgrade = false;
        self.expect_continue = false;
        self.skip_body = false;
        self.chunk_remaining = 0;
        self.http_version = None;
    }

    /// Readable once `on_headers_complete` has fired.
    pub fn method(&self) -> Method {
        Method::parse(&String::from_utf8_lossy(&self.method))
    }

    pub fn version(&self) -> Option<HttpVersion> {
        self.http_version
    }

    pub fn should_keep_alive(&self) -> bool {
        if self.connection_close {
            return false;
        }
        match self.http_version {
            Some(v) => v.keep_alive_by_default() || self.connection_keep_alive_seen,
            None => false,
        }
    }

    pub fn upgrade(&self) -> bool {
        self.upgrade
    }

    pub fn expect_continue(&self) -> bool {
        self.expect_continue
    }

    fn is_connect(&self) -> bool {
        self.method.eq_ignore_ascii_case(b"CONNECT")
    }

    /// Feed a chunk of bytes to the parser, invoking `handler`'s callbacks
    /// synchronously. Returns the number of bytes of `data` consumed. When
    /// fewer bytes than `data.len()` are consumed, either an upgrade
    /// handoff occurred (see [`Handler::on_headers_complete`]) or parsing
    /// failed with the returned error — in the error case the caller must
    /// treat the connection as protocol-errored.
    pub fn feed<H: Handler>(&mut self, data: &[u8], handler: &mut H)
        -> Result<usize, Error>
    {
        if self.state == State::MessageBegin {
            handler.on_message_begin();
            self.state = State::Method;
        }

        let mut i = 0;
        let mut run_start = 0;

        macro_rules! count_header_byte {
            () => {
                self.header_bytes_seen += 1;
                if self.header_bytes_seen > self.max_header_bytes {
                    return Err(Error::HeadersTooLarge);
                }
            };
        }

        while i < data.len() {
            let b = data[i];
            match self.state {
                State::Method => {
                    if b == b' ' {
                        if self.method.is_empty() {
                            return Err(Error::Protocol(httparse::Error::Token));
                        }
                        self.state = State::UrlStart;
                    } else if is_token(b) {
                        count_header_byte!();
                        self.method.push(b);
                    } else {
                        return Err(Error::Protocol(httparse::Error::Token));
                    }
                    i += 1;
                }
                State::UrlStart => {
                    if b == b' ' {
                        return Err(Error::Protocol(httparse::Error::Token));
                    }
                    self.state = State::Url;
                    run_start = i;
                    // fall through without consuming i so Url state sees it
                }
                State::Url => {
                    if b == b' ' {
                        if i > run_start {
                            handler.on_url(&data[run_start..i]);
                        }
                        self.state = State::VersionH;
                        i += 1;
                    } else {
                        count_header_byte!();
                        i += 1;
                        if i == data.len() {
                            handler.on_url(&data[run_start..i]);
                        }
                    }
                }
                State::VersionH => {
                    expect_byte(b, b'H')?;
                    self.state = State::VersionT1;
                    i += 1;
                }
                State::VersionT1 => {
                    expect_byte(b, b'T')?;
                    self.state = State::VersionT2;
                    i += 1;
                }
                State::VersionT2 => {
                    expect_byte(b, b'T')?;
                    self.state = State::VersionP;
                    i += 1;
                }
                State::VersionP => {
                    expect_byte(b, b'P')?;
                    self.state = State::VersionSlash;
                    i += 1;
                }
                State::VersionSlash => {
                    expect_byte(b, b'/')?;
                    self.major = 0;
                    self.state = State::VersionMajor;
                    i += 1;
                }
                State::VersionMajor => {
                    if b.is_ascii_digit() {
                        self.major = self.major * 10 + (b - b'0') as u16;
                        i += 1;
                    } else if b == b'.' {
                        self.minor = 0;
                        self.state = State::VersionDot;
                        i += 1;
                    } else {
                        return Err(Error::Protocol(httparse::Error::Version));
                    }
                }
                State::VersionDot => {
                    // transient: re-enter as VersionMinor without consuming
                    self.state = State::VersionMinor;
                }
                State::VersionMinor => {
                    if b.is_ascii_digit() {
                        self.minor = self.minor * 10 + (b - b'0') as u16;
                        i += 1;
                    } else if b == b'\r' {
                        self.state = State::RequestLineCR;
                        i += 1;
                    } else if b == b'\n' {
                        self.finish_request_line()?;
                        self.state = State::HeaderLineStart;
                        i += 1;
                    } else {
                        return Err(Error::Protocol(httparse::Error::Version));
                    }
                }
                State::RequestLineCR => {
                    if b != b'\n' {
                        return Err(Error::Protocol(httparse::Error::NewLine));
                    }
                    self.finish_request_line()?;
                    self.state = State::HeaderLineStart;
                    i += 1;
                }
                State::HeaderLineStart => {
                    if b == b'\r' {
                        self.state = State::HeadersAlmostDone;
                        i += 1;
                    } else if b == b'\n' {
                        i += 1;
                        if self.enter_body_or_complete(handler)? {
                            return Ok(i);
                        }
                    } else if is_token(b) {
                        self.cur_name.clear();
                        self.cur_value.clear();
                        self.state = State::HeaderName;
                        run_start = i;
                    } else {
                        return Err(Error::Protocol(httparse::Error::HeaderName));
                    }
                }
                State::HeaderName => {
                    if b == b':' {
                        if i > run_start {
                            handler.on_header_field(&data[run_start..i]);
                        }
                        self.cur_kind = classify_header(&self.cur_name);
                        self.state = State::HeaderValueOws;
                        i += 1;
                    } else if is_token(b) {
                        count_header_byte!();
                        self.cur_name.push(b.to_ascii_lowercase());
                        i += 1;
                        if i == data.len() {
                            handler.on_header_field(&data[run_start..i]);
                        }
                    } else {
                        return Err(Error::Protocol(httparse::Error::HeaderName));
                    }
                }
                State::HeaderValueOws => {
                    if b == b' ' || b == b'\t' {
                        i += 1;
                    } else {
                        self.state = State::HeaderValue;
                        run_start = i;
                    }
                }
                State::HeaderValue => {
                    if b == b'\r' {
                        if i > run_start {
                            handler.on_header_value(&data[run_start..i]);
                        }
                        self.finish_header_value()?;
                        self.state = State::HeaderValueCR;
                        i += 1;
                    } else if b == b'\n' {
                        if i > run_start {
                            handler.on_header_value(&data[run_start..i]);
                        }
                        self.finish_header_value()?;
                        self.state = State::HeaderLineStart;
                        i += 1;
                    } else {
                        count_header_byte!();
                        self.cur_value.push(b);
                        i += 1;
                        if i == data.len() {
                            handler.on_header_value(&data[run_start..i]);
                        }
                    }
                }
                State::HeaderValueCR => {
                    if b != b'\n' {
                        return Err(Error::Protocol(httparse::Error::HeaderValue));
                    }
                    self.state = State::HeaderLineStart;
                    i += 1;
                }
                State::HeadersAlmostDone => {
                    if b != b'\n' {
                        return Err(Error::Protocol(httparse::Error::NewLine));
                    }
                    i += 1;
                    if self.enter_body_or_complete(handler)? {
                        return Ok(i);
                    }
                }
                State::BodyFixed => {
                    let remaining = match self.body_length {
                        BodyLength::Fixed(n) => n,
                        _ => unreachable!(),
                    };
                    let available = (data.len() - i) as u64;
                    let take = remaining.min(available) as usize;
                    if take > 0 {
                        handler.on_body(&data[i..i + take]);
                        i += take;
                    }
                    let left = remaining - take as u64;
                    self.body_length = BodyLength::Fixed(left);
                    if left == 0 {
                        self.state = State::MessageComplete;
                        handler.on_message_complete();
                        self.reset();
                        return Ok(i);
                    }
                }
                State::BodyChunkSize => {
                    match httparse::parse_chunk_size(&data[i..])
                        .map_err(Error::ChunkSize)?
                    {
                        httparse::Status::Complete((used, size)) => {
                            i += used;
                            self.chunk_remaining = size;
                            if size == 0 {
                                self.state = State::BodyChunkTrailerStart;
                            } else {
                                self.state = State::BodyChunkData;
                            }
                        }
                        httparse::Status::Partial => {
                            return Ok(i);
                        }
                    }
                }
                State::BodyChunkData => {
                    let available = (data.len() - i) as u64;
                    let take = self.chunk_remaining.min(available) as usize;
                    if take > 0 {
                        handler.on_body(&data[i..i + take]);
                        i += take;
                    }
                    self.chunk_remaining -= take as u64;
                    if self.chunk_remaining == 0 {
                        self.state = State::BodyChunkDataCR;
                    }
                }
                State::BodyChunkDataCR => {
                    if b != b'\r' && b != b'\n' {
                        return Err(Error::Protocol(httparse::Error::Status));
                    }
                    if b == b'\r' {
                        self.state = State::BodyChunkDataLF;
                        i += 1;
                    } else {
                        self.state = State::BodyChunkSize;
                        i += 1;
                    }
                }
                State::BodyChunkDataLF => {
                    if b != b'\n' {
                        return Err(Error::Protocol(httparse::Error::NewLine));
                    }
                    self.state = State::BodyChunkSize;
                    i += 1;
                }
                State::BodyChunkTrailerStart => {
                    if b == b'\r' {
                        self.state = State::BodyChunkTrailerCR;
                        i += 1;
                    } else if b == b'\n' {
                        self.state = State::MessageComplete;
                        handler.on_message_complete();
                        self.reset();
                        return Ok(i + 1);
                    } else {
                        self.state = State::BodyChunkTrailerLine;
                        i += 1;
                    }
                }
                State::BodyChunkTrailerLine => {
                    if b == b'\n' {
                        self.state = State::BodyChunkTrailerStart;
                    }
                    i += 1;
                }
                State::BodyChunkTrailerCR => {
                    if b != b'\n' {
                        return Err(Error::Protocol(httparse::Error::NewLine));
                    }
                    self.state = State::MessageComplete;
                    handler.on_message_complete();
                    self.reset();
                    return Ok(i + 1);
                }
                State::MessageComplete => {
                    return Ok(i);
                }
                State::MessageBegin => unreachable!(),
            }
        }
        Ok(i)
    }

    fn finish_request_line(&mut self) -> Result<(), Error> {
        let version = HttpVersion::from_minor(self.minor as u8)
            .filter(|_| self.major == 1)
            .ok_or(Error::Protocol(httparse::Error::Version))?;
        self.http_version = Some(version);
        Ok(())
    }

    fn finish_header_value(&mut self) -> Result<(), Error> {
        match self.cur_kind {
            HeaderKind::ContentLength => {
                if self.has_content_length {
                    return Err(Error::DuplicateContentLength);
                }
                self.has_content_length = true;
                let s = std::str::from_utf8(&self.cur_value)
                    .map_err(|_| Error::BadContentLength)?;
                let len: u64 = s.trim().parse()
                    .map_err(|_| Error::BadContentLength)?;
                if self.body_length == BodyLength::Chunked {
                    // Transfer-Encoding already seen: it takes precedence,
                    // but the ambiguity forbids keep-alive (RFC 7230 §3.3.3).
                    self.connection_close = true;
                } else {
                    self.body_length = BodyLength::Fixed(len);
                }
            }
            HeaderKind::TransferEncoding => {
                if headers::is_chunked(last_encoding(&self.cur_value)) {
                    if self.has_content_length {
                        self.connection_close = true;
                    }
                    self.body_length = BodyLength::Chunked;
                }
            }
            HeaderKind::Connection => {
                for tok in self.cur_value.split(|&b| b == b',') {
                    if headers::is_close(tok) {
                        self.connection_close = true;
                    } else if headers::is_keep_alive(tok) {
                        self.connection_keep_alive_seen = true;
                    } else if headers::is_upgrade(tok) {
                        self.upgrade = true;
                    }
                }
            }
            HeaderKind::Expect => {
                if headers::is_continue(&self.cur_value) {
                    self.expect_continue = true;
                }
            }
            HeaderKind::Host => {
                if self.has_host {
                    return Err(Error::DuplicateHost);
                }
                self.has_host = true;
            }
            HeaderKind::Other => {}
        }
        Ok(())
    }

    /// Returns `true` once the message is fully complete (no body, or a
    /// `skip_body`/upgrade handoff) and the parser has already been reset
    /// for the next message — callers must `return Ok(i)` immediately in
    /// that case rather than falling through to the next loop iteration,
    /// since `self.state` is back at `State::MessageBegin` and re-entering
    /// `match self.state` there is `unreachable!()`.
    fn enter_body_or_complete<H: Handler>(&mut self, handler: &mut H)
        -> Result<bool, Error>
    {
        if self.is_connect() {
            self.upgrade = true;
        }
        let info = HeadersInfo {
            method: self.method(),
            version: self.http_version
                .expect("http_version is set by finish_request_line before \
                    enter_body_or_complete runs"),
            should_keep_alive: self.should_keep_alive(),
            upgrade: self.upgrade,
            expect_continue: self.expect_continue,
        };
        self.skip_body = handler.on_headers_complete(&info);
        if self.skip_body || self.upgrade {
            self.state = State::MessageComplete;
            handler.on_message_complete();
            self.reset();
            return Ok(true);
        }
        self.state = match self.body_length {
            BodyLength::Chunked => State::BodyChunkSize,
            BodyLength::Fixed(0) | BodyLength::None => {
                self.state = State::MessageComplete;
                handler.on_message_complete();
                self.reset();
                return Ok(true);
            }
            BodyLength::Fixed(_) => State::BodyFixed,
        };
        Ok(false)
    }
}

fn expect_byte(got: u8, want: u8) -> Result<(), Error> {
    if got == want {
        Ok(())
    } else {
        Err(Error::Protocol(httparse::Error::Version))
    }
}

fn last_encoding(value: &[u8]) -> &[u8] {
    value.rsplit(|&b| b == b',').next().unwrap_or(value)
}

fn classify_header(lower_name: &[u8]) -> HeaderKind {
    match lower_name {
        b"content-length" => HeaderKind::ContentLength,
        b"transfer-encoding" => HeaderKind::TransferEncoding,
        b"connection" => HeaderKind::Connection,
        b"expect" => HeaderKind::Expect,
        b"host" => HeaderKind::Host,
        _ => HeaderKind::Other,
    }
}

fn is_token(b: u8) -> bool {
    match b {
        b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9'
        | b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-'
        | b'.' | b'^' | b'_' | b'`' | b'|' | b'~' => true,
        _ => false,
    }
}
