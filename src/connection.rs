//! `ConnectionDriver`: per-connection state machine, bridging the wire
//! parser's events to a `WebApp` and back out through a `ResponseWriter`
//! (spec §4.3). No direct teacher analogue exists for this piece — the
//! teacher's own attempt at it, `server::proto::Proto`, is itself
//! unfinished (`unimplemented!()` in `do_reads`/`do_writes`) — so this is
//! new code written in the teacher's idiom: a `quick_error`-style `Error`
//! propagated with `?`, state held in a plain struct rather than a future,
//! and the same "one type per wire role" split the teacher uses across
//! `headers`/`serializer`/`response`.
//!
//! The driver is split into the outer [`ConnectionDriver`] (which owns the
//! [`WireParser`]) and an inner [`DriverState`] (which implements
//! [`Handler`]) purely so `feed` can hand the parser a mutable borrow of
//! `DriverState` while still holding its own mutable borrow of the parser —
//! the two are disjoint fields, so the borrow checker is happy without any
//! interior mutability.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::body::{BodyEvent, BodyProcessing};
use crate::config::Config;
use crate::error::Error;
use crate::headers::HeaderMap;
use crate::keepalive::KeepAliveCounter;
use crate::parser::{Handler, HeadersInfo, WireParser};
use crate::request::Request;
use crate::response::{KeepAliveAdvert, ResponseWriter};

/// A streaming request handler: given a parsed [`Request`] and the
/// [`ResponseWriter`] it may start writing to immediately, returns what to
/// do with the request body as it arrives (spec §6 "WebApp contract").
/// Implemented by any `FnMut` of the right shape, mirroring the teacher's
/// blanket `impl<T, F> Service<S> for T where T: Fn(...) -> F` ergonomic —
/// callers never need to name the trait.
pub trait WebApp: Send {
    fn call(&mut self, req: Request, resp: &mut ResponseWriter) -> BodyProcessing;
}

impl<F> WebApp for F
    where F: FnMut(Request, &mut ResponseWriter) -> BodyProcessing + Send
{
    fn call(&mut self, req: Request, resp: &mut ResponseWriter) -> BodyProcessing {
        self(req, resp)
    }
}

/// One connection's lifecycle (spec §3 "ConnectionState", §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    ReadingHeaders,
    HeadersComplete,
    ReadingBody,
    AwaitingResponse,
    WritingResponse,
    KeepAliveWait,
    Upgraded,
    Closing,
    Closed,
    Errored,
}

/// Cross-thread flags the reader (state machine), writer, and idle pruner
/// all need a view of (spec §5 "Shared state & locks"). `HeaderMap`, the
/// parser's internal buffer, and `lastEvent` are deliberately *not* here:
/// per spec they live only on the reader thread and never cross a thread
/// boundary.
#[derive(Debug)]
pub struct Shared {
    response_completed: AtomicBool,
    error_occurred: AtomicBool,
    keep_alive_until: Mutex<Option<Instant>>,
}

impl Shared {
    pub fn new() -> Arc<Shared> {
        Arc::new(Shared {
            response_completed: AtomicBool::new(false),
            error_occurred: AtomicBool::new(false),
            keep_alive_until: Mutex::new(None),
        })
    }

    pub fn response_completed(&self) -> bool {
        self.response_completed.load(Ordering::Acquire)
    }

    pub fn error_occurred(&self) -> bool {
        self.error_occurred.load(Ordering::Acquire)
    }

    pub fn mark_error(&self) {
        self.error_occurred.store(true, Ordering::Release);
    }

    /// `None` means no keep-alive window is open: either no response has
    /// completed yet, or the connection is closing outright.
    pub fn keep_alive_until(&self) -> Option<Instant> {
        *self.keep_alive_until.lock().unwrap()
    }

    pub(crate) fn set_keep_alive_until(&self, at: Option<Instant>) {
        *self.keep_alive_until.lock().unwrap() = at;
    }

    pub(crate) fn mark_response_complete(&self) {
        self.response_completed.store(true, Ordering::Release);
    }

    pub(crate) fn clear_response_complete(&self) {
        self.response_completed.store(false, Ordering::Release);
    }
}

/// Which field the accumulator currently holds, driving the "last-event
/// closure" rule (spec §4.3): a parser event's accumulated bytes are only
/// materialized once a *different* event type arrives, since a field may be
/// split across many `feed()` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LastEvent {
    Idle,
    Url,
    HeaderField,
    HeaderValue,
    HeadersComplete,
    Body,
    MessageComplete,
}

/// Owns one connection's end-to-end lifecycle: the wire parser plus the
/// in-flight request/response state. Exclusively driven from the reader
/// thread.
pub struct ConnectionDriver<A: WebApp> {
    parser: WireParser,
    inner: DriverState<A>,
}

/// Everything [`ConnectionDriver`] owns except the parser itself; split out
/// so it can implement [`Handler`] and be borrowed independently of
/// `parser` inside [`ConnectionDriver::feed`].
struct DriverState<A: WebApp> {
    app: A,
    config: Arc<Config>,
    keep_alive: KeepAliveCounter,
    shared: Arc<Shared>,

    state: ConnectionState,
    last_event: LastEvent,
    accum: Vec<u8>,
    pending_header_name: String,
    target: String,
    headers: HeaderMap,

    /// Cloned into every per-request [`ResponseWriter`]. Set to `None` once
    /// the connection has decided to close for good: dropping every clone
    /// is what lets the writer thread's `recv()` loop observe disconnection
    /// and exit (spec §9 "Driver <-> Transport cycle").
    sender: Option<Sender<Vec<u8>>>,
    response: Option<ResponseWriter>,
    body_processing: Option<BodyProcessing>,
    upgrade_requested: bool,
}

impl<A: WebApp> ConnectionDriver<A> {
    pub fn new(
        app: A, config: Arc<Config>, keep_alive: KeepAliveCounter,
        shared: Arc<Shared>, sender: Sender<Vec<u8>>,
    ) -> ConnectionDriver<A> {
        ConnectionDriver {
            parser: WireParser::new(config.get_max_header_bytes()),
            inner: DriverState {
                app,
                config,
                keep_alive,
                shared,
                state: ConnectionState::Idle,
                last_event: LastEvent::Idle,
                accum: Vec::new(),
                pending_header_name: String::new(),
                target: String::new(),
                headers: HeaderMap::new(),
                sender: Some(sender),
                response: None,
                body_processing: None,
                upgrade_requested: false,
            },
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state
    }

    pub fn shared(&self) -> &Arc<Shared> {
        &self.inner.shared
    }

    pub fn upgrade_requested(&self) -> bool {
        self.inner.upgrade_requested
    }

    /// True once the connection will never read or write again; the reader
    /// loop should stop calling `feed`.
    pub fn is_finished(&self) -> bool {
        matches!(self.inner.state,
            ConnectionState::Closing | ConnectionState::Closed |
            ConnectionState::Errored | ConnectionState::Upgraded)
    }

    /// Marks the connection as about to start a fresh request once a byte
    /// arrives on a connection that was sitting in `KeepAliveWait`.
    ///
    /// Also clears the shared `keepAliveUntil`/`responseCompleted` flags the
    /// idle pruner reads: both were left behind by the *previous* response's
    /// `done()` and must not cause the pruner to treat the upcoming
    /// response as already finished and past its deadline while it's still
    /// being written (spec P6 "one with activity is not [pruned]").
    pub fn note_activity(&mut self) {
        if self.inner.state == ConnectionState::KeepAliveWait {
            self.inner.state = ConnectionState::Idle;
            self.inner.shared.set_keep_alive_until(None);
            self.inner.shared.clear_response_complete();
        }
    }

    /// Feed a chunk of freshly-read bytes to the parser (spec §4.2
    /// `feed`). Returns the number of bytes consumed; fewer than
    /// `data.len()` means an upgrade handoff or a protocol error — check
    /// `state()` to tell which.
    pub fn feed(&mut self, data: &[u8]) -> Result<usize, Error> {
        if self.inner.state == ConnectionState::Idle {
            self.inner.state = ConnectionState::ReadingHeaders;
        }
        let result = self.parser.feed(data, &mut self.inner);
        if result.is_err() {
            self.inner.state = ConnectionState::Errored;
            self.inner.shared.mark_error();
        }
        result
    }
}

impl<A: WebApp> DriverState<A> {
    fn close_last_event(&mut self) {
        match self.last_event {
            LastEvent::HeaderField => {
                self.pending_header_name =
                    String::from_utf8_lossy(&self.accum).into_owned();
            }
            LastEvent::HeaderValue => {
                let value = String::from_utf8_lossy(&self.accum).into_owned();
                let name = std::mem::take(&mut self.pending_header_name);
                self.headers.append(name, value);
            }
            LastEvent::Url => {
                self.target = String::from_utf8_lossy(&self.accum).into_owned();
            }
            LastEvent::HeadersComplete
            | LastEvent::Idle
            | LastEvent::Body
            | LastEvent::MessageComplete => {}
        }
    }

    /// Computes the `Keep-Alive` advertisement and whether this response
    /// gets to keep the connection alive, from what the client asked for
    /// and the process-wide live-connection snapshot (spec §4.3
    /// "Keep-alive").
    fn keep_alive_decision(&self, client_wants_it: bool) -> (bool, Option<KeepAliveAdvert>) {
        let available = self.config.get_max_requests_per_connection()
            .saturating_sub(self.keep_alive.current_connections());
        if client_wants_it && available > 0 {
            (true, Some(KeepAliveAdvert {
                timeout: self.config.get_keep_alive_timeout(),
                max: available,
            }))
        } else {
            (false, None)
        }
    }

    /// Best-effort refresh of the externally-visible phase. The formal
    /// state machine names one state at a time, but this driver's whole
    /// point is overlapping request-read and response-write; `WritingResponse`
    /// takes priority over `ReadingBody`/`AwaitingResponse` once a response
    /// has actually started.
    fn update_phase(&mut self) {
        if matches!(self.state, ConnectionState::Upgraded | ConnectionState::Errored) {
            return;
        }
        self.state = match self.response {
            Some(ref w) if w.is_started() => ConnectionState::WritingResponse,
            _ if self.last_event == LastEvent::MessageComplete =>
                ConnectionState::AwaitingResponse,
            _ => ConnectionState::ReadingBody,
        };
    }

    /// Runs after anything that might have finished the in-flight response
    /// (the initial `WebApp::call`, or any body-handler invocation):
    /// transitions state, resets per-request fields, and opens the
    /// keep-alive window, per spec §4.3 "Reset on done()".
    ///
    /// Once `message-complete` has fired and no `BodyProcessing` handler is
    /// left pending, nothing else will ever touch this `ResponseWriter`
    /// again: the handler only ever sees it synchronously, inside
    /// `WebApp::call` or a body callback, never after either returns. If the
    /// handler forgot to call `done()` this is the one point where that's
    /// knowable, so the stalled response is forced through
    /// `ResponseWriter::finish` (spec §9 "Result<...> never reports
    /// failure" / HandlerMisuse) instead of hanging the connection forever.
    fn check_response_complete(&mut self) {
        let stuck = self.last_event == LastEvent::MessageComplete
            && self.body_processing.is_none();
        let (complete, aborted, keeps_alive) = match self.response {
            Some(ref w) if w.is_complete() || w.is_aborted() || stuck =>
                (w.is_complete(), w.is_aborted(), w.keeps_alive()),
            Some(_) => return,
            None => return,
        };
        let forced_keep_alive = if !complete && !aborted && stuck {
            warn!("WebApp finished a request without completing its \
                response; forcing a fallback response");
            Some(self.response.take().unwrap().finish())
        } else {
            None
        };
        self.response = None;
        self.shared.mark_response_complete();

        if let Some(keeps_alive) = forced_keep_alive {
            if keeps_alive {
                self.shared.set_keep_alive_until(
                    Some(Instant::now() + self.config.get_keep_alive_timeout()));
                self.state = ConnectionState::KeepAliveWait;
            } else {
                self.state = ConnectionState::Closing;
                self.sender = None;
            }
            self.reset_per_request();
            return;
        }

        if aborted {
            self.state = ConnectionState::Errored;
            self.shared.mark_error();
            self.sender = None;
            self.reset_per_request();
            return;
        }

        if keeps_alive {
            self.shared.set_keep_alive_until(
                Some(Instant::now() + self.config.get_keep_alive_timeout()));
            self.state = ConnectionState::KeepAliveWait;
        } else {
            self.state = ConnectionState::Closing;
            self.sender = None;
        }
        self.reset_per_request();
    }

    fn reset_per_request(&mut self) {
        self.last_event = LastEvent::Idle;
        self.accum.clear();
        self.pending_header_name.clear();
        self.target.clear();
        self.headers.clear();
        self.body_processing = None;
        self.upgrade_requested = false;
    }
}

impl<A: WebApp> Handler for DriverState<A> {
    fn on_message_begin(&mut self) {
        self.state = ConnectionState::ReadingHeaders;
    }

    fn on_url(&mut self, bytes: &[u8]) {
        if self.last_event != LastEvent::Url {
            self.close_last_event();
            self.accum.clear();
        }
        self.accum.extend_from_slice(bytes);
        self.last_event = LastEvent::Url;
    }

    fn on_header_field(&mut self, bytes: &[u8]) {
        if self.last_event != LastEvent::HeaderField {
            self.close_last_event();
            self.accum.clear();
        }
        self.accum.extend_from_slice(bytes);
        self.last_event = LastEvent::HeaderField;
    }

    fn on_header_value(&mut self, bytes: &[u8]) {
        if self.last_event != LastEvent::HeaderValue {
            self.close_last_event();
            self.accum.clear();
        }
        self.accum.extend_from_slice(bytes);
        self.last_event = LastEvent::HeaderValue;
    }

    fn on_headers_complete(&mut self, info: &HeadersInfo) -> bool {
        self.close_last_event();
        self.last_event = LastEvent::HeadersComplete;
        self.state = ConnectionState::HeadersComplete;

        if info.upgrade {
            self.upgrade_requested = true;
            self.state = ConnectionState::Upgraded;
            // No upgrade collaborator exists at this layer (spec §4.2
            // "Forwarding ... to an upgrade handler is out of scope for the
            // core"), so every detected upgrade ends up here; the close
            // that follows once the reader loop sees `is_finished()` is
            // exactly the `UpgradeUnhandled` action from spec §7.
            warn!("{}", Error::UpgradeUnhandled);
            return false;
        }

        let headers = std::mem::replace(&mut self.headers, HeaderMap::new());
        let target = std::mem::take(&mut self.target);
        let req = Request::new(info.method.clone(), target, info.version, headers);

        let (keep_alive, advert) = self.keep_alive_decision(info.should_keep_alive);
        let sender = match self.sender {
            Some(ref s) => s.clone(),
            // Connection is already tearing down (e.g. a prior response
            // decided to close); there is nothing left to respond with.
            None => return false,
        };
        let mut writer = ResponseWriter::new(
            sender, info.version, info.method.is_head(), !keep_alive, advert);
        let processing = self.app.call(req, &mut writer);
        self.response = Some(writer);
        self.body_processing = Some(processing);
        self.update_phase();
        self.check_response_complete();
        false
    }

    fn on_body(&mut self, bytes: &[u8]) {
        if self.last_event != LastEvent::Body {
            self.close_last_event();
        }
        self.last_event = LastEvent::Body;

        let mut stop = false;
        if let (Some(BodyProcessing::Process(ref mut handler)), Some(ref mut writer)) =
            (self.body_processing.as_mut(), self.response.as_mut())
        {
            stop = handler(BodyEvent::Chunk(bytes), writer);
        }
        if stop {
            self.body_processing = Some(BodyProcessing::Discard);
        }
        self.update_phase();
        self.check_response_complete();
    }

    fn on_message_complete(&mut self) {
        self.close_last_event();
        self.last_event = LastEvent::MessageComplete;

        if let (Some(mut processing), Some(ref mut writer)) =
            (self.body_processing.take(), self.response.as_mut())
        {
            if let BodyProcessing::Process(ref mut handler) = processing {
                handler(BodyEvent::End, writer);
            }
        }
        self.update_phase();
        self.check_response_complete();
    }
}
