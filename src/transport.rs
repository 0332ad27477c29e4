//! `TransportAdapter`: drives one connection's reader/writer threads over a
//! concrete byte stream (spec §4.5).
//!
//! The teacher splits an `Io` into a `ReadBuf` half and a `WriteBuf` half
//! (`tk_bufstream::IoBuf::split`) so the two progress independently under
//! `tokio-core`'s reactor. This port targets a plain blocking `Read + Write`
//! stream instead, so the same split is realized with two `std::thread`s: a
//! reader thread that owns the original transport handle and feeds bytes
//! into the [`ConnectionDriver`], and a writer thread that owns a cloned
//! handle and drains the response channel with blocking `write_all`. The
//! writer thread never holds a reference back into the driver; it only
//! holds the `Sender`'s matching `Receiver` and the cloned transport. Once
//! every `Sender` clone is dropped (the last one lives inside whatever
//! `ResponseWriter` is current, plus the driver's own retained clone) the
//! `Receiver::iter()` loop ends and the writer thread exits on its own.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::thread;

use crate::config::Config;
use crate::connection::{ConnectionDriver, Shared, WebApp};
use crate::error::Error;
use crate::idle::IdlePruner;
use crate::keepalive::KeepAliveCounter;

/// A connection's raw byte stream, plus what it takes to run two
/// independent halves of it on separate threads (spec §4.5 "reader/writer
/// workers").
pub trait Transport: Read + Write + Send + 'static {
    /// A second handle to the same underlying stream, for the writer
    /// thread.
    fn try_clone(&self) -> io::Result<Self> where Self: Sized;
    /// Shuts down both directions of the stream, unblocking a thread
    /// parked in `read()` or `write()`. Safe to call more than once and
    /// from a thread other than the one doing the I/O.
    fn shutdown(&self) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn try_clone(&self) -> io::Result<TcpStream> {
        TcpStream::try_clone(self)
    }

    fn shutdown(&self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

const READ_CHUNK: usize = 16 * 1024;

/// Feeds `data` to `driver` until it is exhausted or the connection
/// reaches a terminal state (an upgrade handoff stops consuming the
/// remainder of `data` deliberately; anything left over is the caller's
/// concern, not this crate's — spec §4.1 "CONNECT/upgrade" non-goal).
fn feed_all<A: WebApp>(driver: &mut ConnectionDriver<A>, mut data: &[u8]) -> Result<(), Error> {
    while !data.is_empty() && !driver.is_finished() {
        let consumed = driver.feed(data)?;
        if consumed == 0 {
            break;
        }
        data = &data[consumed..];
    }
    Ok(())
}

/// Runs one connection to completion: spawns the writer thread, then drives
/// the reader loop on the calling thread until EOF, a protocol error, or
/// the driver reaching a terminal state. Blocks until both halves are
/// done. Mirrors the teacher's one-task-per-accepted-connection shape.
pub fn run<A, T>(
    mut transport: T, app: A, config: Arc<Config>, keep_alive: KeepAliveCounter,
    pruner: Option<&IdlePruner>,
) -> io::Result<()>
where
    A: WebApp + 'static,
    T: Transport,
{
    let _guard = keep_alive.track();
    let shared = Shared::new();
    let (tx, rx) = channel::<Vec<u8>>();
    let writer_sock = transport.try_clone()?;

    let writer = thread::spawn(move || {
        let mut writer_sock = writer_sock;
        for chunk in rx.iter() {
            if writer_sock.write_all(&chunk).is_err() {
                break;
            }
        }
        let _ = writer_sock.shutdown();
    });

    if let Some(pruner) = pruner {
        let prune_sock = transport.try_clone()?;
        pruner.register(&shared, move || { let _ = prune_sock.shutdown(); });
    }

    let mut driver = ConnectionDriver::new(app, config, keep_alive, shared, tx);
    let mut buf = [0u8; READ_CHUNK];

    let result = loop {
        if driver.is_finished() {
            break Ok(());
        }
        match transport.read(&mut buf) {
            Ok(0) => break Ok(()),
            Ok(n) => {
                driver.note_activity();
                if let Err(e) = feed_all(&mut driver, &buf[..n]) {
                    warn!("closing connection after protocol error: {}", e);
                    break Err(io::Error::new(io::ErrorKind::InvalidData, e.to_string()));
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => break Err(e),
        }
    };

    if result.is_err() {
        // On a protocol or read error there is no well-formed response left
        // worth flushing: unblock the writer immediately rather than
        // waiting for it to drain whatever is still queued.
        let _ = transport.shutdown();
    }
    // Drop the driver's retained `Sender` (and the in-flight `ResponseWriter`'s,
    // if any) *before* joining: that is what lets the writer thread's
    // `rx.iter()` loop see the channel close, finish draining any response
    // bytes already queued, and shut the socket down on its own. Shutting
    // down from here first would race the writer thread's blocking
    // `write_all` on the same OS socket and could truncate a response that
    // was still in flight when the client closed its end (spec §5 "Read
    // EOF" must not override spec §5 ordering guarantee O1).
    drop(driver);
    let _ = writer.join();
    let _ = transport.shutdown();
    result
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Condvar, Mutex};

    use crate::body::BodyProcessing;
    use crate::request::Request;
    use crate::response::ResponseWriter;
    use crate::status::Status;

    /// An in-memory duplex pipe standing in for a socket: writes from one
    /// side become readable from the other. `shutdown` marks both
    /// directions closed so a blocked `read` returns `Ok(0)`.
    struct Pipe {
        inbox: Arc<(Mutex<VecDeque<u8>>, Condvar)>,
        outbox: Arc<(Mutex<VecDeque<u8>>, Condvar)>,
        closed: Arc<Mutex<bool>>,
    }

    impl Read for Pipe {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            let (lock, cvar) = &*self.inbox;
            let mut buf = lock.lock().unwrap();
            loop {
                if !buf.is_empty() {
                    let n = out.len().min(buf.len());
                    for slot in out.iter_mut().take(n) {
                        *slot = buf.pop_front().unwrap();
                    }
                    return Ok(n);
                }
                if *self.closed.lock().unwrap() {
                    return Ok(0);
                }
                buf = cvar.wait(buf).unwrap();
            }
        }
    }

    impl Write for Pipe {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            let (lock, cvar) = &*self.outbox;
            let mut buf = lock.lock().unwrap();
            buf.extend(data.iter().copied());
            cvar.notify_all();
            Ok(data.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for Pipe {
        fn try_clone(&self) -> io::Result<Pipe> {
            Ok(Pipe {
                inbox: self.inbox.clone(),
                outbox: self.outbox.clone(),
                closed: self.closed.clone(),
            })
        }

        fn shutdown(&self) -> io::Result<()> {
            *self.closed.lock().unwrap() = true;
            self.inbox.1.notify_all();
            self.outbox.1.notify_all();
            Ok(())
        }
    }

    fn pair() -> (Pipe, Pipe) {
        let a_to_b = Arc::new((Mutex::new(VecDeque::new()), Condvar::new()));
        let b_to_a = Arc::new((Mutex::new(VecDeque::new()), Condvar::new()));
        let closed = Arc::new(Mutex::new(false));
        let client = Pipe { inbox: b_to_a.clone(), outbox: a_to_b.clone(), closed: closed.clone() };
        let server = Pipe { inbox: a_to_b, outbox: b_to_a, closed };
        (client, server)
    }

    #[test]
    fn serves_one_request_then_closes_on_connection_close() {
        let (mut client, server) = pair();
        client.write_all(b"GET /hi HTTP/1.1\r\nConnection: close\r\n\r\n").unwrap();
        let _ = client.shutdown();

        let config = Config::new().done();
        let keep_alive = KeepAliveCounter::new();
        run(server, |_req: Request, resp: &mut ResponseWriter| {
            resp.status(Status::Ok);
            resp.add_length(2).unwrap();
            resp.done_headers().unwrap();
            resp.write_body(b"hi");
            resp.done();
            BodyProcessing::Discard
        }, config, keep_alive, None).unwrap();

        let mut out = Vec::new();
        client.read_to_end(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.ends_with("hi"));
    }
}
