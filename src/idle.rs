//! `IdlePruner`: a single background thread, shared by every connection in
//! the process, that closes connections sitting past their keep-alive
//! deadline with nothing in flight (spec §5 "periodic sweep").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;
use std::time::{Duration, Instant};

use crate::connection::Shared;

struct Entry {
    shared: Weak<Shared>,
    shutdown: Box<dyn Fn() + Send>,
    pruned: AtomicBool,
}

/// Sweeps its registered connections at a fixed interval, closing any whose
/// `keepAliveUntil` has passed with no response in flight. Constructed once
/// by whatever embeds this crate and shared across every accepted
/// connection, mirroring the teacher's single long-lived background worker
/// shape (its `futures_cpupool` task pool plays the analogous "one
/// background facility, many connections register with it" role).
pub struct IdlePruner {
    entries: Arc<Mutex<Vec<Entry>>>,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl IdlePruner {
    pub fn new(sweep_interval: Duration) -> IdlePruner {
        let entries: Arc<Mutex<Vec<Entry>>> = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));
        let thread_entries = entries.clone();
        let thread_stop = stop.clone();
        let handle = thread::spawn(move || {
            while !thread_stop.load(Ordering::Acquire) {
                thread::sleep(sweep_interval);
                sweep(&thread_entries);
            }
        });
        IdlePruner { entries, stop, handle: Some(handle) }
    }

    /// Registers a connection to be closed once its keep-alive window
    /// passes with no response in flight. `shutdown` may be called more
    /// than once (it never is, in practice, but a `Transport::shutdown`
    /// tolerates it); it should close the transport and nothing more, so
    /// the reader thread's blocked `read()` unblocks and the connection
    /// winds down on its own.
    pub fn register<F>(&self, shared: &Arc<Shared>, shutdown: F)
        where F: Fn() + Send + 'static
    {
        self.entries.lock().unwrap().push(Entry {
            shared: Arc::downgrade(shared),
            shutdown: Box::new(shutdown),
            pruned: AtomicBool::new(false),
        });
    }

    /// Number of still-live registrations, for tests and diagnostics.
    fn live_count(&self) -> usize {
        self.entries.lock().unwrap().iter()
            .filter(|e| e.shared.upgrade().is_some())
            .count()
    }
}

fn sweep(entries: &Arc<Mutex<Vec<Entry>>>) {
    let mut guard = entries.lock().unwrap();
    let now = Instant::now();
    guard.retain(|entry| {
        let shared = match entry.shared.upgrade() {
            Some(s) => s,
            None => return false,
        };
        if !entry.pruned.load(Ordering::Relaxed) {
            if let Some(until) = shared.keep_alive_until() {
                if now >= until && shared.response_completed() {
                    debug!("idle pruner closing connection past its keep-alive deadline");
                    (entry.shutdown)();
                    entry.pruned.store(true, Ordering::Relaxed);
                }
            }
        }
        true
    });
}

impl Drop for IdlePruner {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread::sleep;

    #[test]
    fn prunes_connection_past_deadline_with_no_response_in_flight() {
        let pruner = IdlePruner::new(Duration::from_millis(5));
        let shared = Shared::new();
        shared.mark_response_complete();
        let closed = Arc::new(AtomicUsize::new(0));
        let closed2 = closed.clone();
        pruner.register(&shared, move || { closed2.fetch_add(1, Ordering::SeqCst); });

        // No keep-alive window set yet: must not be pruned.
        sleep(Duration::from_millis(30));
        assert_eq!(closed.load(Ordering::SeqCst), 0);

        shared.set_keep_alive_until(Some(Instant::now() - Duration::from_millis(1)));
        sleep(Duration::from_millis(30));
        assert!(closed.load(Ordering::SeqCst) >= 1);
    }

    #[test]
    fn forgets_connections_whose_shared_state_was_dropped() {
        let pruner = IdlePruner::new(Duration::from_millis(5));
        {
            let shared = Shared::new();
            pruner.register(&shared, || {});
            assert_eq!(pruner.live_count(), 1);
        }
        sleep(Duration::from_millis(30));
        assert_eq!(pruner.live_count(), 0);
    }
}
