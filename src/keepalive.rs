//! Process-wide live-connection snapshot (spec §4.6).

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A read-only snapshot of the number of currently-live connections,
/// consulted once per response to compute the advertised `max=` in the
/// `Keep-Alive` header. Backed by an atomic counter incremented on accept
/// and decremented on close, as spec §4.6 permits; accuracy is advisory —
/// the value only clamps the advertised maximum, it never gates behavior.
#[derive(Clone)]
pub struct KeepAliveCounter {
    count: Arc<AtomicUsize>,
}

impl KeepAliveCounter {
    pub fn new() -> KeepAliveCounter {
        KeepAliveCounter { count: Arc::new(AtomicUsize::new(0)) }
    }

    pub fn current_connections(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Returns an RAII guard that decrements the counter when dropped.
    pub fn track(&self) -> ConnectionGuard {
        self.count.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard { count: self.count.clone() }
    }
}

impl Default for KeepAliveCounter {
    fn default() -> KeepAliveCounter {
        KeepAliveCounter::new()
    }
}

/// Decrements the process-wide live count on drop, however the connection
/// ends (clean close, error, panic unwinding the reader/writer threads).
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod test {
    use super::KeepAliveCounter;

    #[test]
    fn tracks_live_connections() {
        let counter = KeepAliveCounter::new();
        assert_eq!(counter.current_connections(), 0);
        let g1 = counter.track();
        assert_eq!(counter.current_connections(), 1);
        let g2 = counter.track();
        assert_eq!(counter.current_connections(), 2);
        drop(g1);
        assert_eq!(counter.current_connections(), 1);
        drop(g2);
        assert_eq!(counter.current_connections(), 0);
    }
}
