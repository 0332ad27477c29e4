//! Process-wide tunables (spec §6, SPEC_FULL §4.7).

use std::sync::Arc;
use std::time::Duration;

/// Constructed once with [`Config::new`], configured with chainable
/// setters, and finalized with [`Config::done`] into an `Arc` shared by
/// every connection — mirrors the teacher's `Config::new() -> ... ->
/// done()` builder shape.
#[derive(Debug, Clone)]
pub struct Config {
    keep_alive_timeout: Duration,
    max_requests_per_connection: usize,
    max_header_bytes: usize,
}

impl Config {
    /// Defaults: 5s keep-alive timeout, 100 requests/connection, 64 KiB of
    /// header bytes (spec §6 defaults; the header limit matches the
    /// teacher's `MAX_HEADERS`-style posture of bounding unbounded input).
    pub fn new() -> Config {
        Config {
            keep_alive_timeout: Duration::from_secs(5),
            max_requests_per_connection: 100,
            max_header_bytes: 64 * 1024,
        }
    }

    pub fn keep_alive_timeout(&mut self, value: Duration) -> &mut Self {
        self.keep_alive_timeout = value;
        self
    }

    pub fn max_requests_per_connection(&mut self, value: usize) -> &mut Self {
        self.max_requests_per_connection = value;
        self
    }

    pub fn max_header_bytes(&mut self, value: usize) -> &mut Self {
        self.max_header_bytes = value;
        self
    }

    /// Finalize into a shared, reference-counted config.
    pub fn done(&mut self) -> Arc<Config> {
        Arc::new(self.clone())
    }

    pub fn get_keep_alive_timeout(&self) -> Duration {
        self.keep_alive_timeout
    }

    pub fn get_max_requests_per_connection(&self) -> usize {
        self.max_requests_per_connection
    }

    pub fn get_max_header_bytes(&self) -> usize {
        self.max_header_bytes
    }
}

impl Default for Config {
    fn default() -> Config {
        Config::new()
    }
}

#[cfg(test)]
mod test {
    use super::Config;
    use std::time::Duration;

    #[test]
    fn defaults() {
        let cfg = Config::new();
        assert_eq!(cfg.get_keep_alive_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.get_max_requests_per_connection(), 100);
        assert_eq!(cfg.get_max_header_bytes(), 64 * 1024);
    }

    #[test]
    fn builder_chain() {
        let cfg = Config::new()
            .keep_alive_timeout(Duration::from_secs(1))
            .max_requests_per_connection(10)
            .done();
        assert_eq!(cfg.get_keep_alive_timeout(), Duration::from_secs(1));
        assert_eq!(cfg.get_max_requests_per_connection(), 10);
    }
}
