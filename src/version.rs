//! HTTP protocol version.

use std::fmt;

/// The HTTP version of a request or response.
///
/// Only the two versions a byte-stream HTTP/1.x server actually has to
/// speak are represented; anything else (HTTP/0.9, a garbled request line)
/// is rejected by the parser as a protocol error before a `HttpVersion` is
/// ever produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http10,
    Http11,
}

impl HttpVersion {
    /// The major version number, as it appears in the status/request line.
    pub fn major(&self) -> u16 {
        1
    }

    /// The minor version number: `0` for HTTP/1.0, `1` for HTTP/1.1.
    pub fn minor(&self) -> u16 {
        match *self {
            HttpVersion::Http10 => 0,
            HttpVersion::Http11 => 1,
        }
    }

    /// Whether a connection defaults to persistent for this version, absent
    /// an explicit `Connection` header (`true` for 1.1, `false` for 1.0).
    pub fn keep_alive_by_default(&self) -> bool {
        matches!(*self, HttpVersion::Http11)
    }

    pub(crate) fn from_minor(minor: u8) -> Option<HttpVersion> {
        match minor {
            0 => Some(HttpVersion::Http10),
            1 => Some(HttpVersion::Http11),
            _ => None,
        }
    }
}

impl fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            HttpVersion::Http10 => f.write_str("HTTP/1.0"),
            HttpVersion::Http11 => f.write_str("HTTP/1.1"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::HttpVersion;

    #[test]
    fn display() {
        assert_eq!(HttpVersion::Http10.to_string(), "HTTP/1.0");
        assert_eq!(HttpVersion::Http11.to_string(), "HTTP/1.1");
    }

    #[test]
    fn major_minor() {
        assert_eq!((HttpVersion::Http10.major(), HttpVersion::Http10.minor()), (1, 0));
        assert_eq!((HttpVersion::Http11.major(), HttpVersion::Http11.minor()), (1, 1));
    }

    #[test]
    fn from_minor() {
        assert_eq!(HttpVersion::from_minor(0), Some(HttpVersion::Http10));
        assert_eq!(HttpVersion::from_minor(1), Some(HttpVersion::Http11));
        assert_eq!(HttpVersion::from_minor(9), None);
    }
}
