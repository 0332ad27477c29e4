//! The crate's error type (spec §7).
//!
//! Every variant here terminates the connection it occurred on; errors on
//! one connection never affect others (§7 propagation policy), and none are
//! retried at this layer.

use std::io;

use httparse;

use crate::serializer::HeaderError;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        /// A transport read or write failed.
        Io(err: io::Error) {
            description("I/O error")
            display("I/O error: {}", err)
            from()
        }
        /// The wire parser rejected the request line, a header, or the
        /// chunk framing.
        Protocol(err: httparse::Error) {
            description("protocol error")
            display("protocol error: {}", err)
            from()
        }
        /// A chunked body's chunk-size line was malformed.
        ChunkSize(err: httparse::InvalidChunkSize) {
            description("invalid chunk size")
            display("invalid chunk size: {}", err)
            from()
        }
        /// The accumulated header section exceeded the configured limit
        /// before `headers-complete` was reached.
        HeadersTooLarge {
            description("request header section too large")
        }
        /// `Content-Length` appeared more than once.
        DuplicateContentLength {
            description("duplicate Content-Length header")
        }
        /// `Content-Length` did not parse as an unsigned integer.
        BadContentLength {
            description("invalid Content-Length header")
        }
        /// `Host` appeared more than once.
        DuplicateHost {
            description("duplicate Host header")
        }
        /// A response header name or value contained a bare CR or LF, or
        /// another header-serialization invariant was violated.
        HeaderValue(err: HeaderError) {
            description("invalid response header")
            display("invalid response header: {}", err)
            from()
        }
        /// The request requested a protocol upgrade but no upgrade
        /// collaborator was registered with the connection.
        UpgradeUnhandled {
            description("upgrade requested but not handled")
        }
        /// `write_trailer` was called. Trailers are declared on
        /// `ResponseWriter` but not implemented.
        TrailerUnsupported {
            description("trailers are not supported")
        }
    }
}

#[cfg(test)]
mod test {
    use super::Error;
    use httparse;

    #[test]
    fn protocol_error_display() {
        let e = Error::Protocol(httparse::Error::HeaderName);
        assert_eq!(format!("{}", e), "protocol error: invalid header name");
    }

    #[test]
    fn io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "x");
        let e: Error = io_err.into();
        assert!(matches!(e, Error::Io(_)));
    }
}
