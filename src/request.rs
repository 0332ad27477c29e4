//! The immutable [`Request`] handed to a `WebApp` at headers-complete
//! (spec §3 "Request").

use crate::headers::HeaderMap;
use crate::method::Method;
use crate::version::HttpVersion;

/// A fully-parsed HTTP/1.1 request line and header section. Built by the
/// connection driver once the wire parser reaches `headers-complete`;
/// immutable from then on, and dropped once the handler's body processing
/// reaches `End` or the connection aborts.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    target: String,
    version: HttpVersion,
    headers: HeaderMap,
}

impl Request {
    pub(crate) fn new(
        method: Method, target: String, version: HttpVersion, headers: HeaderMap,
    ) -> Request {
        Request { method, target, version, headers }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The raw request-target as it appeared on the wire, e.g.
    /// `/hello?x=1` or `http://example.com/hello`. Use
    /// [`crate::request_target::RequestTarget::parse`] to break this down
    /// into its origin/absolute/authority/asterisk form.
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn version(&self) -> HttpVersion {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn accessors_round_trip_constructor_args() {
        let mut headers = HeaderMap::new();
        headers.append("Host", "example.com");
        let req = Request::new(
            Method::Get, "/hello".to_string(), HttpVersion::Http11, headers);
        assert_eq!(*req.method(), Method::Get);
        assert_eq!(req.target(), "/hello");
        assert_eq!(req.version(), HttpVersion::Http11);
        assert_eq!(req.headers().get("host"), vec!["example.com"]);
    }
}
