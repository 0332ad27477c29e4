//! HTTP request methods.

use std::fmt;

/// An HTTP request method.
///
/// Covers the core HTTP/1.1 methods plus the WebDAV extensions the wire
/// parser must still recognize as tokens (it never treats them specially);
/// anything else parses to [`Method::Other`] rather than failing, since the
/// method token grammar in RFC 7230 §3.1.1 accepts any `token`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Options,
    Get,
    Head,
    Post,
    Put,
    Delete,
    Patch,
    Trace,
    Connect,
    // WebDAV (RFC 4918) extensions.
    PropFind,
    PropPatch,
    MkCol,
    Copy,
    Move,
    Lock,
    Unlock,
    /// Any other method token, verbatim.
    Other(String),
}

impl Method {
    pub(crate) fn parse(token: &str) -> Method {
        match token {
            "OPTIONS" => Method::Options,
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "PATCH" => Method::Patch,
            "TRACE" => Method::Trace,
            "CONNECT" => Method::Connect,
            "PROPFIND" => Method::PropFind,
            "PROPPATCH" => Method::PropPatch,
            "MKCOL" => Method::MkCol,
            "COPY" => Method::Copy,
            "MOVE" => Method::Move,
            "LOCK" => Method::Lock,
            "UNLOCK" => Method::Unlock,
            other => Method::Other(other.to_string()),
        }
    }

    /// True for `CONNECT`, which never carries a length-delimited body and
    /// always implies an upgrade-style handoff of the raw connection.
    pub fn is_connect(&self) -> bool {
        matches!(*self, Method::Connect)
    }

    /// True for `HEAD`, whose response must report the body length that a
    /// `GET` would carry but never actually write body bytes on the wire.
    pub fn is_head(&self) -> bool {
        matches!(*self, Method::Head)
    }

    pub fn as_str(&self) -> &str {
        match *self {
            Method::Options => "OPTIONS",
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Trace => "TRACE",
            Method::Connect => "CONNECT",
            Method::PropFind => "PROPFIND",
            Method::PropPatch => "PROPPATCH",
            Method::MkCol => "MKCOL",
            Method::Copy => "COPY",
            Method::Move => "MOVE",
            Method::Lock => "LOCK",
            Method::Unlock => "UNLOCK",
            Method::Other(ref s) => s,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
