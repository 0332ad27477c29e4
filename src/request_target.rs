//! Parsing of the HTTP request-target (RFC 7230 §5.3).

/// The four forms a request-target may take.
#[derive(Debug, PartialEq, Eq)]
pub enum RequestTarget<'a> {
    /// Usual form, e.g. `/hello?name=world`.
    Origin(&'a str),
    /// Full URL, e.g. `http://example.com:8080/hello`.
    ///
    /// Unlike `Origin`, `path` may not start with a slash (it is empty for
    /// a bare authority URL like `http://example.com`).
    Absolute { scheme: &'a str, authority: &'a str, path: &'a str },
    /// Bare authority, e.g. `example.com:8080` — only valid for `CONNECT`.
    Authority(&'a str),
    /// `*`, only valid for server-wide `OPTIONS`.
    Asterisk,
}

// The authority component can't contain `/`, `?`, or `#`; userinfo (`@`) is
// rejected too since HTTP carries no authentication in the request-target.
fn authority_end_char(&x: &u8) -> bool {
    x == b'/' || x == b'?' || x == b'#' || x == b'@'
}

impl<'a> RequestTarget<'a> {
    pub fn parse(s: &'a str) -> Option<RequestTarget<'a>> {
        use self::RequestTarget::*;

        if s.is_empty() {
            return None;
        }
        if s.starts_with('/') {
            return Some(Origin(s));
        }
        if let Some(rest) = s.strip_prefix("http://") {
            let auth_end = rest.as_bytes().iter()
                .position(authority_end_char)
                .unwrap_or(rest.len());
            return Some(Absolute {
                scheme: "http",
                authority: &rest[..auth_end],
                path: &rest[auth_end..],
            });
        }
        if let Some(rest) = s.strip_prefix("https://") {
            let auth_end = rest.as_bytes().iter()
                .position(authority_end_char)
                .unwrap_or(rest.len());
            return Some(Absolute {
                scheme: "https",
                authority: &rest[..auth_end],
                path: &rest[auth_end..],
            });
        }
        if s == "*" {
            return Some(Asterisk);
        }
        if s.as_bytes().iter().position(authority_end_char).is_none() {
            return Some(Authority(s));
        }

        None
    }
}
