//! HTTP response status codes and reason phrases.

use std::fmt;

/// An HTTP response status: one canonical variant per well-known code
/// (trimmed from the teacher's two-spellings-per-code table to a single
/// name), plus [`Status::Raw`] for anything else. The reason phrase for a
/// raw/custom code that doesn't match the static table falls back to the
/// enumerator's own textual name, per the reference design.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Continue,
    SwitchingProtocols,
    Ok,
    Created,
    Accepted,
    NonAuthoritativeInformation,
    NoContent,
    ResetContent,
    PartialContent,
    MultipleChoices,
    MovedPermanently,
    Found,
    SeeOther,
    NotModified,
    UseProxy,
    TemporaryRedirect,
    PermanentRedirect,
    BadRequest,
    Unauthorized,
    PaymentRequired,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    NotAcceptable,
    ProxyAuthenticationRequired,
    RequestTimeout,
    Conflict,
    Gone,
    LengthRequired,
    PreconditionFailed,
    PayloadTooLarge,
    UriTooLong,
    UnsupportedMediaType,
    RangeNotSatisfiable,
    ExpectationFailed,
    UpgradeRequired,
    TooManyRequests,
    RequestHeaderFieldsTooLarge,
    InternalServerError,
    NotImplemented,
    BadGateway,
    ServiceUnavailable,
    GatewayTimeout,
    HttpVersionNotSupported,
    /// A status code/reason pair not covered by the table above.
    Raw(u16, String),
}

impl Status {
    pub fn code(&self) -> u16 {
        use self::Status::*;
        match *self {
            Continue => 100,
            SwitchingProtocols => 101,
            Ok => 200,
            Created => 201,
            Accepted => 202,
            NonAuthoritativeInformation => 203,
            NoContent => 204,
            ResetContent => 205,
            PartialContent => 206,
            MultipleChoices => 300,
            MovedPermanently => 301,
            Found => 302,
            SeeOther => 303,
            NotModified => 304,
            UseProxy => 305,
            TemporaryRedirect => 307,
            PermanentRedirect => 308,
            BadRequest => 400,
            Unauthorized => 401,
            PaymentRequired => 402,
            Forbidden => 403,
            NotFound => 404,
            MethodNotAllowed => 405,
            NotAcceptable => 406,
            ProxyAuthenticationRequired => 407,
            RequestTimeout => 408,
            Conflict => 409,
            Gone => 410,
            LengthRequired => 411,
            PreconditionFailed => 412,
            PayloadTooLarge => 413,
            UriTooLong => 414,
            UnsupportedMediaType => 415,
            RangeNotSatisfiable => 416,
            ExpectationFailed => 417,
            UpgradeRequired => 426,
            TooManyRequests => 429,
            RequestHeaderFieldsTooLarge => 431,
            InternalServerError => 500,
            NotImplemented => 501,
            BadGateway => 502,
            ServiceUnavailable => 503,
            GatewayTimeout => 504,
            HttpVersionNotSupported => 505,
            Raw(code, _) => code,
        }
    }

    pub fn reason(&self) -> &str {
        use self::Status::*;
        match *self {
            Continue => "Continue",
            SwitchingProtocols => "Switching Protocols",
            Ok => "OK",
            Created => "Created",
            Accepted => "Accepted",
            NonAuthoritativeInformation => "Non-Authoritative Information",
            NoContent => "No Content",
            ResetContent => "Reset Content",
            PartialContent => "Partial Content",
            MultipleChoices => "Multiple Choices",
            MovedPermanently => "Moved Permanently",
            Found => "Found",
            SeeOther => "See Other",
            NotModified => "Not Modified",
            UseProxy => "Use Proxy",
            TemporaryRedirect => "Temporary Redirect",
            PermanentRedirect => "Permanent Redirect",
            BadRequest => "Bad Request",
            Unauthorized => "Unauthorized",
            PaymentRequired => "Payment Required",
            Forbidden => "Forbidden",
            NotFound => "Not Found",
            MethodNotAllowed => "Method Not Allowed",
            NotAcceptable => "Not Acceptable",
            ProxyAuthenticationRequired => "Proxy Authentication Required",
            RequestTimeout => "Request Timeout",
            Conflict => "Conflict",
            Gone => "Gone",
            LengthRequired => "Length Required",
            PreconditionFailed => "Precondition Failed",
            PayloadTooLarge => "Payload Too Large",
            UriTooLong => "URI Too Long",
            UnsupportedMediaType => "Unsupported Media Type",
            RangeNotSatisfiable => "Range Not Satisfiable",
            ExpectationFailed => "Expectation Failed",
            UpgradeRequired => "Upgrade Required",
            TooManyRequests => "Too Many Requests",
            RequestHeaderFieldsTooLarge => "Request Header Fields Too Large",
            InternalServerError => "Internal Server Error",
            NotImplemented => "Not Implemented",
            BadGateway => "Bad Gateway",
            ServiceUnavailable => "Service Unavailable",
            GatewayTimeout => "Gateway Timeout",
            HttpVersionNotSupported => "HTTP Version Not Supported",
            Raw(_, ref reason) => reason,
        }
    }

    /// Whether this status forbids an entity body on the wire
    /// (1xx, 204, 304 — RFC 7230 §3.3.2).
    pub fn forbids_body(&self) -> bool {
        let code = self.code();
        (100..200).contains(&code) || code == 204 || code == 304
    }

    /// Build a status from a raw code, using the static table's reason
    /// phrase when the code is recognized, or a generic fallback otherwise.
    pub fn from_code(code: u16) -> Status {
        for known in Self::known_codes() {
            if known.code() == code {
                return known;
            }
        }
        Status::Raw(code, generic_reason(code).to_string())
    }

    fn known_codes() -> [Status; 44] {
        use self::Status::*;
        [
            Continue, SwitchingProtocols, Ok, Created, Accepted,
            NonAuthoritativeInformation, NoContent, ResetContent,
            PartialContent, MultipleChoices, MovedPermanently, Found,
            SeeOther, NotModified, UseProxy, TemporaryRedirect,
            PermanentRedirect, BadRequest, Unauthorized, PaymentRequired,
            Forbidden, NotFound, MethodNotAllowed, NotAcceptable,
            ProxyAuthenticationRequired, RequestTimeout, Conflict, Gone,
            LengthRequired, PreconditionFailed, PayloadTooLarge, UriTooLong,
            UnsupportedMediaType, RangeNotSatisfiable, ExpectationFailed,
            UpgradeRequired, TooManyRequests, RequestHeaderFieldsTooLarge,
            InternalServerError, NotImplemented, BadGateway,
            ServiceUnavailable, GatewayTimeout, HttpVersionNotSupported,
        ]
    }
}

fn generic_reason(code: u16) -> &'static str {
    match code / 100 {
        1 => "Informational",
        2 => "Success",
        3 => "Redirection",
        4 => "Client Error",
        5 => "Server Error",
        _ => "Unknown",
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}
