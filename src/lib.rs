//! A streaming, server-side HTTP/1.1 connection driver.
//!
//! Parses requests incrementally off a byte stream, dispatches each to a
//! [`WebApp`](connection::WebApp) that may start writing its response
//! before the request body has finished arriving, serializes the response
//! (chunked or identity framing), and manages keep-alive, idle timeout, and
//! upgrade handoff.
#![recursion_limit = "100"]

extern crate httparse;
extern crate netbuf;
#[macro_use(quick_error)] extern crate quick_error;
#[macro_use] extern crate log;
#[cfg(feature = "date_header")]
extern crate httpdate;
#[cfg(test)]
#[macro_use] extern crate matches;

pub mod body;
pub mod config;
pub mod connection;
pub mod error;
pub mod headers;
pub mod idle;
pub mod keepalive;
pub mod method;
pub mod parser;
pub mod request;
pub mod request_target;
pub mod response;
pub mod serializer;
pub mod status;
pub mod transport;
pub mod version;

pub use config::Config;
pub use connection::{ConnectionDriver, ConnectionState, WebApp};
pub use error::Error;
pub use headers::HeaderMap;
pub use idle::IdlePruner;
pub use keepalive::KeepAliveCounter;
pub use method::Method;
pub use request::Request;
pub use response::ResponseWriter;
pub use status::Status;
pub use transport::Transport;
pub use version::HttpVersion;
