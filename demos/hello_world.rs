//! Minimal demo server, the blocking-thread counterpart of the teacher's
//! own `examples/hello_world.rs`: one thread per accepted connection,
//! `env_logger` wired up from `RUST_LOG` exactly as the teacher does.

extern crate env_logger;
#[macro_use]
extern crate log;
extern crate http1_engine;

use std::env;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

use http1_engine::body::BodyProcessing;
use http1_engine::request::Request;
use http1_engine::response::ResponseWriter;
use http1_engine::status::Status;
use http1_engine::{idle, transport, Config, KeepAliveCounter};

const BODY: &'static str = "Hello World!";

fn hello_world(_req: Request, resp: &mut ResponseWriter) -> BodyProcessing {
    resp.status(Status::Ok);
    resp.add_length(BODY.len() as u64).unwrap();
    resp.add_header("Server", concat!("http1-engine/", env!("CARGO_PKG_VERSION"))).unwrap();
    resp.done_headers().unwrap();
    resp.write_body(BODY.as_bytes());
    resp.done();
    BodyProcessing::Discard
}

fn main() {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::init().expect("init logging");

    let listener = TcpListener::bind("0.0.0.0:8080").unwrap();
    let config = Config::new().done();
    let keep_alive = KeepAliveCounter::new();
    let pruner = Arc::new(idle::IdlePruner::new(config.get_keep_alive_timeout()));

    for stream in listener.incoming() {
        let socket = match stream {
            Ok(s) => s,
            Err(e) => { warn!("accept error: {}", e); continue; }
        };
        let config = config.clone();
        let keep_alive = keep_alive.clone();
        let pruner = pruner.clone();
        thread::spawn(move || {
            if let Err(e) = transport::run(socket, hello_world, config, keep_alive, Some(&pruner)) {
                warn!("connection error: {}", e);
            }
        });
    }
}
