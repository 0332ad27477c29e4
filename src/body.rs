//! The WebApp-facing request body contract (spec §3 "BodyProcessing").
//!
//! Grounded in the teacher's `body_parser::BodyProgress` /
//! `chunked::State`, which track *how many bytes remain* in a fixed or
//! chunked body; that low-level accounting now lives inside
//! [`crate::parser::WireParser`] itself (its `BodyLength` state). What
//! remains at this layer is the contract between the connection driver and
//! the application: a tagged choice telling the driver whether to hand body
//! bytes to a callback or discard them, collapsed from the source's
//! repeated-dispatch-until-`ack`/`stop` busy loop (see spec §9 "Cooperative
//! body dispatch loop") into a single synchronous call per chunk, since this
//! port's body dispatch always runs to completion before the reader thread
//! resumes reading. The handler is handed the same [`ResponseWriter`] the
//! `WebApp` started, so a streaming echo can write body bytes back out as
//! they arrive instead of buffering the whole request first.

use crate::response::ResponseWriter;

/// One event delivered to a [`BodyProcessing::Process`] handler.
pub enum BodyEvent<'a> {
    /// A fragment of the request body. May be delivered more than once per
    /// logical chunk if the handler keeps asking for more.
    Chunk(&'a [u8]),
    /// The body has been fully delivered.
    End,
}

/// What a `WebApp` wants done with an incoming request body, returned
/// alongside the response it starts writing immediately (spec §4.3
/// "headers-complete").
pub enum BodyProcessing {
    /// The parser should keep parsing body bytes off the wire (so framing
    /// stays correct) but the driver need not deliver them anywhere.
    Discard,
    /// Deliver each [`BodyEvent`] to the boxed handler, alongside the
    /// response writer the same request started. Returning `true` from the
    /// handler tells the driver to stop invoking it for the rest of this
    /// request's body (equivalent to the source's `stop = true`
    /// out-parameter).
    Process(Box<dyn FnMut(BodyEvent, &mut ResponseWriter) -> bool + Send>),
}

impl BodyProcessing {
    /// Convenience constructor for the common case of a plain closure.
    pub fn process<F>(handler: F) -> BodyProcessing
        where F: FnMut(BodyEvent, &mut ResponseWriter) -> bool + Send + 'static
    {
        BodyProcessing::Process(Box::new(handler))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::mpsc::channel;
    use crate::version::HttpVersion;

    #[test]
    fn discard_variant_is_constructible() {
        let bp = BodyProcessing::Discard;
        assert!(matches!(bp, BodyProcessing::Discard));
    }

    #[test]
    fn process_handler_receives_chunks_and_can_stop() {
        let (tx, _rx) = channel();
        let mut writer = ResponseWriter::new(tx, HttpVersion::Http11, false, false, None);
        let mut seen = Vec::new();
        let mut bp = BodyProcessing::process(move |ev, w| {
            match ev {
                BodyEvent::Chunk(bytes) => {
                    seen.extend_from_slice(bytes);
                    w.write_body(bytes);
                    false
                }
                BodyEvent::End => true,
            }
        });
        if let BodyProcessing::Process(ref mut handler) = bp {
            assert!(!handler(BodyEvent::Chunk(b"hello"), &mut writer));
            assert!(!handler(BodyEvent::Chunk(b" world"), &mut writer));
            assert!(handler(BodyEvent::End, &mut writer));
        } else {
            panic!("expected Process variant");
        }
    }
}
