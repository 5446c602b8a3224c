//! Streaming JSON decoding of requests and line-oriented response encoding.

use parking_lot::Mutex;
use serde_json::de::IoRead;
use serde_json::{Deserializer, StreamDeserializer};
use std::io::{self, Read, Write};
use tracing::warn;

use crate::message::{Request, Response};

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("failed to encode response {id}")]
    Encode {
        id: i64,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write response")]
    Io(#[from] io::Error),
}

/// Pulls requests off a byte stream, one JSON value at a time.
///
/// Values may be separated by any whitespace. The first value that fails
/// to decode ends the stream, exactly like end of input; the failure is
/// logged and the remaining bytes are never looked at.
pub struct RequestStream<R: Read> {
    inner: StreamDeserializer<'static, IoRead<R>, Request>,
    finished: bool,
}

impl<R: Read> RequestStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: Deserializer::from_reader(reader).into_iter(),
            finished: false,
        }
    }
}

impl<R: Read> Iterator for RequestStream<R> {
    type Item = Request;

    fn next(&mut self) -> Option<Request> {
        if self.finished {
            return None;
        }
        match self.inner.next() {
            Some(Ok(request)) => Some(request),
            Some(Err(err)) => {
                warn!(error = %err, line = err.line(), "stopping input on undecodable request");
                self.finished = true;
                None
            }
            None => {
                self.finished = true;
                None
            }
        }
    }
}

impl<R: Read> std::iter::FusedIterator for RequestStream<R> {}

/// Writes one JSON line per response. Shared by every worker of a run.
///
/// Each response is encoded outside the lock, then written and flushed
/// while holding it, so lines from different workers never interleave.
#[derive(Debug)]
pub struct ResponseSink<W: Write> {
    out: Mutex<W>,
}

impl<W: Write> ResponseSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn send(&self, response: &Response) -> Result<(), WireError> {
        let mut line = serde_json::to_vec(response).map_err(|source| WireError::Encode {
            id: response.id(),
            source,
        })?;
        line.push(b'\n');

        let mut out = self.out.lock();
        out.write_all(&line)?;
        out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Command;

    #[test]
    fn decodes_whitespace_separated_values() {
        let input = br#"{"command":"ADD","id":1,"body":"a","timestamp":1.5}
            {"command":"FEED","id":2} {"command":"DONE","id":3}"#;
        let ids: Vec<_> = RequestStream::new(&input[..]).map(|r| (r.command, r.id)).collect();
        assert_eq!(
            ids,
            vec![(Command::Add, 1), (Command::Feed, 2), (Command::Done, 3)]
        );
    }

    #[test]
    fn malformed_value_ends_the_stream() {
        let input = br#"{"command":"ADD","id":1,"timestamp":1.0}
            {"command":"ADD","id":
            {"command":"FEED","id":3}"#;
        let mut stream = RequestStream::new(&input[..]);
        assert_eq!(stream.next().map(|r| r.id), Some(1));
        assert!(stream.next().is_none());
        assert!(stream.next().is_none(), "stream stays finished");
    }

    #[test]
    fn wrongly_typed_field_ends_the_stream() {
        let input = br#"{"command":"ADD","id":"one"} {"command":"FEED","id":2}"#;
        assert_eq!(RequestStream::new(&input[..]).count(), 0);
    }

    #[test]
    fn missing_fields_decode_as_zero_values() {
        let input = br#"{"command":"ADD","body":"x","timestamp":1} {"id":3} {"Command":"FEED","Id":4}"#;
        let requests: Vec<_> = RequestStream::new(&input[..]).collect();
        assert_eq!(
            requests,
            vec![
                Request::new(Command::Add, 0).with_body("x").with_timestamp(1.0),
                Request::new(Command::Unknown, 3),
                Request::new(Command::Feed, 4),
            ]
        );
    }

    #[test]
    fn sink_writes_one_line_per_response() {
        let sink = ResponseSink::new(Vec::new());
        sink.send(&Response::status(1, true)).expect("send");
        sink.send(&Response::feed(2, Vec::new())).expect("send");
        let out = String::from_utf8(sink.into_inner()).expect("utf8");
        assert_eq!(out, "{\"id\":1,\"success\":true}\n{\"id\":2,\"feed\":[]}\n");
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_is_reported() {
        let sink = ResponseSink::new(BrokenPipe);
        let err = sink.send(&Response::status(1, true)).unwrap_err();
        assert!(matches!(err, WireError::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
    }
}
