//! Incremental newline-delimited JSON decoding of a watch response body.

use std::fmt::Display;

use bytes::{Buf, Bytes, BytesMut};
use dashwatch_core::{StoreError, WatchStream};
use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};

use crate::wire::parse_watch_line;

struct LineState<E> {
    body: BoxStream<'static, Result<Bytes, E>>,
    buf: BytesMut,
    finished: bool,
}

/// Decode a chunked watch body into [`WatchEvent`](dashwatch_core::WatchEvent)s.
///
/// Frames may span chunk boundaries. A transport error is yielded once and
/// ends the stream; a trailing frame without a newline is still decoded.
pub fn decode_watch_body<S, E>(body: S) -> WatchStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = LineState {
        body: body.boxed(),
        buf: BytesMut::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(pos) = state.buf.iter().position(|b| *b == b'\n') {
                let line = state.buf.split_to(pos + 1);
                let line = line[..pos].trim_ascii();
                if line.is_empty() {
                    continue;
                }
                return Some((parse_watch_line(line), state));
            }

            if state.finished {
                if state.buf.trim_ascii().is_empty() {
                    return None;
                }
                let rest = state.buf.split();
                return Some((parse_watch_line(rest.trim_ascii()), state));
            }

            match state.body.next().await {
                Some(Ok(chunk)) => state.buf.extend_from_slice(chunk.chunk()),
                Some(Err(e)) => {
                    state.finished = true;
                    state.buf.clear();
                    return Some((Err(StoreError::connection(format!("watch stream: {e}"))), state));
                }
                None => state.finished = true,
            }
        }
    })
    .boxed()
}
