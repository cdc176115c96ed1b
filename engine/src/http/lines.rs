//! Splitting a chunked byte stream into newline-delimited records

use std::collections::VecDeque;

use futures::stream::{self, BoxStream, Stream, StreamExt};

use crate::errors::EngineError;

struct LineState<S> {
    inner: std::pin::Pin<Box<S>>,
    buffer: Vec<u8>,
    ready: VecDeque<String>,
    finished: bool,
}

impl<S> LineState<S> {
    fn drain_complete_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.push_line(&raw);
        }
    }

    fn push_line(&mut self, raw: &[u8]) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(['\n', '\r']);
        if !line.trim().is_empty() {
            self.ready.push_back(line.to_string());
        }
    }
}

/// Turn a stream of byte chunks into a stream of non-empty lines
///
/// A trailing line without a newline is emitted when the inner stream ends.
/// The first inner error is yielded and ends the stream.
pub fn split_lines<S, C, E>(inner: S) -> BoxStream<'static, Result<String, EngineError>>
where
    S: Stream<Item = Result<C, E>> + Send + 'static,
    C: AsRef<[u8]> + Send + 'static,
    E: Into<EngineError> + Send + 'static,
{
    let state = LineState {
        inner: Box::pin(inner),
        buffer: Vec::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.ready.pop_front() {
                return Some((Ok(line), state));
            }
            if state.finished {
                return None;
            }

            match state.inner.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(chunk.as_ref());
                    state.drain_complete_lines();
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e.into()), state));
                }
                None => {
                    state.finished = true;
                    let rest = std::mem::take(&mut state.buffer);
                    state.push_line(&rest);
                }
            }
        }
    })
    .boxed()
}
