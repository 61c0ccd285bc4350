// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Incremental decoding of concatenated JSON objects from a chunked body.
//!
//! Both Nomad streaming endpoints (`/v1/client/fs/logs` and
//! `/v1/event/stream`) write a sequence of JSON objects with no framing other
//! than optional whitespace. Chunk boundaries from the HTTP body do not line
//! up with object boundaries, so bytes are buffered until a complete object
//! can be parsed.

use std::collections::VecDeque;
use std::marker::PhantomData;

use bytes::Bytes;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::NomadError;

pub struct JsonDecoder<T> {
    buf: Vec<u8>,
    scan: Scan,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for JsonDecoder<T> {
    fn default() -> Self {
        Self {
            buf: Vec::new(),
            scan: Scan::default(),
            _marker: PhantomData,
        }
    }
}

/// Tracks nesting over the buffered bytes so each byte is looked at once and
/// serde only runs on a complete top-level value.
#[derive(Debug, Default)]
struct Scan {
    pos: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl Scan {
    /// Consumes one byte and returns true when it ends a top-level value.
    /// A stray byte outside any object also counts, so that serde reports it.
    fn step(&mut self, byte: u8) -> bool {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if byte == b'\\' {
                self.escaped = true;
            } else if byte == b'"' {
                self.in_string = false;
            }
            return false;
        }
        match byte {
            b'"' if self.depth > 0 => {
                self.in_string = true;
                false
            }
            b'{' | b'[' => {
                self.depth += 1;
                false
            }
            b'}' | b']' => {
                self.depth = self.depth.saturating_sub(1);
                self.depth == 0
            }
            _ => self.depth == 0 && !byte.is_ascii_whitespace(),
        }
    }
}

impl<T: DeserializeOwned> JsonDecoder<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every object that is now complete. An
    /// incomplete trailing object stays buffered for the next call.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<T>, serde_json::Error> {
        self.buf.extend_from_slice(chunk);

        let mut decoded = Vec::new();
        let mut start = 0;
        while self.scan.pos < self.buf.len() {
            let byte = self.buf[self.scan.pos];
            self.scan.pos += 1;
            if self.scan.step(byte) {
                decoded.push(serde_json::from_slice(&self.buf[start..self.scan.pos])?);
                start = self.scan.pos;
            }
        }
        self.buf.drain(..start);
        self.scan.pos -= start;
        Ok(decoded)
    }

    /// True when nothing but whitespace is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.iter().all(u8::is_ascii_whitespace)
    }
}

struct DecodeState<T> {
    chunks: BoxStream<'static, Result<Bytes, NomadError>>,
    decoder: JsonDecoder<T>,
    ready: VecDeque<T>,
    done: bool,
}

/// Turns a body stream into a stream of decoded objects. The first error ends
/// the stream after being yielded.
pub fn decode_stream<T, S>(chunks: S) -> BoxStream<'static, Result<T, NomadError>>
where
    T: DeserializeOwned + Send + 'static,
    S: Stream<Item = Result<Bytes, NomadError>> + Send + 'static,
{
    let state = DecodeState {
        chunks: chunks.boxed(),
        decoder: JsonDecoder::new(),
        ready: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(value) = st.ready.pop_front() {
                return Some((Ok(value), st));
            }
            if st.done {
                return None;
            }
            match st.chunks.next().await {
                Some(Ok(chunk)) => match st.decoder.push(&chunk) {
                    Ok(values) => st.ready.extend(values),
                    Err(e) => {
                        st.done = true;
                        return Some((Err(NomadError::from(e)), st));
                    }
                },
                Some(Err(e)) => {
                    st.done = true;
                    return Some((Err(e), st));
                }
                None => {
                    if !st.decoder.is_empty() {
                        debug!("NOMAD | Body ended inside a JSON object, discarding the partial object");
                    }
                    return None;
                }
            }
        }
    })
    .boxed()
}
