//! SSE job stream reader.
//!
//! The backend delivers job events as Server-Sent Events: `data:` lines
//! carrying JSON payloads, frames separated by a blank line, and
//! `: keep-alive` comment frames every 15 s on an idle stream. Frames can
//! be split across transport chunks, so the reader reassembles a byte
//! buffer and extracts complete frames from it.

use super::client::ApiError;
use crate::types::StreamEvent;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tracing::debug;

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ApiError>> + Send>>;

/// Pull-based reader over the SSE job stream.
///
/// Malformed payloads are dropped with a debug log and never surface as
/// errors; transport errors end the stream and bubble up so the caller
/// can fall back to polling.
pub struct JobStream {
    inner: ByteStream,
    buffer: Vec<u8>,
    done: bool,
}

impl JobStream {
    pub fn new(inner: ByteStream) -> Self {
        Self {
            inner,
            buffer: Vec::with_capacity(4096),
            done: false,
        }
    }

    pub(crate) fn from_response(response: reqwest::Response) -> Self {
        let mapped = response.bytes_stream().map(|item| item.map_err(ApiError::from));
        Self::new(Box::pin(mapped))
    }

    /// Read the next job event.
    ///
    /// Returns `Ok(None)` when the server closes the stream cleanly and
    /// `Err` on transport failure. Comment frames and undecodable frames
    /// are skipped internally.
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>, ApiError> {
        loop {
            while let Some(frame) = take_frame(&mut self.buffer) {
                if let Some(event) = parse_frame(&frame) {
                    return Ok(Some(event));
                }
            }

            if self.done {
                return Ok(None);
            }

            match self.inner.next().await {
                Some(Ok(chunk)) => self.buffer.extend_from_slice(&chunk),
                Some(Err(e)) => return Err(e),
                None => {
                    self.done = true;
                    // A final frame may lack the trailing blank line
                    if !self.buffer.is_empty() {
                        let rest = std::mem::take(&mut self.buffer);
                        if let Some(event) = parse_frame(&rest) {
                            return Ok(Some(event));
                        }
                    }
                    return Ok(None);
                }
            }
        }
    }
}

/// Extract the next complete frame (up to a blank-line separator) from
/// the buffer, or `None` if no separator is present yet.
fn take_frame(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let pos = buffer.windows(2).position(|w| w == b"\n\n")?;
    let mut frame: Vec<u8> = buffer.drain(..pos + 2).collect();
    frame.truncate(pos);
    Some(frame)
}

/// Decode one SSE frame into a job event.
///
/// Joins the frame's `data:` lines, ignores comment lines (`:` prefix —
/// the backend's keep-alives), and drops frames that do not decode.
fn parse_frame(frame: &[u8]) -> Option<StreamEvent> {
    let text = String::from_utf8_lossy(frame);
    let mut data = String::new();

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.trim_start());
        }
    }

    if data.is_empty() {
        return None;
    }

    match serde_json::from_str::<StreamEvent>(&data) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!(error = %e, "Dropping malformed stream payload");
            None
        }
    }
}
