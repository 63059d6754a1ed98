//! Server-Sent Events (SSE) processing for streaming responses.
//!
//! The response body of a streamed chat completion is a sequence of newline-delimited
//! records.  Lines prefixed with `data:` carry a JSON [`CompletionChunk`]; every other
//! line is treated as an empty record.  A `data:` payload that is not JSON (keep-alive
//! noise, `[DONE]` markers) and a line that is not UTF-8 are skipped rather than
//! aborting the stream.

use std::io;

use bytes::Bytes;
use futures::stream::{Stream, StreamExt};
use tokio_util::codec::{AnyDelimiterCodec, FramedRead};
use tokio_util::io::StreamReader;

use crate::observability::{STREAM_BYTES, STREAM_DELTAS, STREAM_LINES, STREAM_SKIPPED_LINES};
use crate::{CompletionChunk, DeltaEvent, Error, Result};

/// Decodes a single body line.
pub fn decode_line(line: &str) -> DeltaEvent {
    STREAM_LINES.click();
    let Some(payload) = line.strip_prefix("data:") else {
        return DeltaEvent::Empty;
    };
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    match serde_json::from_str::<CompletionChunk>(payload) {
        Ok(chunk) => match chunk.first_delta() {
            Some(text) => {
                STREAM_DELTAS.click();
                DeltaEvent::Fragment(text.to_string())
            }
            None => DeltaEvent::Empty,
        },
        Err(err) => {
            STREAM_SKIPPED_LINES.click();
            tracing::debug!(payload, error = %err, "skipping unparsable stream record");
            DeltaEvent::Skipped
        }
    }
}

/// Decodes one raw body line, tolerating a trailing `\r` and bytes that are not UTF-8.
fn decode_raw_line(line: &[u8]) -> DeltaEvent {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    match std::str::from_utf8(line) {
        Ok(line) => decode_line(line),
        Err(err) => {
            STREAM_LINES.click();
            STREAM_SKIPPED_LINES.click();
            tracing::debug!(len = line.len(), error = %err, "skipping stream line that is not UTF-8");
            DeltaEvent::Skipped
        }
    }
}

/// Process a stream of bytes into a stream of delta events.
///
/// Bytes are framed into lines before decoding, so records and multi-byte characters
/// may be split across network reads arbitrarily.  A trailing line without a newline is
/// still decoded when the body ends.
pub fn process_sse<S, E>(byte_stream: S) -> impl Stream<Item = Result<DeltaEvent>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let bytes = byte_stream.map(|result| {
        result
            .map(|chunk| {
                STREAM_BYTES.count(chunk.len() as u64);
                chunk
            })
            .map_err(io::Error::other)
    });
    let codec = AnyDelimiterCodec::new(b"\n".to_vec(), b"\n".to_vec());
    FramedRead::new(StreamReader::new(bytes), codec).map(|line| match line {
        Ok(line) => Ok(decode_raw_line(&line)),
        Err(err) => Err(Error::streaming(
            format!("Error in HTTP stream: {err}"),
            Some(Box::new(err)),
        )),
    })
}
