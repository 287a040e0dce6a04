//! Length-prefixed JSON record framing for agent API responses that stream
//! more than one record per connection (attach/output streams).
//!
//! Each record is framed as an ASCII decimal byte count, a newline, and
//! that many bytes of JSON payload — the same shape as the original
//! protobuf `RecordIO` framing, with the payload encoding swapped for JSON.

use bytes::{Buf, BytesMut};
use serde_json::Value;
use tokio_util::codec::Decoder;

/// Errors produced while decoding a `RecordIO`-framed stream.
#[derive(Debug)]
pub enum RecordIoError {
    /// The length prefix was not a valid non-negative decimal integer.
    BadLengthPrefix(String),
    /// The framed payload was not valid JSON.
    InvalidJson(serde_json::Error),
    /// Underlying I/O failure.
    Io(std::io::Error),
}

impl std::fmt::Display for RecordIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadLengthPrefix(s) => write!(f, "invalid recordio length prefix: {s:?}"),
            Self::InvalidJson(err) => write!(f, "invalid recordio payload: {err}"),
            Self::Io(err) => write!(f, "recordio io error: {err}"),
        }
    }
}

impl std::error::Error for RecordIoError {}

impl From<std::io::Error> for RecordIoError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

/// Decodes a byte stream into successive JSON records.
#[derive(Debug, Default)]
pub struct RecordIoDecoder {
    /// Length of the record currently being assembled, once the prefix has
    /// been parsed off the front of the buffer.
    pending_len: Option<usize>,
}

impl Decoder for RecordIoDecoder {
    type Item = Value;
    type Error = RecordIoError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if let Some(len) = self.pending_len {
                if src.len() < len {
                    return Ok(None);
                }
                let frame = src.split_to(len);
                self.pending_len = None;
                let value: Value = serde_json::from_slice(&frame).map_err(RecordIoError::InvalidJson)?;
                return Ok(Some(value));
            }

            let Some(newline_pos) = src.iter().position(|&b| b == b'\n') else {
                return Ok(None);
            };

            let prefix = src.split_to(newline_pos + 1);
            let digits = &prefix[..prefix.len() - 1];
            let text = std::str::from_utf8(digits)
                .map_err(|_| RecordIoError::BadLengthPrefix(String::from_utf8_lossy(digits).into_owned()))?;
            let len: usize = text
                .parse()
                .map_err(|_| RecordIoError::BadLengthPrefix(text.to_owned()))?;

            self.pending_len = Some(len);
        }
    }
}

/// Decode every complete record out of a full in-memory buffer, ignoring a
/// trailing partial record. Convenient for tests and for agent responses
/// that arrive as a single buffered body rather than a live stream.
///
/// # Errors
///
/// Returns the first [`RecordIoError`] encountered.
pub fn decode_all(bytes: &[u8]) -> Result<Vec<Value>, RecordIoError> {
    let mut buf = BytesMut::from(bytes);
    let mut decoder = RecordIoDecoder::default();
    let mut out = Vec::new();
    while let Some(value) = decoder.decode(&mut buf)? {
        out.push(value);
    }
    let _ = buf.remaining();
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_two_records() {
        let mut payload = Vec::new();
        let a = serde_json::to_vec(&json!({"a": 1})).unwrap();
        let b = serde_json::to_vec(&json!({"b": 2})).unwrap();
        payload.extend_from_slice(format!("{}\n", a.len()).as_bytes());
        payload.extend_from_slice(&a);
        payload.extend_from_slice(format!("{}\n", b.len()).as_bytes());
        payload.extend_from_slice(&b);

        let records = decode_all(&payload).expect("valid stream");
        assert_eq!(records, vec![json!({"a": 1}), json!({"b": 2})]);
    }

    #[test]
    fn leaves_partial_record_pending() {
        let mut decoder = RecordIoDecoder::default();
        let mut buf = BytesMut::from(&b"5\n{\"a\""[..]);
        assert!(decoder.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn rejects_bad_length_prefix() {
        let mut decoder = RecordIoDecoder::default();
        let mut buf = BytesMut::from(&b"nope\n{}"[..]);
        assert!(decoder.decode(&mut buf).is_err());
    }
}
