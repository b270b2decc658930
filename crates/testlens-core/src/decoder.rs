// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! Incremental decoding of a live event stream
//!
//! Process output arrives in arbitrarily sized chunks that may split a record
//! in the middle of a line. [`StreamDecoder`] keeps the trailing partial line
//! in a carry-over buffer and only decodes newline-terminated lines.
//!
//! # Example
//!
//! ```
//! use testlens_core::decoder::StreamDecoder;
//!
//! let mut decoder = StreamDecoder::new();
//! let first: Vec<_> = decoder.feed(br#"{"Action":"run","Package":"p","#).collect();
//! assert!(first.is_empty());
//!
//! let second: Vec<_> = decoder.feed(b"\"Test\":\"TestA\"}\n").collect();
//! assert_eq!(second.len(), 1);
//! ```

use crate::error::DecodeError;
use crate::event::{TestEvent, decode_line};

/// Line-framing decoder for chunked process output
#[derive(Debug, Default)]
pub struct StreamDecoder {
    carry: Vec<u8>,
}

impl StreamDecoder {
    /// Create a new decoder with an empty carry-over buffer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and iterate over the events of every completed line
    ///
    /// The returned iterator owns the completed lines, so the decoder can be
    /// fed again while it is still being consumed.
    pub fn feed(&mut self, chunk: &[u8]) -> DecodedEvents {
        // The carry never holds a newline, so only the new chunk is searched.
        let complete = match chunk.iter().rposition(|&b| b == b'\n') {
            Some(last_newline) => {
                let last_newline = self.carry.len() + last_newline;
                self.carry.extend_from_slice(chunk);
                let rest = self.carry.split_off(last_newline + 1);
                std::mem::replace(&mut self.carry, rest)
            }
            None => {
                self.carry.extend_from_slice(chunk);
                Vec::new()
            }
        };

        DecodedEvents {
            data: complete,
            pos: 0,
        }
    }

    /// Feed a chunk and decode all completed lines into one batch
    ///
    /// Produces exactly the same sequence as iterating [`StreamDecoder::feed`].
    pub fn feed_batch(&mut self, chunk: &[u8]) -> Vec<Result<TestEvent, DecodeError>> {
        self.feed(chunk).collect()
    }

    /// Decode the final unterminated line once the stream has ended
    pub fn finish(&mut self) -> Option<Result<TestEvent, DecodeError>> {
        let rest = std::mem::take(&mut self.carry);
        decode_bytes(&rest)
    }

    /// Number of bytes waiting for a newline
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.carry.len()
    }
}

/// Lazy iterator over the events of a batch of complete lines
#[derive(Debug)]
pub struct DecodedEvents {
    data: Vec<u8>,
    pos: usize,
}

impl Iterator for DecodedEvents {
    type Item = Result<TestEvent, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.data.len() {
            let rest = &self.data[self.pos..];
            let end = rest
                .iter()
                .position(|&b| b == b'\n')
                .map_or(rest.len(), |i| i + 1);
            let line = &rest[..end];
            self.pos += end;

            if let Some(decoded) = decode_bytes(line) {
                return Some(decoded);
            }
        }
        None
    }
}

/// Decode one framed line; blank lines produce nothing
fn decode_bytes(line: &[u8]) -> Option<Result<TestEvent, DecodeError>> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim_end_matches(['\n', '\r']);
    if text.trim().is_empty() {
        return None;
    }
    Some(decode_line(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TestRef;
    use similar_asserts::assert_eq;

    const STREAM: &str = concat!(
        r#"{"Action":"run","Package":"pkg/a","Test":"TestOne"}"#,
        "\n",
        r#"{"Action":"output","Package":"pkg/a","Test":"TestOne","Output":"=== RUN   TestOne\n"}"#,
        "\r\n",
        "\n",
        r#"{"Action":"pass","Package":"pkg/a","Test":"TestOne","Elapsed":0.01}"#,
        "\n",
    );

    fn ok_events(results: Vec<Result<TestEvent, DecodeError>>) -> Vec<TestEvent> {
        results.into_iter().filter_map(Result::ok).collect()
    }

    #[test]
    fn test_single_chunk() {
        let mut decoder = StreamDecoder::new();
        let events = ok_events(decoder.feed(STREAM.as_bytes()).collect());
        assert_eq!(events.len(), 3);
        assert_eq!(decoder.pending_bytes(), 0);
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_split_mid_line() {
        let bytes = STREAM.as_bytes();
        let mut decoder = StreamDecoder::new();
        let mut events = ok_events(decoder.feed(&bytes[..30]).collect());
        assert!(events.is_empty());
        assert_eq!(decoder.pending_bytes(), 30);
        events.extend(ok_events(decoder.feed(&bytes[30..]).collect()));
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn test_byte_by_byte_matches_whole() {
        let mut whole = StreamDecoder::new();
        let expected = ok_events(whole.feed(STREAM.as_bytes()).collect());

        let mut decoder = StreamDecoder::new();
        let mut events = Vec::new();
        for b in STREAM.as_bytes() {
            events.extend(ok_events(decoder.feed(std::slice::from_ref(b)).collect()));
        }
        assert_eq!(events, expected);
    }

    #[test]
    fn test_long_line_across_many_chunks() {
        let text = "x".repeat(512 * 1024);
        let line = serde_json::json!({
            "Action": "output", "Package": "p", "Test": "TestA", "Output": text
        })
        .to_string();

        let mut decoder = StreamDecoder::new();
        for chunk in line.as_bytes().chunks(16 * 1024) {
            assert!(decoder.feed(chunk).next().is_none());
        }
        assert_eq!(decoder.pending_bytes(), line.len());

        let events = ok_events(decoder.feed(b"\n").collect());
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], TestEvent::Output { text: t, .. } if t.len() == text.len()));
        assert_eq!(decoder.pending_bytes(), 0);
    }

    #[test]
    fn test_batch_matches_iteration() {
        let mut a = StreamDecoder::new();
        let mut b = StreamDecoder::new();
        let iterated = ok_events(a.feed(STREAM.as_bytes()).collect());
        let batched = ok_events(b.feed_batch(STREAM.as_bytes()));
        assert_eq!(iterated, batched);
    }

    #[test]
    fn test_finish_decodes_unterminated_line() {
        let mut decoder = StreamDecoder::new();
        let events: Vec<_> = decoder
            .feed(br#"{"Action":"run","Package":"p","Test":"TestA"}"#)
            .collect();
        assert!(events.is_empty());

        let last = decoder.finish().expect("one line pending").expect("valid");
        assert_eq!(
            last,
            TestEvent::Run {
                test: TestRef::new("p", "TestA")
            }
        );
        assert_eq!(decoder.pending_bytes(), 0);
    }

    #[test]
    fn test_malformed_line_between_valid_records() {
        let stream = concat!(
            r#"{"Action":"run","Package":"p","Test":"TestA"}"#,
            "\n{not json\n",
            r#"{"Action":"pass","Package":"p","Test":"TestA"}"#,
            "\n",
        );
        let mut decoder = StreamDecoder::new();
        let results = decoder.feed_batch(stream.as_bytes());
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());
    }

    #[test]
    fn test_invalid_utf8_is_isolated() {
        let mut stream = br#"{"Action":"run","Package":"p","Test":"TestA"}"#.to_vec();
        stream.extend_from_slice(b"\n\xff\xfe\n");
        let mut decoder = StreamDecoder::new();
        let results = decoder.feed_batch(&stream);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }
}
