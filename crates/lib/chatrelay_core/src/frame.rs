// @zen-component: RELAY-FrameDecoder
//
//! Incremental decoder for the upstream event stream.
//!
//! The upstream sends newline-delimited lines; payload lines start with
//! `data: `. Network reads split lines (and multi-byte characters) at
//! arbitrary points, so decoding keeps two pieces of carry-over state:
//!
//! 1. [`Utf8Decoder`] holds the bytes of an incomplete UTF-8 sequence.
//! 2. [`FrameDecoder`] holds the text after the last `\n` seen so far.
//!
//! Each complete line yields at most one [`RelayEvent`]. Line boundaries are
//! decided by `\n` alone, never by payload content.

use serde_json::Value;
use thiserror::Error;

use crate::event::RelayEvent;

/// Prefix that marks a payload line.
pub const DATA_PREFIX: &str = "data: ";

/// Payload that marks the end of the upstream stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Default upper bound on a single line, in bytes.
pub const DEFAULT_MAX_LINE_LEN: usize = 1024 * 1024;

/// Failure to process a single frame. The frame is dropped; the stream
/// continues.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("line of {len} bytes exceeds the {limit} byte limit")]
    Oversized { len: usize, limit: usize },
}

/// Result of processing one complete line that produced output.
pub type FrameResult = Result<RelayEvent, FrameError>;

/// Streaming UTF-8 decoder.
///
/// Bytes of a character split across chunks are held back until the rest
/// arrives. Invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk, carrying an incomplete trailing sequence over.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flush any held-back bytes at end of stream.
    pub fn finish(&mut self) -> String {
        let pending = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }
}

/// Classify one complete line.
///
/// Returns `None` for lines that produce nothing: blank lines, lines without
/// the `data: ` prefix, empty payloads and the `[DONE]` sentinel. JSON
/// payloads become structured events, anything else is wrapped as raw text.
pub fn parse_line(line: &str) -> Option<RelayEvent> {
    if line.trim().is_empty() {
        return None;
    }
    let data = line.strip_prefix(DATA_PREFIX)?.trim();
    if data.is_empty() || data == DONE_SENTINEL {
        return None;
    }
    Some(match serde_json::from_str::<Value>(data) {
        Ok(value) => RelayEvent::structured(value),
        Err(_) => RelayEvent::raw(data),
    })
}

/// Newline framer over a byte stream. One instance per upstream response.
#[derive(Debug)]
pub struct FrameDecoder {
    utf8: Utf8Decoder,
    /// Text after the last newline: an incomplete line.
    buffer: String,
    max_line_len: usize,
    /// Set after an oversized partial line; input is dropped up to the next `\n`.
    discarding: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_max_line_len(DEFAULT_MAX_LINE_LEN)
    }

    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            utf8: Utf8Decoder::new(),
            buffer: String::new(),
            max_line_len,
            discarding: false,
        }
    }

    /// Text currently held as an incomplete line.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Feed one network read; returns the events for every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<FrameResult> {
        let text = self.utf8.decode(chunk);
        let mut out = Vec::new();

        let mut input = text.as_str();
        if self.discarding {
            match input.find('\n') {
                Some(pos) => {
                    self.discarding = false;
                    input = &input[pos + 1..];
                }
                None => return out,
            }
        }
        // The carried-over buffer holds no newline, so only new input is searched.
        let carried = self.buffer.len();
        self.buffer.push_str(input);

        if let Some(pos) = input.rfind('\n') {
            let tail = self.buffer.split_off(carried + pos + 1);
            let complete = std::mem::replace(&mut self.buffer, tail);
            for line in complete.split('\n') {
                if let Some(result) = self.process_line(line).transpose() {
                    out.push(result);
                }
            }
        }

        if self.buffer.len() > self.max_line_len {
            out.push(Err(FrameError::Oversized {
                len: self.buffer.len(),
                limit: self.max_line_len,
            }));
            self.buffer.clear();
            self.discarding = true;
        }

        out
    }

    /// Handle end of stream: the remaining partial line is processed as if
    /// it were complete.
    pub fn finish(mut self) -> Vec<FrameResult> {
        let tail = self.utf8.finish();
        if self.discarding {
            return Vec::new();
        }
        self.buffer.push_str(&tail);
        let remainder = std::mem::take(&mut self.buffer);
        self.process_line(&remainder).transpose().into_iter().collect()
    }

    fn process_line(&self, line: &str) -> Result<Option<RelayEvent>, FrameError> {
        if line.len() > self.max_line_len {
            return Err(FrameError::Oversized {
                len: line.len(),
                limit: self.max_line_len,
            });
        }
        Ok(parse_line(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frames(results: Vec<FrameResult>) -> Vec<String> {
        results
            .into_iter()
            .map(|r| r.expect("frame").encode())
            .collect()
    }

    fn decode_all(chunks: &[&[u8]]) -> Vec<String> {
        let mut decoder = FrameDecoder::new();
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(frames(decoder.push(chunk)));
        }
        out.extend(frames(decoder.finish()));
        out
    }

    // -----------------------------------------------------------------------
    // parse_line
    // -----------------------------------------------------------------------

    #[test]
    fn json_payload_becomes_structured_event() {
        let event = parse_line(r#"data: {"a":1}"#).unwrap();
        assert_eq!(event.to_json(), json!({"a": 1}));
    }

    #[test]
    fn non_json_payload_is_wrapped() {
        let event = parse_line("data: hello world").unwrap();
        assert_eq!(event.to_json(), json!({"message": "hello world"}));
    }

    #[test]
    fn skipped_lines() {
        assert!(parse_line("").is_none());
        assert!(parse_line("   \r").is_none());
        assert!(parse_line("data: [DONE]").is_none());
        assert!(parse_line("data:    ").is_none());
        assert!(parse_line("event: message").is_none());
        assert!(parse_line(": keep-alive").is_none());
        // Prefix requires the space.
        assert!(parse_line("data:{\"a\":1}").is_none());
        // Prefix is matched before trimming.
        assert!(parse_line("  data: {\"a\":1}").is_none());
    }

    #[test]
    fn payload_is_trimmed() {
        let event = parse_line("data:   {\"a\":1}  \r").unwrap();
        assert_eq!(event.to_json(), json!({"a": 1}));
    }

    // -----------------------------------------------------------------------
    // FrameDecoder
    // -----------------------------------------------------------------------

    #[test]
    fn whole_stream_in_one_read() {
        let out = decode_all(&[b"data: {\"a\":1}\n\ndata: [DONE]\n\n"]);
        assert_eq!(out, vec!["data: {\"a\":1}\n\n".to_string()]);
    }

    #[test]
    fn frames_split_across_reads_are_reassembled() {
        let out = decode_all(&[b"da", b"ta: {\"a\":1}\n\nda", b"ta: [DONE]\n\n"]);
        assert_eq!(out, vec!["data: {\"a\":1}\n\n".to_string()]);
    }

    #[test]
    fn every_split_point_yields_the_same_events() {
        let stream: &[u8] = b"data: {\"a\":1}\n\ndata: hi there\ndata: [DONE]\n\n";
        let expected = decode_all(&[stream]);
        assert_eq!(expected.len(), 2);
        for split in 0..=stream.len() {
            let (a, b) = stream.split_at(split);
            assert_eq!(decode_all(&[a, b]), expected, "split at {split}");
        }
    }

    #[test]
    fn pending_holds_incomplete_line() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: {\"a\":").is_empty());
        assert_eq!(decoder.pending(), "data: {\"a\":");
        let out = frames(decoder.push(b"2}\ndata: x"));
        assert_eq!(out, vec!["data: {\"a\":2}\n\n".to_string()]);
        assert_eq!(decoder.pending(), "data: x");
    }

    #[test]
    fn long_line_in_small_reads_splits_at_newline_in_latest_read() {
        let mut decoder = FrameDecoder::new();
        let payload = "x".repeat(4096);
        let line = format!("data: {payload}");
        for byte in line.as_bytes().chunks(3) {
            assert!(decoder.push(byte).is_empty());
        }
        assert_eq!(decoder.pending(), line);

        let out = frames(decoder.push(b"\ndata: {\"n\":"));
        assert_eq!(out, vec![RelayEvent::raw(payload).encode()]);
        assert_eq!(decoder.pending(), "data: {\"n\":");
        assert_eq!(frames(decoder.push(b"1}\n")), vec!["data: {\"n\":1}\n\n".to_string()]);
        assert!(decoder.pending().is_empty());
    }

    #[test]
    fn line_over_default_limit_passes_with_raised_limit() {
        let line = format!("data: {{\"v\":\"{}\"}}\n", "a".repeat(DEFAULT_MAX_LINE_LEN));

        let mut capped = FrameDecoder::new();
        let results = capped.push(line.as_bytes());
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(FrameError::Oversized { .. })));

        let mut raised = FrameDecoder::with_max_line_len(2 * DEFAULT_MAX_LINE_LEN);
        let results = raised.push(line.as_bytes());
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].as_ref().unwrap().to_json()["v"].as_str().map(str::len),
            Some(DEFAULT_MAX_LINE_LEN)
        );
    }

    #[test]
    fn remainder_is_processed_at_end_of_stream() {
        let out = decode_all(&[b"data: {\"a\":1}\ndata: tail"]);
        assert_eq!(
            out,
            vec![
                "data: {\"a\":1}\n\n".to_string(),
                "data: {\"message\":\"tail\"}\n\n".to_string(),
            ]
        );
    }

    #[test]
    fn done_remainder_is_skipped() {
        assert!(decode_all(&[b"data: [DONE]"]).is_empty());
    }

    #[test]
    fn non_data_lines_are_discarded() {
        let out = decode_all(&[b"event: ping\nid: 7\n: comment\ndata: {\"ok\":true}\n"]);
        assert_eq!(out, vec!["data: {\"ok\":true}\n\n".to_string()]);
    }

    #[test]
    fn crlf_line_endings() {
        let out = decode_all(&[b"data: {\"a\":1}\r\n\r\ndata: [DONE]\r\n"]);
        assert_eq!(out, vec!["data: {\"a\":1}\n\n".to_string()]);
    }

    #[test]
    fn multibyte_character_split_across_reads() {
        let line = "data: {\"t\":\"caf\u{e9} \u{1f600}\"}\n".as_bytes();
        // Split inside the 4-byte emoji, which is followed by `"}\n`.
        let emoji_start = line.len() - 7;
        let out = decode_all(&[&line[..emoji_start + 2], &line[emoji_start + 2..]]);
        assert_eq!(out, vec!["data: {\"t\":\"caf\u{e9} \u{1f600}\"}\n\n".to_string()]);
    }

    #[test]
    fn oversized_line_is_dropped_and_stream_continues() {
        let mut decoder = FrameDecoder::with_max_line_len(16);
        let results = decoder.push(b"data: 0123456789abcdef\ndata: ok\n");
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(FrameError::Oversized { limit: 16, .. })));
        assert_eq!(results[1].as_ref().unwrap().to_json(), json!({"message": "ok"}));
    }

    #[test]
    fn oversized_partial_line_is_discarded_until_newline() {
        let mut decoder = FrameDecoder::with_max_line_len(8);
        let results = decoder.push(b"data: aaaaaaaa");
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
        assert!(decoder.pending().is_empty());

        assert!(decoder.push(b"bbbb").is_empty());
        let results = decoder.push(b"cc\ndata: 1\n");
        assert_eq!(frames(results), vec!["data: 1\n\n".to_string()]);
    }

    // -----------------------------------------------------------------------
    // Utf8Decoder
    // -----------------------------------------------------------------------

    #[test]
    fn utf8_decoder_carries_partial_sequence() {
        let bytes = "\u{e9}".as_bytes();
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(&bytes[..1]), "");
        assert_eq!(decoder.decode(&bytes[1..]), "\u{e9}");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn utf8_decoder_replaces_invalid_bytes() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{fffd}b");
    }

    #[test]
    fn utf8_decoder_flushes_truncated_sequence() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"ok\xe2\x82"), "ok");
        assert_eq!(decoder.finish(), "\u{fffd}");
    }
}
