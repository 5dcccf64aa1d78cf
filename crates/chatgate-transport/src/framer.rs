// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The Stream Framer: splits a byte stream into SSE records (`data:
//! <json>\n\n`), tolerating `\n` splits across arbitrary chunk boundaries —
//! including mid-UTF-8-character splits, since `\n` (`0x0A`) can never
//! appear as a continuation or lead byte of a multi-byte UTF-8 sequence, so
//! buffering raw bytes until the next `\n` is always safe.
//!
//! Grounded on `sven-model::openai_compat::drain_complete_sse_lines`, but
//! buffering `Vec<u8>` rather than `String` so a chunk boundary landing
//! inside a multi-byte character never corrupts the line being assembled
//! (the teacher's `String::from_utf8_lossy`-per-chunk approach risks exactly
//! that, which spec §4.3 calls out as a requirement to avoid).

use std::sync::Arc;

use chatgate_cache::ObjectPool;
use serde_json::Value;

/// Reusable byte buffer for one in-flight stream's trailing partial line.
/// Checked out from the shared line-buffer pool for the stream's lifetime
/// and returned once it ends (normally or on cancellation/error).
pub struct StreamFramer {
    buf: Vec<u8>,
    pool: Arc<ObjectPool<Vec<u8>>>,
}

impl StreamFramer {
    pub async fn new(pool: Arc<ObjectPool<Vec<u8>>>) -> Self {
        let buf = pool.acquire().await;
        Self { buf, pool }
    }

    /// Feeds `chunk` into the buffer and returns every complete record
    /// decoded from it. A trailing partial line (no `\n` yet) stays in the
    /// buffer for the next call.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Value> {
        self.buf.extend_from_slice(chunk);
        let mut records = Vec::new();
        loop {
            let Some(pos) = self.buf.iter().position(|&b| b == b'\n') else { break };
            let line_bytes: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(value) = decode_line(line) {
                records.push(value);
            }
        }
        records
    }

    /// Returns the line buffer to the shared pool. Called on every exit
    /// path (stream end, upstream error, client cancellation) so the pool
    /// never leaks an in-flight buffer.
    pub async fn finish(self) {
        self.pool.release(self.buf).await;
    }
}

/// Decodes one complete line. Comment lines (`:...`), blank lines, and
/// lines not prefixed `data: ` are discarded per spec §4.3; an unparseable
/// JSON body is dropped rather than treated as fatal, matching the
/// teacher's `parse_sse_data_line`.
fn decode_line(line: &str) -> Option<Value> {
    let data = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:"))?;
    let data = data.trim();
    if data.is_empty() {
        return None;
    }
    match serde_json::from_str(data) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::trace!(error = %err, line = %data, "discarding unparseable SSE line");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatgate_cache::{AlwaysLow, LINE_BUFFER_CAPS};

    async fn framer() -> StreamFramer {
        let pool = Arc::new(ObjectPool::new(LINE_BUFFER_CAPS, Arc::new(AlwaysLow)));
        StreamFramer::new(pool).await
    }

    #[tokio::test]
    async fn decodes_a_single_complete_record() {
        let mut f = framer().await;
        let records = f.push(b"data: {\"a\":1}\n\n");
        assert_eq!(records, vec![serde_json::json!({"a": 1})]);
    }

    #[tokio::test]
    async fn buffers_a_partial_line_across_two_pushes() {
        let mut f = framer().await;
        assert!(f.push(b"data: {\"a\"").is_empty());
        let records = f.push(b":1}\n\n");
        assert_eq!(records, vec![serde_json::json!({"a": 1})]);
    }

    #[tokio::test]
    async fn split_multibyte_utf8_across_chunks_is_reassembled() {
        let mut f = framer().await;
        let payload = serde_json::json!({"text": "caf\u{e9}"}).to_string();
        let line = format!("data: {payload}\n");
        let bytes = line.as_bytes();
        // Split in the middle of the 2-byte UTF-8 encoding of 'é'.
        let split_at = bytes.len() - 2;
        assert!(f.push(&bytes[..split_at]).is_empty());
        let records = f.push(&bytes[split_at..]);
        assert_eq!(records, vec![serde_json::json!({"text": "café"})]);
    }

    #[tokio::test]
    async fn comment_and_blank_lines_are_discarded() {
        let mut f = framer().await;
        let records = f.push(b": heartbeat\n\ndata: {\"a\":2}\n\n");
        assert_eq!(records, vec![serde_json::json!({"a": 2})]);
    }

    #[tokio::test]
    async fn unparseable_json_is_dropped_not_fatal() {
        let mut f = framer().await;
        let records = f.push(b"data: not json\n\ndata: {\"ok\":true}\n\n");
        assert_eq!(records, vec![serde_json::json!({"ok": true})]);
    }

    #[tokio::test]
    async fn finish_returns_buffer_to_pool() {
        let pool = Arc::new(ObjectPool::new(LINE_BUFFER_CAPS, Arc::new(AlwaysLow)));
        let mut f = StreamFramer::new(pool.clone()).await;
        f.push(b"data: {}\n\n");
        f.finish().await;
        assert_eq!(pool.len().await, 1);
    }
}
