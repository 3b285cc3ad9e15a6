//! Stream Reassembler Module
//!
//! Incremental line splitter and frame interpreter. Bytes can arrive in
//! arbitrary pieces; a line is only decoded once its terminating newline
//! has been seen, so split multibyte characters and split JSON objects are
//! both safe.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::stream::{FrameKind, StreamFrame};

// == Reassembler State ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassemblerState {
    /// Accepting frames
    Receiving,
    /// A completion frame was seen; trailing frames are still accepted
    Complete,
    /// An error frame was seen; further input is rejected
    Failed,
}

// == Stream Reassembler ==
#[derive(Debug)]
pub struct StreamReassembler {
    /// Bytes after the last newline seen so far
    buffer: Vec<u8>,
    /// Decoded payload chunks in arrival order
    chunks: Vec<Vec<u8>>,
    state: ReassemblerState,
    /// Usage reported by the completion frame
    usage: Option<serde_json::Value>,
    failure: Option<(i64, String)>,
}

impl Default for StreamReassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamReassembler {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            chunks: Vec::new(),
            state: ReassemblerState::Receiving,
            usage: None,
            failure: None,
        }
    }

    pub fn state(&self) -> ReassemblerState {
        self.state
    }

    pub fn usage(&self) -> Option<&serde_json::Value> {
        self.usage.as_ref()
    }

    /// Number of payload chunks collected so far.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    fn failure_error(&self) -> AppError {
        let (code, message) = self.failure.clone().unwrap_or_default();
        AppError::Synthesis { code, message }
    }

    // == Push ==
    /// Feeds a delivery of raw bytes, processing every complete line.
    ///
    /// Returns an error once an error frame has been seen.
    pub fn push(&mut self, bytes: &[u8]) -> Result<()> {
        if self.state == ReassemblerState::Failed {
            return Err(self.failure_error());
        }

        self.buffer.extend_from_slice(bytes);
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.process_line(&line[..line.len() - 1])?;
        }
        Ok(())
    }

    fn process_line(&mut self, line: &[u8]) -> Result<()> {
        let text = match std::str::from_utf8(line) {
            Ok(text) => text.trim(),
            Err(e) => {
                warn!("Skipping non-UTF-8 stream line: {}", e);
                return Ok(());
            }
        };
        if text.is_empty() {
            return Ok(());
        }

        let frame: StreamFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(_) => {
                warn!("Skipping unparseable stream line: {}", truncate(text, 100));
                return Ok(());
            }
        };

        match frame.kind() {
            FrameKind::Chunk(data) => match BASE64.decode(data) {
                Ok(chunk) => {
                    debug!("Received payload chunk: {} bytes", chunk.len());
                    self.chunks.push(chunk);
                }
                Err(e) => warn!("Skipping frame with invalid base64 payload: {}", e),
            },
            FrameKind::Complete => {
                info!("Stream completed");
                if let Some(usage) = &frame.usage {
                    debug!("Stream usage: {}", usage);
                }
                self.usage = frame.usage.clone();
                self.state = ReassemblerState::Complete;
            }
            FrameKind::Error { code, message } => {
                warn!("Stream error frame: {} - {}", code, message);
                self.failure = Some((code, message.to_string()));
                self.state = ReassemblerState::Failed;
                return Err(self.failure_error());
            }
            FrameKind::Ignored => {}
        }
        Ok(())
    }

    // == Finish ==
    /// Processes any trailing fragment and concatenates the collected chunks.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        if self.state == ReassemblerState::Failed {
            return Err(self.failure_error());
        }

        let rest = std::mem::take(&mut self.buffer);
        self.process_line(&rest)?;

        if self.chunks.is_empty() {
            return Err(AppError::NoDataProduced);
        }

        let payload = self.chunks.concat();
        info!(
            "Stream reassembled: {} chunks, {} bytes",
            self.chunks.len(),
            payload.len()
        );
        Ok(payload)
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// == Async Driver ==
/// Drives a [`StreamReassembler`] over a byte stream such as
/// `reqwest::Response::bytes_stream()`.
pub async fn reassemble<S, E>(stream: S) -> Result<Vec<u8>>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let mut reassembler = StreamReassembler::new();
    futures_util::pin_mut!(stream);

    while let Some(delivery) = stream.next().await {
        let bytes = delivery.map_err(|e| AppError::Network(e.to_string()))?;
        reassembler.push(&bytes)?;
    }
    reassembler.finish()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FRAME_A: &str = r#"{"code":0,"data":"QUJD"}"#; // "ABC"
    const FRAME_B: &str = r#"{"code":0,"data":"REVG"}"#; // "DEF"

    fn two_frames() -> String {
        format!("{}\n{}\n{{\"code\":20000000}}\n", FRAME_A, FRAME_B)
    }

    #[test]
    fn test_split_line_across_deliveries() {
        let mut r = StreamReassembler::new();
        r.push(br#"{"code":0,"da"#).unwrap();
        r.push(b"ta\":\"QUJD\"}\n{\"code\":0,").unwrap();
        r.push(b"\"data\":\"REVG\"}\n").unwrap();
        assert_eq!(r.chunk_count(), 2);
        assert_eq!(r.finish().unwrap(), b"ABCDEF");
    }

    #[test]
    fn test_completion_keeps_receiving() {
        let mut r = StreamReassembler::new();
        r.push(format!("{}\n{{\"code\":20000000,\"usage\":{{\"n\":1}}}}\n", FRAME_A).as_bytes())
            .unwrap();
        assert_eq!(r.state(), ReassemblerState::Complete);
        r.push(format!("{}\n", FRAME_B).as_bytes()).unwrap();
        assert_eq!(r.usage().unwrap()["n"], 1);
        assert_eq!(r.finish().unwrap(), b"ABCDEF");
    }

    #[test]
    fn test_error_frame_fails_with_message() {
        let mut r = StreamReassembler::new();
        r.push(format!("{}\n", FRAME_A).as_bytes()).unwrap();
        let err = r
            .push(b"{\"code\":55000001,\"message\":\"quota exceeded\"}\n")
            .unwrap_err();

        match err {
            AppError::Synthesis { code, message } => {
                assert_eq!(code, 55000001);
                assert_eq!(message, "quota exceeded");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(r.state(), ReassemblerState::Failed);
        assert!(r.push(FRAME_B.as_bytes()).is_err());
        assert!(r.finish().is_err());
    }

    #[test]
    fn test_no_chunks_fails() {
        let mut r = StreamReassembler::new();
        r.push(b"{\"code\":20000000}\n").unwrap();
        assert!(matches!(r.finish(), Err(AppError::NoDataProduced)));
    }

    #[test]
    fn test_garbage_lines_are_skipped() {
        let mut r = StreamReassembler::new();
        r.push(b"not json\n\n   \n{\"code\":0,\"data\":\"!!!\"}\n").unwrap();
        r.push(format!("{}\n", FRAME_A).as_bytes()).unwrap();
        assert_eq!(r.finish().unwrap(), b"ABC");
    }

    #[test]
    fn test_trailing_fragment_processed_on_finish() {
        let mut r = StreamReassembler::new();
        r.push(FRAME_A.as_bytes()).unwrap();
        assert_eq!(r.chunk_count(), 0);
        assert_eq!(r.finish().unwrap(), b"ABC");
    }

    #[test]
    fn test_multibyte_split_is_safe() {
        let line = "{\"code\":0,\"data\":\"QUJD\",\"message\":\"你好\"}\n";
        let bytes = line.as_bytes();
        // Split inside the three-byte encoding of the first CJK character
        let split = line.find('你').unwrap() + 1;
        let mut r = StreamReassembler::new();
        r.push(&bytes[..split]).unwrap();
        r.push(&bytes[split..]).unwrap();
        assert_eq!(r.finish().unwrap(), b"ABC");
    }

    #[tokio::test]
    async fn test_reassemble_stream() {
        let deliveries: Vec<std::result::Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(br#"{"code":0,"data":"QU"#)),
            Ok(Bytes::from_static(b"JD\"}\n{\"code\":0,\"data\":\"REVG\"}\n")),
        ];
        let out = reassemble(futures_util::stream::iter(deliveries)).await.unwrap();
        assert_eq!(out, b"ABCDEF");
    }

    #[tokio::test]
    async fn test_reassemble_transport_error() {
        let deliveries: Vec<std::result::Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"{\"code\":0,\"data\":\"QUJD\"}\n")),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let err = reassemble(futures_util::stream::iter(deliveries)).await.unwrap_err();
        assert!(matches!(err, AppError::Network(_)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        // Any split of the byte stream into three deliveries reassembles to A ‖ B.
        #[test]
        fn prop_three_way_split_preserves_bytes(a in 0usize..200, b in 0usize..200) {
            let input = two_frames();
            let bytes = input.as_bytes();
            let first = a.min(bytes.len());
            let second = (first + b).min(bytes.len());

            let mut r = StreamReassembler::new();
            r.push(&bytes[..first]).unwrap();
            r.push(&bytes[first..second]).unwrap();
            r.push(&bytes[second..]).unwrap();

            prop_assert_eq!(r.finish().unwrap(), b"ABCDEF".to_vec());
        }
    }
}
