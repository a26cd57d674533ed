// 🔤 Encoding & Line Normalizer
// Raw bytes of unknown encoding → ordered text lines + a confidence flag

use encoding_rs::{DecoderResult, Encoding, EUC_JP, SHIFT_JIS, UTF_8};
use serde::{Deserialize, Serialize};

/// Candidate encodings, tried in order. SHIFT_JIS in encoding_rs is the
/// Windows-31J superset, so CP932 exports decode through it.
pub const CANDIDATE_ENCODINGS: [&Encoding; 3] = [UTF_8, SHIFT_JIS, EUC_JP];

/// Leading sample size used to accept a candidate (never below 1000 bytes)
pub const DEFAULT_SAMPLE_LEN: usize = 4096;
pub const MIN_SAMPLE_LEN: usize = 1000;

// ============================================================================
// TYPES
// ============================================================================

/// How trustworthy the decode was
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncodingConfidence {
    /// A candidate (or BOM) decoded without any substitution
    Detected,
    /// Lossy: undecodable bytes were replaced with U+FFFD
    Degraded,
}

/// DecodedText - the whole buffer, decoded and split into lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub encoding: &'static str,
    pub confidence: EncodingConfidence,
    pub lines: Vec<String>,
}

impl DecodedText {
    pub fn is_degraded(&self) -> bool {
        self.confidence == EncodingConfidence::Degraded
    }
}

// ============================================================================
// NORMALIZER
// ============================================================================

/// LineNormalizer - best-effort encoding detection
pub struct LineNormalizer {
    candidates: Vec<&'static Encoding>,
    sample_len: usize,
}

impl LineNormalizer {
    pub fn new() -> Self {
        LineNormalizer {
            candidates: CANDIDATE_ENCODINGS.to_vec(),
            sample_len: DEFAULT_SAMPLE_LEN,
        }
    }

    /// Builder pattern: custom sample length (clamped to the 1000-byte minimum)
    pub fn with_sample_len(mut self, sample_len: usize) -> Self {
        self.sample_len = sample_len.max(MIN_SAMPLE_LEN);
        self
    }

    /// Builder pattern: custom candidate order
    pub fn with_candidates(mut self, candidates: Vec<&'static Encoding>) -> Self {
        self.candidates = candidates;
        self
    }

    /// Pick an encoding for the buffer. None means no candidate accepted the sample.
    pub fn detect(&self, bytes: &[u8]) -> Option<&'static Encoding> {
        if let Some((encoding, _bom_len)) = Encoding::for_bom(bytes) {
            return Some(encoding);
        }

        let sample = &bytes[..bytes.len().min(self.sample_len)];
        let is_whole_buffer = sample.len() == bytes.len();

        self.candidates
            .iter()
            .copied()
            .find(|encoding| decodes_cleanly(encoding, sample, is_whole_buffer))
    }

    /// Decode the full buffer into lines
    pub fn normalize(&self, bytes: &[u8]) -> DecodedText {
        match self.detect(bytes) {
            Some(encoding) => {
                // decode() strips a BOM and falls back to lossy replacement past the sample
                let (text, actual, had_errors) = encoding.decode(bytes);
                DecodedText {
                    encoding: actual.name(),
                    confidence: if had_errors {
                        EncodingConfidence::Degraded
                    } else {
                        EncodingConfidence::Detected
                    },
                    lines: split_lines(&text),
                }
            }
            None => {
                tracing::warn!(
                    bytes = bytes.len(),
                    "No candidate encoding matched; decoding as lossy UTF-8"
                );
                let text = String::from_utf8_lossy(bytes);
                DecodedText {
                    encoding: UTF_8.name(),
                    confidence: EncodingConfidence::Degraded,
                    lines: split_lines(&text),
                }
            }
        }
    }
}

impl Default for LineNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience: normalize with the default candidate list
pub fn decode_lines(bytes: &[u8]) -> DecodedText {
    LineNormalizer::new().normalize(bytes)
}

/// Strict decode of a sample. A multi-byte sequence cut at the end of a partial
/// sample is held back by the decoder, not reported as malformed.
fn decodes_cleanly(encoding: &'static Encoding, sample: &[u8], last: bool) -> bool {
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let capacity = decoder
        .max_utf8_buffer_length_without_replacement(sample.len())
        .unwrap_or(sample.len() * 3 + 16);
    let mut out = String::with_capacity(capacity);

    let (result, _read) = decoder.decode_to_string_without_replacement(sample, &mut out, last);
    matches!(result, DecoderResult::InputEmpty)
}

fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(|line| line.to_string()).collect()
}

// ============================================================================
// TESTS
// ============================================================================
