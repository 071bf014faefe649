//! UTF-8 decoding policies for byte buffers that are promoted to text.
//!
//! Two policies are exposed:
//! - strict: the buffer must be valid UTF-8, otherwise the position of the
//!   first invalid sequence is reported;
//! - lossy: every maximal invalid subsequence becomes U+FFFD and decoding
//!   continues.
//!
//! `LossyDecoder` applies the lossy policy to a stream of byte chunks while
//! keeping multi-byte characters that straddle chunk boundaries intact.

use std::borrow::Cow;
use std::fmt;

pub const REPLACEMENT: char = '\u{FFFD}';

/// First invalid position reported by [`decode_strict`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Utf8Failure {
    pub valid_up_to: usize,
    /// Length of the offending sequence, `None` when the buffer ends inside
    /// an otherwise well-formed prefix.
    pub error_len: Option<usize>,
}

impl fmt::Display for Utf8Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error_len {
            Some(len) => write!(
                f,
                "invalid utf-8 sequence of {len} byte(s) at offset {}",
                self.valid_up_to
            ),
            None => write!(f, "truncated utf-8 sequence at offset {}", self.valid_up_to),
        }
    }
}

impl std::error::Error for Utf8Failure {}

pub fn decode_strict(bytes: &[u8]) -> Result<&str, Utf8Failure> {
    std::str::from_utf8(bytes).map_err(|e| Utf8Failure {
        valid_up_to: e.valid_up_to(),
        error_len: e.error_len(),
    })
}

/// Decode with replacement. Borrows when the input is already valid.
pub fn decode_lossy(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => {
            let mut out = String::with_capacity(bytes.len() + 2);
            let mut carry = Vec::new();
            push_lossy(&mut out, &mut carry, bytes);
            flush_carry(&mut out, &mut carry);
            Cow::Owned(out)
        }
    }
}

/// Owned variant of [`decode_lossy`], reusing the allocation when possible.
pub fn decode_lossy_owned(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(err) => decode_lossy(err.as_bytes()).into_owned(),
    }
}

/// Incremental lossy decoder for chunked byte input.
#[derive(Debug, Default)]
pub struct LossyDecoder {
    carry: Vec<u8>,
}

impl LossyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes held back because they may be the start of a character that
    /// continues in the next chunk (at most 3).
    pub fn pending(&self) -> &[u8] {
        &self.carry
    }

    pub fn push(&mut self, text: &mut String, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        if self.carry.is_empty() {
            push_lossy(text, &mut self.carry, bytes);
            return;
        }

        let mut rest = bytes;
        while !self.carry.is_empty() && !rest.is_empty() {
            let expected = sequence_len(self.carry[0]);
            if expected == 0 {
                text.push(REPLACEMENT);
                self.carry.clear();
                break;
            }
            // A short chunk is decoded too: bytes that cannot continue the
            // held sequence must not stay pending.
            let take = expected.saturating_sub(self.carry.len()).min(rest.len());
            let mut scratch = [0u8; 8];
            let held = self.carry.len();
            scratch[..held].copy_from_slice(&self.carry);
            scratch[held..held + take].copy_from_slice(&rest[..take]);
            self.carry.clear();
            push_lossy(text, &mut self.carry, &scratch[..held + take]);
            rest = &rest[take..];
        }

        if !rest.is_empty() {
            push_lossy(text, &mut self.carry, rest);
        }
    }

    /// Flush held-back bytes so a truncated tail still shows up as U+FFFD.
    pub fn finish(&mut self, text: &mut String) {
        flush_carry(text, &mut self.carry);
    }
}

fn sequence_len(first: u8) -> usize {
    match first {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

fn flush_carry(text: &mut String, carry: &mut Vec<u8>) {
    if carry.is_empty() {
        return;
    }
    text.push_str(&String::from_utf8_lossy(carry));
    carry.clear();
}

fn push_lossy(text: &mut String, carry: &mut Vec<u8>, mut bytes: &[u8]) {
    while !bytes.is_empty() {
        match std::str::from_utf8(bytes) {
            Ok(s) => {
                text.push_str(s);
                break;
            }
            Err(e) => {
                let (valid, after) = bytes.split_at(e.valid_up_to());
                if let Ok(prefix) = std::str::from_utf8(valid) {
                    text.push_str(prefix);
                }
                match e.error_len() {
                    Some(len) => {
                        text.push(REPLACEMENT);
                        bytes = &after[len..];
                    }
                    None => {
                        carry.extend_from_slice(after);
                        break;
                    }
                }
            }
        }
    }
}
