//! Byte → text fallback and the assembly buffer shared by all combinators.
//!
//! Byte-flavored markup is treated as strictly UTF-8 encoded text. A
//! byte-domain combination stays byte-flavored while every byte piece decodes
//! strictly, is promoted to text when a text piece joins it, and fails with
//! [`EncodingFailed`] as soon as a byte piece does not decode. The caller
//! then redoes the whole operation in the text domain with lossy decoding.

use tools::utf8::{self, Utf8Failure};

use crate::quote::Quoted;
use crate::safe::{Safe, SafeBytes, SafeText};

/// A byte-domain combination met a piece that does not decode strictly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct EncodingFailed {
    pub failure: Utf8Failure,
}

/// Lossy promotion of byte markup. Escaping is preserved: decoding never
/// introduces any of the five special characters.
pub fn promote(bytes: SafeBytes) -> SafeText {
    SafeText::from_escaped(utf8::decode_lossy_owned(bytes.into_bytes()))
}

/// Strict promotion; `None` when the bytes are not valid UTF-8.
pub fn promote_strict(bytes: &SafeBytes) -> Option<SafeText> {
    utf8::decode_strict(bytes.as_bytes())
        .ok()
        .map(|s| SafeText::from_escaped(s.to_string()))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Domain {
    /// Byte pieces are decoded lossily; never fails.
    Text,
    /// Byte pieces must decode strictly; `promoted` once a text piece lands.
    Bytes { promoted: bool },
}

/// Output buffer for concatenation, join and formatting.
///
/// Invariant: `buf` is valid UTF-8 at all times, in both domains.
#[derive(Debug)]
pub(crate) struct Assembler {
    buf: Vec<u8>,
    domain: Domain,
}

impl Assembler {
    pub(crate) fn text(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            domain: Domain::Text,
        }
    }

    pub(crate) fn bytes(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            domain: Domain::Bytes { promoted: false },
        }
    }

    pub(crate) fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), EncodingFailed> {
        match self.domain {
            Domain::Text => {
                self.buf
                    .extend_from_slice(utf8::decode_lossy(bytes).as_bytes());
                Ok(())
            }
            Domain::Bytes { .. } => {
                let s = utf8::decode_strict(bytes).map_err(|failure| EncodingFailed { failure })?;
                self.buf.extend_from_slice(s.as_bytes());
                Ok(())
            }
        }
    }

    pub(crate) fn push_str(&mut self, s: &str) {
        if let Domain::Bytes { promoted } = &mut self.domain {
            *promoted = true;
        }
        self.buf.extend_from_slice(s.as_bytes());
    }

    /// ASCII never changes the flavor of the result (numbers, padding).
    pub(crate) fn push_ascii(&mut self, s: &str) {
        debug_assert!(s.is_ascii());
        self.buf.extend_from_slice(s.as_bytes());
    }

    pub(crate) fn push_quoted(&mut self, quoted: &Quoted) -> Result<(), EncodingFailed> {
        match quoted {
            Quoted::Number(n) => {
                self.push_ascii(&n.to_string());
                Ok(())
            }
            Quoted::Text(t) => {
                self.push_str(t.as_str());
                Ok(())
            }
            Quoted::Bytes(b) => self.push_bytes(b.as_bytes()),
        }
    }

    pub(crate) fn push_bytes_lossy(&mut self, bytes: &[u8]) {
        self.push_str(&utf8::decode_lossy(bytes));
    }

    /// Text-domain push: byte pieces are decoded lossily whatever the domain.
    pub(crate) fn push_quoted_lossy(&mut self, quoted: &Quoted) {
        match quoted {
            Quoted::Number(n) => self.push_ascii(&n.to_string()),
            Quoted::Text(t) => self.push_str(t.as_str()),
            Quoted::Bytes(b) => self.push_bytes_lossy(b.as_bytes()),
        }
    }

    pub(crate) fn finish(self) -> Safe {
        match self.domain {
            Domain::Bytes { promoted: false } => Safe::Bytes(SafeBytes::from_escaped(self.buf)),
            Domain::Text | Domain::Bytes { promoted: true } => {
                Safe::Text(SafeText::from_escaped(utf8::decode_lossy_owned(self.buf)))
            }
        }
    }

    pub(crate) fn finish_text(self) -> SafeText {
        SafeText::from_escaped(utf8::decode_lossy_owned(self.buf))
    }
}

pub(crate) fn log_escalation(op: &'static str, failed: EncodingFailed) {
    log::debug!(
        target: "markup.combine",
        "{op}: byte-domain result does not decode ({}); retrying in text domain",
        failed.failure
    );
    crate::stats::record_escalation();
}
