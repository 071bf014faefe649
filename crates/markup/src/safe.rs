//! Safe markup strings and their combination operators.
//!
//! Every operator quotes its other operand(s) before combining, so the
//! result is always safe markup again. Byte-flavored operators attempt the
//! byte domain first and redo the operation in the text domain when a piece
//! does not decode (see `bridge`).

use std::fmt;
use std::ops::{Add, Deref, Mul};

use tools::utf8;

use crate::bridge::{self, Assembler, EncodingFailed};
use crate::deferred::FormatArgs;
use crate::error::Result;
use crate::escape;
use crate::format;
use crate::quote::{Quoted, quote_with};
use crate::value::{Value, bytes_repr};

/// Text markup whose special characters are already neutralized.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SafeText(String);

/// Byte markup whose special characters are already neutralized.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SafeBytes(Vec<u8>);

/// Result of a combination whose flavor is only known at runtime.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Safe {
    Text(SafeText),
    Bytes(SafeBytes),
}

impl SafeText {
    /// Trust `markup` as already escaped.
    pub fn new(markup: impl Into<String>) -> Self {
        Self(markup.into())
    }

    pub(crate) fn from_escaped(s: String) -> Self {
        Self(s)
    }

    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// `self + other`, quoting `other` as text.
    pub fn concat(&self, other: impl Into<Value>) -> Result<SafeText> {
        let quoted = quote_with(other, true)?;
        Ok(self.concat_quoted(&quoted))
    }

    /// `other + self`.
    pub fn radd(&self, other: impl Into<Value>) -> Result<SafeText> {
        let quoted = quote_with(other, true)?;
        let mut asm = Assembler::text(self.0.len() + 16);
        asm.push_quoted_lossy(&quoted);
        asm.push_str(&self.0);
        Ok(asm.finish_text())
    }

    /// Join quoted `items` with `self` as separator.
    pub fn join<I>(&self, items: I) -> Result<SafeText>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let mut asm = Assembler::text(0);
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                asm.push_str(&self.0);
            }
            asm.push_quoted_lossy(&quote_with(item, true)?);
        }
        Ok(asm.finish_text())
    }

    pub fn repeat(&self, count: usize) -> SafeText {
        Self(self.0.repeat(count))
    }

    /// `self % args`. Arguments are escaped when they are rendered.
    pub fn format(&self, args: impl Into<FormatArgs>) -> Result<SafeText> {
        format::format_text(&self.0, &args.into())
    }

    fn concat_quoted(&self, quoted: &Quoted) -> SafeText {
        let mut asm = Assembler::text(self.0.len() + 16);
        asm.push_str(&self.0);
        asm.push_quoted_lossy(quoted);
        asm.finish_text()
    }
}

impl SafeBytes {
    /// Trust `markup` as already escaped.
    pub fn new(markup: impl Into<Vec<u8>>) -> Self {
        Self(markup.into())
    }

    pub(crate) fn from_escaped(b: Vec<u8>) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Lossy text view of this markup.
    pub fn to_text(&self) -> SafeText {
        bridge::promote(self.clone())
    }

    /// `self + other`. Stays byte-flavored when both sides decode strictly
    /// and neither is text; otherwise the result is text.
    pub fn concat(&self, other: impl Into<Value>) -> Result<Safe> {
        let quoted = quote_with(other, false)?;
        Ok(self.concat_quoted(&quoted))
    }

    /// `other + self`.
    pub fn radd(&self, other: impl Into<Value>) -> Result<Safe> {
        let quoted = quote_with(other, false)?;
        let attempt = (|| {
            let mut asm = Assembler::bytes(self.0.len() + 16);
            asm.push_quoted(&quoted)?;
            asm.push_bytes(&self.0)?;
            Ok::<_, EncodingFailed>(asm.finish())
        })();
        Ok(attempt.unwrap_or_else(|failed| {
            bridge::log_escalation("radd", failed);
            let mut asm = Assembler::text(self.0.len() + 16);
            asm.push_quoted_lossy(&quoted);
            asm.push_bytes_lossy(&self.0);
            Safe::Text(asm.finish_text())
        }))
    }

    pub fn join<I>(&self, items: I) -> Result<Safe>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let quoted = items
            .into_iter()
            .map(|item| quote_with(item, false))
            .collect::<Result<Vec<_>>>()?;

        let attempt = (|| {
            let mut asm = Assembler::bytes(0);
            for (i, piece) in quoted.iter().enumerate() {
                if i > 0 {
                    asm.push_bytes(&self.0)?;
                }
                asm.push_quoted(piece)?;
            }
            Ok::<_, EncodingFailed>(asm.finish())
        })();
        Ok(attempt.unwrap_or_else(|failed| {
            bridge::log_escalation("join", failed);
            let mut asm = Assembler::text(0);
            for (i, piece) in quoted.iter().enumerate() {
                if i > 0 {
                    asm.push_bytes_lossy(&self.0);
                }
                asm.push_quoted_lossy(piece);
            }
            Safe::Text(asm.finish_text())
        }))
    }

    /// Repeating raw bytes always stays byte-flavored.
    pub fn repeat(&self, count: usize) -> SafeBytes {
        Self(self.0.repeat(count))
    }

    /// `self % args`; redone in the text domain when a piece does not decode.
    pub fn format(&self, args: impl Into<FormatArgs>) -> Result<Safe> {
        format::format_bytes(&self.0, &args.into())
    }

    fn concat_quoted(&self, quoted: &Quoted) -> Safe {
        let attempt = (|| {
            let mut asm = Assembler::bytes(self.0.len() + 16);
            asm.push_bytes(&self.0)?;
            asm.push_quoted(quoted)?;
            Ok::<_, EncodingFailed>(asm.finish())
        })();
        attempt.unwrap_or_else(|failed| {
            bridge::log_escalation("concat", failed);
            let mut asm = Assembler::text(self.0.len() + 16);
            asm.push_bytes_lossy(&self.0);
            asm.push_quoted_lossy(quoted);
            Safe::Text(asm.finish_text())
        })
    }
}

impl Safe {
    pub fn is_text(&self) -> bool {
        matches!(self, Safe::Text(_))
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Safe::Text(t) => t.as_str().as_bytes(),
            Safe::Bytes(b) => b.as_bytes(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    pub fn into_text(self) -> SafeText {
        match self {
            Safe::Text(t) => t,
            Safe::Bytes(b) => bridge::promote(b),
        }
    }

    pub fn concat(&self, other: impl Into<Value>) -> Result<Safe> {
        match self {
            Safe::Text(t) => t.concat(other).map(Safe::Text),
            Safe::Bytes(b) => b.concat(other),
        }
    }

    pub fn join<I>(&self, items: I) -> Result<Safe>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        match self {
            Safe::Text(t) => t.join(items).map(Safe::Text),
            Safe::Bytes(b) => b.join(items),
        }
    }

    pub fn repeat(&self, count: usize) -> Safe {
        match self {
            Safe::Text(t) => Safe::Text(t.repeat(count)),
            Safe::Bytes(b) => Safe::Bytes(b.repeat(count)),
        }
    }

    pub fn format(&self, args: impl Into<FormatArgs>) -> Result<Safe> {
        match self {
            Safe::Text(t) => t.format(args).map(Safe::Text),
            Safe::Bytes(b) => b.format(args),
        }
    }
}

impl From<SafeText> for Safe {
    fn from(t: SafeText) -> Self {
        Safe::Text(t)
    }
}

impl From<SafeBytes> for Safe {
    fn from(b: SafeBytes) -> Self {
        Safe::Bytes(b)
    }
}

impl From<Safe> for Value {
    fn from(s: Safe) -> Self {
        match s {
            Safe::Text(t) => Value::SafeText(t),
            Safe::Bytes(b) => Value::SafeBytes(b),
        }
    }
}

impl Deref for SafeText {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SafeText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for SafeBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for SafeBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SafeText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SafeText({:?})", self.0)
    }
}

impl fmt::Debug for SafeBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SafeBytes({})", bytes_repr(&self.0))
    }
}

/// Renders the markup itself, not an escaped form of it.
impl fmt::Display for SafeText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for SafeBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&utf8::decode_lossy(&self.0))
    }
}

impl fmt::Display for Safe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Safe::Text(t) => t.fmt(f),
            Safe::Bytes(b) => b.fmt(f),
        }
    }
}

impl Add<&str> for SafeText {
    type Output = SafeText;

    fn add(self, rhs: &str) -> SafeText {
        let mut out = self.0;
        out.push_str(&escape::escape_text(rhs));
        SafeText(out)
    }
}

impl Add<&SafeText> for SafeText {
    type Output = SafeText;

    fn add(mut self, rhs: &SafeText) -> SafeText {
        self.0.push_str(&rhs.0);
        self
    }
}

impl Add<SafeText> for SafeText {
    type Output = SafeText;

    fn add(self, rhs: SafeText) -> SafeText {
        self + &rhs
    }
}

impl Add<&[u8]> for &SafeBytes {
    type Output = Safe;

    fn add(self, rhs: &[u8]) -> Safe {
        let escaped = SafeBytes(escape::escape_bytes(rhs).into_owned());
        self.concat_quoted(&Quoted::Bytes(escaped))
    }
}

impl Add<&SafeBytes> for &SafeBytes {
    type Output = Safe;

    fn add(self, rhs: &SafeBytes) -> Safe {
        self.concat_quoted(&Quoted::Bytes(rhs.clone()))
    }
}

impl Mul<usize> for &SafeText {
    type Output = SafeText;

    fn mul(self, count: usize) -> SafeText {
        self.repeat(count)
    }
}

impl Mul<usize> for &SafeBytes {
    type Output = SafeBytes;

    fn mul(self, count: usize) -> SafeBytes {
        self.repeat(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Number;

    #[test]
    fn concat_escapes_the_plain_operand() {
        let got = SafeText::new("Hi ").concat("O'Brien").unwrap();
        assert_eq!(got.as_str(), "Hi O&#39;Brien");
        assert_eq!((SafeText::new("Hi ") + "O'Brien").as_str(), "Hi O&#39;Brien");
    }

    #[test]
    fn concat_keeps_safe_operands_verbatim() {
        let got = SafeText::new("<p>").concat(SafeText::new("<b>")).unwrap();
        assert_eq!(got.as_str(), "<p><b>");
    }

    #[test]
    fn numbers_render_in_concat() {
        assert_eq!(SafeText::new("n=").concat(3).unwrap().as_str(), "n=3");
        assert_eq!(SafeText::new("x").radd(1.5).unwrap().as_str(), "1.5x");
        assert_eq!(
            SafeBytes::new(b"n=".to_vec()).concat(Number::Int(-2)).unwrap(),
            Safe::Bytes(SafeBytes::new(b"n=-2".to_vec()))
        );
    }

    #[test]
    fn radd_quotes_the_left_operand() {
        let got = SafeText::new("<br>").radd("a<b").unwrap();
        assert_eq!(got.as_str(), "a&lt;b<br>");
        let got = SafeBytes::new(b"<br>".to_vec()).radd(b"&".as_slice()).unwrap();
        assert_eq!(got, Safe::Bytes(SafeBytes::new(b"&amp;<br>".to_vec())));
    }

    #[test]
    fn join_quotes_every_item() {
        let got = SafeText::new("-").join(["<a>", "<b>"]).unwrap();
        assert_eq!(got.as_str(), "&lt;a&gt;-&lt;b&gt;");
        assert_eq!(SafeText::new(",").join(Vec::<Value>::new()).unwrap().as_str(), "");
    }

    #[test]
    fn byte_concat_stays_bytes_when_decodable() {
        let got = SafeBytes::new(b"<i>".to_vec()).concat(b"x&y").unwrap();
        assert_eq!(got, Safe::Bytes(SafeBytes::new(b"<i>x&amp;y".to_vec())));
    }

    #[test]
    fn byte_concat_escalates_on_undecodable_operand() {
        let got = SafeBytes::new(b"<i>".to_vec()).concat(b"caf\xE9").unwrap();
        assert_eq!(got, Safe::Text(SafeText::new("<i>caf\u{FFFD}")));
    }

    #[test]
    fn byte_concat_with_text_is_text() {
        let got = SafeBytes::new(b"a".to_vec()).concat("π<").unwrap();
        assert_eq!(got, Safe::Text(SafeText::new("aπ&lt;")));
    }

    #[test]
    fn undecodable_left_operand_escalates_too() {
        let got = SafeBytes::new(b"\xFF".to_vec()).concat(b"ok").unwrap();
        assert_eq!(got, Safe::Text(SafeText::new("\u{FFFD}ok")));
    }

    #[test]
    fn byte_join_escalates_and_promotes_separator() {
        let sep = SafeBytes::new(b"|".to_vec());
        let got = sep.join([b"a".as_slice(), b"\xFE<"]).unwrap();
        assert_eq!(got, Safe::Text(SafeText::new("a|\u{FFFD}&lt;")));

        let got = sep.join([b"a".as_slice(), b"b"]).unwrap();
        assert_eq!(got, Safe::Bytes(SafeBytes::new(b"a|b".to_vec())));
    }

    #[test]
    fn repeat_rewraps_in_same_flavor() {
        assert_eq!((&SafeText::new("&amp;") * 2).as_str(), "&amp;&amp;");
        assert_eq!(SafeBytes::new(b"ab".to_vec()).repeat(0), SafeBytes::new(Vec::new()));
        assert_eq!(
            Safe::Bytes(SafeBytes::new(b"x".to_vec())).repeat(3),
            Safe::Bytes(SafeBytes::new(b"xxx".to_vec()))
        );
    }

    #[test]
    fn operators_on_byte_markup() {
        let base = SafeBytes::new(b"<b>".to_vec());
        assert_eq!(&base + b"<".as_slice(), Safe::Bytes(SafeBytes::new(b"<b>&lt;".to_vec())));
        assert_eq!(&base + &base, Safe::Bytes(SafeBytes::new(b"<b><b>".to_vec())));
    }

    #[test]
    fn debug_and_display() {
        let t = SafeText::new("<b>");
        assert_eq!(format!("{t:?}"), "SafeText(\"<b>\")");
        assert_eq!(t.to_string(), "<b>");
        let b = SafeBytes::new(b"<\xFF>".to_vec());
        assert_eq!(format!("{b:?}"), "SafeBytes(b'<\\xff>')");
        assert_eq!(b.to_string(), "<\u{FFFD}>");
    }
}
