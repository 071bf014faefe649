//! `%`-style formatting over safe templates.
//!
//! Supported directive grammar:
//!
//! ```text
//! '%' ['(' key ')'] flags* [width | '*'] ['.' (precision | '*')] [hlL] conversion
//! flags       = '-' | '+' | ' ' | '#' | '0'
//! conversion  = s r c d i u x X o e E f F g G %
//! ```
//!
//! Template literals are copied verbatim (they are markup already); every
//! argument is rendered through its deferred wrapper, so it is escaped
//! exactly once. Byte templates are assembled in the byte domain first and
//! redone in the text domain when a piece does not decode.

use std::borrow::Cow;
use std::ops::Range;

use memchr::memchr;
use tools::utf8;

use crate::bridge::{self, Assembler, EncodingFailed};
use crate::deferred::{FormatArg, FormatArgs, Wrapped};
use crate::error::{FormatError, LookupError, MarkupError, Result};
use crate::quote::Quoted;
use crate::safe::{Safe, SafeText};
use crate::value::{Key, Number};

pub(crate) fn format_text(template: &str, args: &FormatArgs) -> Result<SafeText> {
    let wrapped = args.wrap(true)?;
    render_text(template, &wrapped)
}

pub(crate) fn format_bytes(template: &[u8], args: &FormatArgs) -> Result<Safe> {
    let wrapped = args.wrap(false)?;
    let mut asm = Assembler::bytes(template.len() + 16);
    match render(Template::Bytes(template), &wrapped, &mut asm) {
        Ok(()) => Ok(asm.finish()),
        Err(FormatFailure::Error(err)) => Err(err),
        Err(FormatFailure::Encoding(failed)) => {
            bridge::log_escalation("format", failed);
            let template = utf8::decode_lossy(template);
            render_text(&template, &wrapped.into_text_flavor()).map(Safe::Text)
        }
    }
}

fn render_text(template: &str, args: &Wrapped) -> Result<SafeText> {
    let mut asm = Assembler::text(template.len() + 16);
    match render(Template::Text(template), args, &mut asm) {
        Ok(()) => Ok(asm.finish_text()),
        Err(FormatFailure::Error(err)) => Err(err),
        Err(FormatFailure::Encoding(failed)) => {
            unreachable!("text-domain assembly decodes lossily ({})", failed.failure)
        }
    }
}

#[derive(Debug)]
enum FormatFailure {
    Encoding(EncodingFailed),
    Error(MarkupError),
}

impl From<EncodingFailed> for FormatFailure {
    fn from(failed: EncodingFailed) -> Self {
        FormatFailure::Encoding(failed)
    }
}

impl From<MarkupError> for FormatFailure {
    fn from(err: MarkupError) -> Self {
        FormatFailure::Error(err)
    }
}

impl From<FormatError> for FormatFailure {
    fn from(err: FormatError) -> Self {
        FormatFailure::Error(err.into())
    }
}

impl From<LookupError> for FormatFailure {
    fn from(err: LookupError) -> Self {
        FormatFailure::Error(err.into())
    }
}

#[derive(Clone, Copy)]
enum Template<'a> {
    Text(&'a str),
    Bytes(&'a [u8]),
}

impl<'a> Template<'a> {
    fn is_text(&self) -> bool {
        matches!(self, Template::Text(_))
    }

    fn as_bytes(&self) -> &'a [u8] {
        match *self {
            Template::Text(s) => s.as_bytes(),
            Template::Bytes(b) => b,
        }
    }

    /// Ranges handed in start and end at ASCII bytes.
    fn push_literal(&self, asm: &mut Assembler, range: Range<usize>) -> Result<(), EncodingFailed> {
        if range.is_empty() {
            return Ok(());
        }
        match *self {
            Template::Text(s) => {
                asm.push_str(&s[range]);
                Ok(())
            }
            Template::Bytes(b) => asm.push_bytes(&b[range]),
        }
    }

    fn key(&self, range: Range<usize>) -> Result<Key, EncodingFailed> {
        match *self {
            Template::Text(s) => Ok(Key::Name(s[range].to_string())),
            Template::Bytes(b) => utf8::decode_strict(&b[range])
                .map(|k| Key::Name(k.to_string()))
                .map_err(|failure| EncodingFailed { failure }),
        }
    }

    fn char_at(&self, pos: usize) -> char {
        match *self {
            Template::Text(s) => s[pos..].chars().next().unwrap_or('\u{FFFD}'),
            Template::Bytes(b) => char::from(b[pos]),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Flags {
    left: bool,
    zero: bool,
    plus: bool,
    space: bool,
    alt: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Count {
    Fixed(usize),
    Star,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Directive {
    key: Option<Range<usize>>,
    flags: Flags,
    width: Option<Count>,
    precision: Option<Count>,
    conversion: u8,
    /// Offset of the conversion byte.
    conversion_at: usize,
    end: usize,
}

/// Parse the directive whose `%` sits at `start`.
fn parse_directive(bytes: &[u8], start: usize) -> Result<Directive, FormatError> {
    let incomplete = FormatError::IncompleteDirective { position: start };
    let mut pos = start + 1;

    let mut key = None;
    if bytes.get(pos) == Some(&b'(') {
        let mut depth = 1usize;
        let key_start = pos + 1;
        pos += 1;
        while depth > 0 {
            match bytes.get(pos) {
                None => return Err(incomplete),
                Some(b'(') => depth += 1,
                Some(b')') => depth -= 1,
                Some(_) => {}
            }
            pos += 1;
        }
        key = Some(key_start..pos - 1);
    }

    let mut flags = Flags::default();
    while let Some(&b) = bytes.get(pos) {
        match b {
            b'-' => flags.left = true,
            b'0' => flags.zero = true,
            b'+' => flags.plus = true,
            b' ' => flags.space = true,
            b'#' => flags.alt = true,
            _ => break,
        }
        pos += 1;
    }

    let width = parse_count(bytes, &mut pos, FormatError::WidthTooBig)?;
    let precision = if bytes.get(pos) == Some(&b'.') {
        pos += 1;
        Some(parse_count(bytes, &mut pos, FormatError::PrecisionTooBig)?.unwrap_or(Count::Fixed(0)))
    } else {
        None
    };

    while matches!(bytes.get(pos), Some(b'h' | b'l' | b'L')) {
        pos += 1;
    }

    let conversion = *bytes.get(pos).ok_or(incomplete)?;
    Ok(Directive {
        key,
        flags,
        width,
        precision,
        conversion,
        conversion_at: pos,
        end: pos + 1,
    })
}

/// Largest width or precision accepted. Stays under the `std::fmt`
/// precision ceiling (`u16::MAX`) with room for `%g`'s exponent adjustment.
const MAX_COUNT: usize = i16::MAX as usize;

fn parse_count(bytes: &[u8], pos: &mut usize, too_big: FormatError) -> Result<Option<Count>, FormatError> {
    if bytes.get(*pos) == Some(&b'*') {
        *pos += 1;
        return Ok(Some(Count::Star));
    }
    let mut value: Option<usize> = None;
    while let Some(&b) = bytes.get(*pos) {
        if !b.is_ascii_digit() {
            break;
        }
        let digit = usize::from(b - b'0');
        let next = value.unwrap_or(0) * 10 + digit;
        if next > MAX_COUNT {
            return Err(too_big);
        }
        value = Some(next);
        *pos += 1;
    }
    Ok(value.map(Count::Fixed))
}

fn checked_count(value: u64, too_big: FormatError) -> Result<usize, FormatError> {
    usize::try_from(value)
        .ok()
        .filter(|&v| v <= MAX_COUNT)
        .ok_or(too_big)
}

/// Positional and keyed access to the wrapped arguments.
struct ArgCursor<'a> {
    args: &'a Wrapped,
    next: usize,
}

impl<'a> ArgCursor<'a> {
    fn new(args: &'a Wrapped) -> Self {
        Self { args, next: 0 }
    }

    fn next(&mut self) -> Result<&'a FormatArg, FormatError> {
        let arg = match self.args {
            Wrapped::Single(arg) if self.next == 0 => Some(arg),
            Wrapped::Single(_) => None,
            Wrapped::Tuple(items) => items.get(self.next),
        };
        let arg = arg.ok_or(FormatError::NotEnoughArguments)?;
        self.next += 1;
        Ok(arg)
    }

    fn keyed(&self, key: &Key) -> Result<FormatArg, FormatFailure> {
        match self.args {
            Wrapped::Single(arg) if arg.is_mapping_like() => Ok(arg.get_item(key)?),
            _ => Err(FormatError::MappingRequired.into()),
        }
    }

    fn is_mapping(&self) -> bool {
        matches!(self.args, Wrapped::Single(arg) if arg.is_mapping_like())
    }

    fn finish(&self) -> Result<(), FormatError> {
        let total = match self.args {
            Wrapped::Single(_) => 1,
            Wrapped::Tuple(items) => items.len(),
        };
        if self.next < total && !self.is_mapping() {
            return Err(FormatError::NotAllConverted);
        }
        Ok(())
    }
}

fn render(template: Template<'_>, args: &Wrapped, asm: &mut Assembler) -> Result<(), FormatFailure> {
    let bytes = template.as_bytes();
    let mut cursor = ArgCursor::new(args);
    let mut pos = 0;
    while let Some(rel) = memchr(b'%', &bytes[pos..]) {
        let at = pos + rel;
        template.push_literal(asm, pos..at)?;
        let directive = parse_directive(bytes, at)?;
        pos = directive.end;
        if directive.conversion == b'%' {
            asm.push_ascii("%");
            continue;
        }
        render_directive(template, &directive, &mut cursor, asm)?;
    }
    template.push_literal(asm, pos..bytes.len())?;
    cursor.finish()?;
    Ok(())
}

fn render_directive(
    template: Template<'_>,
    directive: &Directive,
    cursor: &mut ArgCursor<'_>,
    asm: &mut Assembler,
) -> Result<(), FormatFailure> {
    let mut flags = directive.flags;
    let width = match directive.width {
        Some(Count::Fixed(w)) => Some(w),
        Some(Count::Star) => {
            let w = star_value(cursor.next()?)?;
            if w < 0 {
                flags.left = true;
            }
            Some(checked_count(w.unsigned_abs(), FormatError::WidthTooBig)?)
        }
        None => None,
    };
    let precision = match directive.precision {
        Some(Count::Fixed(p)) => Some(p),
        Some(Count::Star) => {
            let p = star_value(cursor.next()?)?.max(0).unsigned_abs();
            Some(checked_count(p, FormatError::PrecisionTooBig)?)
        }
        None => None,
    };

    let arg: Cow<'_, FormatArg> = match &directive.key {
        Some(range) => Cow::Owned(cursor.keyed(&template.key(range.clone())?)?),
        None => Cow::Borrowed(cursor.next()?),
    };

    let conversion = directive.conversion;
    let piece = match conversion {
        b's' => string_piece(arg.render_str()?, precision),
        b'r' => string_piece(arg.render_repr()?, precision),
        b'c' => Piece::from_quoted(arg.char_piece(template.is_text())?),
        b'd' | b'i' | b'u' => {
            let n = arg.number(char::from(conversion))?;
            let value = integral(n, conversion, false)?;
            Piece::Ascii(format_int(value, conversion, flags, precision, width))
        }
        b'x' | b'X' | b'o' => {
            let n = arg.number(char::from(conversion))?;
            let value = integral(n, conversion, true)?;
            Piece::Ascii(format_int(value, conversion, flags, precision, width))
        }
        b'e' | b'E' | b'f' | b'F' | b'g' | b'G' => {
            let n = arg.number(char::from(conversion))?;
            Piece::Ascii(format_float(n.as_f64(), conversion, flags, precision, width))
        }
        _ => {
            return Err(FormatError::UnsupportedConversion {
                conversion: template.char_at(directive.conversion_at),
                position: directive.conversion_at,
            }
            .into());
        }
    };

    log::trace!(target: "markup.format", "%{} -> {} bytes", char::from(conversion), piece.len());
    piece.push_padded(asm, width.unwrap_or(0), flags.left)?;
    Ok(())
}

fn star_value(arg: &FormatArg) -> Result<i64, FormatError> {
    match arg {
        FormatArg::Number(Number::Int(n)) => Ok(*n),
        _ => Err(FormatError::StarRequiresInt),
    }
}

fn integral(n: Number, conversion: u8, strict: bool) -> Result<i64, FormatError> {
    match n {
        Number::Int(i) => Ok(i),
        Number::Float(f) if !strict && f.is_finite() => Ok(n.truncate()),
        Number::Float(_) => Err(FormatError::IntegerRequired {
            conversion: char::from(conversion),
            found: "float".to_string(),
        }),
    }
}

/// Rendered argument, before width padding.
enum Piece {
    /// Numbers and padding: never change the result's flavor.
    Ascii(String),
    Text(String),
    Bytes(Vec<u8>),
}

impl Piece {
    fn from_quoted(quoted: Quoted) -> Piece {
        match quoted {
            Quoted::Number(n) => Piece::Ascii(n.to_string()),
            Quoted::Text(t) => Piece::Text(t.into_string()),
            Quoted::Bytes(b) => Piece::Bytes(b.into_bytes()),
        }
    }

    fn len(&self) -> usize {
        match self {
            Piece::Ascii(s) | Piece::Text(s) => s.len(),
            Piece::Bytes(b) => b.len(),
        }
    }

    /// Width is measured in characters for text and in bytes for bytes.
    fn display_width(&self) -> usize {
        match self {
            Piece::Ascii(s) => s.len(),
            Piece::Text(s) => s.chars().count(),
            Piece::Bytes(b) => b.len(),
        }
    }

    fn truncate(&mut self, precision: usize) {
        match self {
            Piece::Ascii(s) | Piece::Text(s) => {
                if let Some((idx, _)) = s.char_indices().nth(precision) {
                    s.truncate(idx);
                }
            }
            Piece::Bytes(b) => b.truncate(precision),
        }
    }

    fn push_padded(&self, asm: &mut Assembler, width: usize, left: bool) -> Result<(), EncodingFailed> {
        let pad = width.saturating_sub(self.display_width());
        if pad > 0 && !left {
            asm.push_ascii(&" ".repeat(pad));
        }
        match self {
            Piece::Ascii(s) => asm.push_ascii(s),
            Piece::Text(s) => asm.push_str(s),
            Piece::Bytes(b) => asm.push_bytes(b)?,
        }
        if pad > 0 && left {
            asm.push_ascii(&" ".repeat(pad));
        }
        Ok(())
    }
}

fn string_piece(quoted: Quoted, precision: Option<usize>) -> Piece {
    let mut piece = Piece::from_quoted(quoted);
    if let Some(p) = precision {
        piece.truncate(p);
    }
    piece
}

fn sign_of(negative: bool, flags: Flags) -> &'static str {
    if negative {
        "-"
    } else if flags.plus {
        "+"
    } else if flags.space {
        " "
    } else {
        ""
    }
}

/// Assemble sign, prefix and digits, zero-filling up to `width` when asked.
fn pad_numeric(sign: &str, prefix: &str, body: &str, flags: Flags, width: Option<usize>, zero_ok: bool) -> String {
    let len = sign.len() + prefix.len() + body.len();
    let fill = width.unwrap_or(0).saturating_sub(len);
    let mut out = String::with_capacity(len + fill);
    out.push_str(sign);
    out.push_str(prefix);
    if flags.zero && !flags.left && zero_ok {
        out.extend(std::iter::repeat_n('0', fill));
    }
    out.push_str(body);
    out
}

fn format_int(value: i64, conversion: u8, flags: Flags, precision: Option<usize>, width: Option<usize>) -> String {
    let magnitude = value.unsigned_abs();
    let mut digits = match conversion {
        b'x' => format!("{magnitude:x}"),
        b'X' => format!("{magnitude:X}"),
        b'o' => format!("{magnitude:o}"),
        _ => magnitude.to_string(),
    };
    if let Some(p) = precision {
        if digits.len() < p {
            digits.insert_str(0, &"0".repeat(p - digits.len()));
        }
    }
    let prefix = match conversion {
        b'x' if flags.alt => "0x",
        b'X' if flags.alt => "0X",
        b'o' if flags.alt => "0o",
        _ => "",
    };
    pad_numeric(sign_of(value < 0, flags), prefix, &digits, flags, width, true)
}

fn format_float(value: f64, conversion: u8, flags: Flags, precision: Option<usize>, width: Option<usize>) -> String {
    let upper = conversion.is_ascii_uppercase();
    let negative = value.is_sign_negative() && !value.is_nan();
    if !value.is_finite() {
        let body = match (value.is_nan(), upper) {
            (true, false) => "nan",
            (true, true) => "NAN",
            (false, false) => "inf",
            (false, true) => "INF",
        };
        return pad_numeric(sign_of(negative, flags), "", body, flags, width, false);
    }

    let magnitude = value.abs();
    let prec = precision.unwrap_or(6);
    let body = match conversion.to_ascii_lowercase() {
        b'f' => {
            let mut s = format!("{magnitude:.prec$}");
            if flags.alt && prec == 0 {
                s.push('.');
            }
            s
        }
        b'e' => {
            let s = format!("{magnitude:.prec$e}");
            let s = if flags.alt && prec == 0 { s.replacen('e', ".e", 1) } else { s };
            exponent_repr(&s, upper)
        }
        _ => general(magnitude, prec, flags.alt, upper),
    };
    pad_numeric(sign_of(negative, flags), "", &body, flags, width, true)
}

/// `%g`: fixed notation for moderate exponents, scientific otherwise,
/// trailing zeros removed unless `alt`.
fn general(magnitude: f64, precision: usize, alt: bool, upper: bool) -> String {
    let p = precision.max(1);
    let sci = format!("{magnitude:.*e}", p - 1);
    let exp: i64 = sci
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);
    let p_signed = i64::try_from(p).unwrap_or(i64::MAX);

    if (-4..p_signed).contains(&exp) {
        let fixed_prec = usize::try_from(p_signed - 1 - exp).unwrap_or(0);
        let s = format!("{magnitude:.fixed_prec$}");
        if alt { s } else { strip_fraction_zeros(&s).to_string() }
    } else {
        let (mantissa, exponent) = sci.split_once('e').unwrap_or((&sci, "0"));
        let mantissa = if alt { mantissa } else { strip_fraction_zeros(mantissa) };
        exponent_repr(&format!("{mantissa}e{exponent}"), upper)
    }
}

fn strip_fraction_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Rewrite Rust's `1.5e-7` exponent form as `1.5e-07` (`1.5E-07` when
/// `upper`): explicit sign, at least two digits.
pub(crate) fn exponent_repr(s: &str, upper: bool) -> String {
    let Some((mantissa, exponent)) = s.split_once(['e', 'E']) else {
        return s.to_string();
    };
    let (sign, digits) = match exponent.strip_prefix('-') {
        Some(d) => ('-', d),
        None => ('+', exponent.strip_prefix('+').unwrap_or(exponent)),
    };
    let marker = if upper { 'E' } else { 'e' };
    format!("{mantissa}{marker}{sign}{digits:0>2}")
}
