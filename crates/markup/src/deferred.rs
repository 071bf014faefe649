//! Format arguments whose escaping is deferred until they are rendered.
//!
//! `wrap` prepares one argument of a `%` call:
//! - numbers pass through, the format primitive renders them;
//! - strings are escaped now but keep their original value for `%r`;
//! - everything else becomes a [`Deferred`] that is quoted only when the
//!   primitive renders it, and whose subscripts are wrapped again.

use crate::bridge;
use crate::error::{FormatError, LookupError, Result};
use crate::host::{self, HostBindings};
use crate::quote::{Quoted, quote_with};
use crate::safe::{SafeBytes, SafeText};
use crate::value::{Key, Number, Value};

#[derive(Clone, Debug, PartialEq)]
pub enum FormatArg {
    Number(Number),
    Deferred(Deferred),
    Text(TextArg),
    Bytes(BytesArg),
}

/// A value whose quoting waits for the format primitive.
#[derive(Clone, Debug, PartialEq)]
pub struct Deferred {
    value: Value,
    prefer_text: bool,
}

/// Escaped text plus the value it was escaped from.
#[derive(Clone, Debug, PartialEq)]
pub struct TextArg {
    escaped: SafeText,
    original: Value,
}

/// Escaped bytes plus the value they were escaped from. Built by the
/// installed [`ByteWrapperClass`](crate::host::ByteWrapperClass).
#[derive(Clone, Debug, PartialEq)]
pub struct BytesArg {
    escaped: SafeBytes,
    original: Value,
}

impl TextArg {
    pub fn escaped(&self) -> &SafeText {
        &self.escaped
    }

    pub fn original(&self) -> &Value {
        &self.original
    }
}

impl BytesArg {
    pub fn new(escaped: SafeBytes, original: Value) -> Self {
        Self { escaped, original }
    }

    pub fn escaped(&self) -> &SafeBytes {
        &self.escaped
    }

    pub fn original(&self) -> &Value {
        &self.original
    }
}

impl Deferred {
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn prefer_text(&self) -> bool {
        self.prefer_text
    }
}

/// Wrap with `prefer_text` inferred like [`quote`](crate::quote::quote).
pub fn wrap(value: impl Into<Value>) -> Result<FormatArg> {
    let value = value.into();
    let prefer_text = value.is_text_flavored();
    wrap_with(value, prefer_text)
}

pub fn wrap_with(value: impl Into<Value>, prefer_text: bool) -> Result<FormatArg> {
    wrap_in(host::bindings(), value.into(), prefer_text)
}

/// Wrap against explicit host bindings rather than the installed ones.
pub fn wrap_in(bindings: &HostBindings, value: Value, prefer_text: bool) -> Result<FormatArg> {
    match value {
        Value::Number(n) => Ok(FormatArg::Number(n)),
        v if !v.is_string() => {
            log::trace!(target: "markup.quote", "deferring {} (prefer_text={prefer_text})", v.type_name());
            Ok(FormatArg::Deferred(Deferred {
                value: v,
                prefer_text,
            }))
        }
        original => match quote_with(original.clone(), prefer_text)? {
            Quoted::Text(escaped) => Ok(FormatArg::Text(TextArg { escaped, original })),
            Quoted::Bytes(escaped) => {
                let class = bindings.byte_wrapper_class()?;
                Ok(FormatArg::Bytes(class.construct(escaped, original)?))
            }
            Quoted::Number(n) => Ok(FormatArg::Number(n)),
        },
    }
}

impl FormatArg {
    /// Formatted view: the escaped content.
    pub fn render_str(&self) -> Result<Quoted> {
        match self {
            FormatArg::Number(n) => Ok(Quoted::Number(*n)),
            FormatArg::Deferred(d) => quote_with(d.value.clone(), d.prefer_text),
            FormatArg::Text(t) => Ok(Quoted::Text(t.escaped.clone())),
            FormatArg::Bytes(b) => Ok(Quoted::Bytes(b.escaped.clone())),
        }
    }

    /// Diagnostic view: the representation of the original value, escaped
    /// when embedded.
    pub fn render_repr(&self) -> Result<Quoted> {
        let (repr, prefer_text) = match self {
            FormatArg::Number(n) => return Ok(Quoted::Number(*n)),
            FormatArg::Deferred(d) => (d.value.repr(), d.prefer_text),
            FormatArg::Text(t) => (t.original.repr(), true),
            FormatArg::Bytes(b) => (b.original.repr(), false),
        };
        quote_with(Value::Bytes(repr.into_bytes()), prefer_text)
    }

    /// Subscript the wrapped value; the element is wrapped again with the
    /// same flavor preference.
    pub fn get_item(&self, key: &Key) -> Result<FormatArg> {
        self.get_item_in(host::bindings(), key)
    }

    pub fn get_item_in(&self, bindings: &HostBindings, key: &Key) -> Result<FormatArg> {
        let (value, prefer_text) = match self {
            FormatArg::Number(n) => {
                return Err(LookupError::NotSubscriptable {
                    type_name: n.type_name().to_string(),
                }
                .into());
            }
            FormatArg::Deferred(d) => (&d.value, d.prefer_text),
            FormatArg::Text(t) => (&t.original, true),
            FormatArg::Bytes(b) => (&b.original, false),
        };
        let item = value.get_item(key)?;
        log::trace!(target: "markup.format", "subscripted {} with {key}", value.type_name());
        wrap_in(bindings, item, prefer_text)
    }

    /// Numeric value for `%d`-style conversions.
    pub(crate) fn number(&self, conversion: char) -> std::result::Result<Number, FormatError> {
        match self {
            FormatArg::Number(n) => Ok(*n),
            other => Err(FormatError::NumberRequired {
                conversion,
                found: other.type_name(),
            }),
        }
    }

    /// Single character for `%c`, already escaped. A code point becomes
    /// text or UTF-8 bytes following the template's flavor.
    pub(crate) fn char_piece(&self, prefer_text: bool) -> std::result::Result<Quoted, FormatError> {
        match self {
            FormatArg::Number(Number::Int(code)) => {
                let ch = u32::try_from(*code)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or(FormatError::CharRequired)?;
                let mut buf = [0u8; 4];
                let encoded = ch.encode_utf8(&mut buf);
                Ok(if prefer_text {
                    Quoted::Text(crate::quote::quote_text(encoded))
                } else {
                    let escaped = crate::escape::escape_bytes(encoded.as_bytes()).into_owned();
                    Quoted::Bytes(SafeBytes::from_escaped(escaped))
                })
            }
            FormatArg::Text(t) if is_single_char(&t.original) => Ok(Quoted::Text(t.escaped.clone())),
            FormatArg::Bytes(b) if is_single_char(&b.original) => Ok(Quoted::Bytes(b.escaped.clone())),
            _ => Err(FormatError::CharRequired),
        }
    }

    /// Keyed lookups are allowed when the single argument is a container
    /// or object.
    pub(crate) fn is_mapping_like(&self) -> bool {
        matches!(self, FormatArg::Deferred(_))
    }

    /// Text-domain equivalent used when a byte-domain format is redone.
    pub(crate) fn into_text_flavor(self) -> FormatArg {
        match self {
            FormatArg::Deferred(d) => FormatArg::Deferred(Deferred {
                prefer_text: true,
                ..d
            }),
            FormatArg::Bytes(b) => FormatArg::Text(TextArg {
                escaped: bridge::promote(b.escaped),
                original: b.original,
            }),
            other => other,
        }
    }

    pub(crate) fn type_name(&self) -> String {
        match self {
            FormatArg::Number(n) => n.type_name().to_string(),
            FormatArg::Deferred(d) => d.value.type_name(),
            FormatArg::Text(t) => t.original.type_name(),
            FormatArg::Bytes(b) => b.original.type_name(),
        }
    }
}

fn is_single_char(v: &Value) -> bool {
    match v {
        Value::Text(s) => s.chars().count() == 1,
        Value::SafeText(t) => t.as_str().chars().count() == 1,
        Value::Bytes(b) => b.len() == 1,
        Value::SafeBytes(b) => b.as_bytes().len() == 1,
        _ => false,
    }
}

/// The right-hand side of `%`: one value, or a tuple of positional values.
#[derive(Clone, Debug, PartialEq)]
pub enum FormatArgs {
    Single(Value),
    Tuple(Vec<Value>),
}

impl FormatArgs {
    pub fn tuple<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        FormatArgs::Tuple(items.into_iter().map(Into::into).collect())
    }

    /// Wrap every argument element-wise, preserving positional order.
    pub(crate) fn wrap(&self, prefer_text: bool) -> Result<Wrapped> {
        let bindings = host::bindings();
        Ok(match self {
            FormatArgs::Single(v) => Wrapped::Single(wrap_in(bindings, v.clone(), prefer_text)?),
            FormatArgs::Tuple(items) => Wrapped::Tuple(
                items
                    .iter()
                    .map(|v| wrap_in(bindings, v.clone(), prefer_text))
                    .collect::<Result<_>>()?,
            ),
        })
    }
}

/// Arguments after wrapping.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Wrapped {
    Single(FormatArg),
    Tuple(Vec<FormatArg>),
}

impl Wrapped {
    pub(crate) fn into_text_flavor(self) -> Wrapped {
        match self {
            Wrapped::Single(arg) => Wrapped::Single(arg.into_text_flavor()),
            Wrapped::Tuple(args) => {
                Wrapped::Tuple(args.into_iter().map(FormatArg::into_text_flavor).collect())
            }
        }
    }
}

impl From<Value> for FormatArgs {
    fn from(v: Value) -> Self {
        FormatArgs::Single(v)
    }
}

macro_rules! single_format_arg {
    ($($t:ty),* $(,)?) => {
        $(impl From<$t> for FormatArgs {
            fn from(v: $t) -> Self {
                FormatArgs::Single(Value::from(v))
            }
        })*
    };
}

single_format_arg!(
    i8, i16, i32, i64, u8, u16, u32, f32, f64, Number,
    &str, String, &String, &[u8], Vec<u8>,
    SafeText, &SafeText, SafeBytes, &SafeBytes,
    Vec<Value>,
);

impl<const N: usize> From<&[u8; N]> for FormatArgs {
    fn from(b: &[u8; N]) -> Self {
        FormatArgs::Single(Value::from(b))
    }
}

impl From<()> for FormatArgs {
    fn from(_: ()) -> Self {
        FormatArgs::Tuple(Vec::new())
    }
}

macro_rules! tuple_format_args {
    ($($name:ident),+) => {
        impl<$($name: Into<Value>),+> From<($($name,)+)> for FormatArgs {
            #[allow(non_snake_case)]
            fn from(($($name,)+): ($($name,)+)) -> Self {
                FormatArgs::Tuple(vec![$($name.into()),+])
            }
        }
    };
}

tuple_format_args!(A);
tuple_format_args!(A, B);
tuple_format_args!(A, B, C);
tuple_format_args!(A, B, C, D);
tuple_format_args!(A, B, C, D, E);
tuple_format_args!(A, B, C, D, E, F);
tuple_format_args!(A, B, C, D, E, F, G);
tuple_format_args!(A, B, C, D, E, F, G, H);
