//! Values arriving at the quoting boundary.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{LookupError, MarkupError, StringifyError};
use crate::safe::{SafeBytes, SafeText};

/// Numbers are never escaped; they are only rendered when stringified.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    /// Truncates toward zero; NaN and infinities saturate like `as` casts.
    pub fn truncate(self) -> i64 {
        match self {
            Number::Int(i) => i,
            Number::Float(f) => f as i64,
        }
    }

    pub fn type_name(self) -> &'static str {
        match self {
            Number::Int(_) => "int",
            Number::Float(_) => "float",
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Float(v) => f.write_str(&float_repr(v)),
        }
    }
}

/// Host-style float rendering: always shows a fractional part or exponent.
fn float_repr(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let magnitude = v.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        return crate::format::exponent_repr(&format!("{v:e}"), false);
    }
    let s = format!("{v}");
    if s.contains('.') { s } else { format!("{s}.0") }
}

/// Result of stringifying a value that is not already a string.
#[derive(Clone, Debug, PartialEq)]
pub enum Stringified {
    Text(String),
    Bytes(Vec<u8>),
    SafeText(SafeText),
    SafeBytes(SafeBytes),
}

impl From<Stringified> for Value {
    fn from(s: Stringified) -> Self {
        match s {
            Stringified::Text(t) => Value::Text(t),
            Stringified::Bytes(b) => Value::Bytes(b),
            Stringified::SafeText(t) => Value::SafeText(t),
            Stringified::SafeBytes(b) => Value::SafeBytes(b),
        }
    }
}

/// Capability interface for arbitrary objects substituted into templates.
///
/// `to_text` is the preferred conversion when present. Objects without it
/// fall back to `to_str`, which by default renders the `Debug` form as bytes.
/// Either conversion may return already-safe markup, which the quoter then
/// passes through.
pub trait HostObject: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &str {
        "object"
    }

    fn to_text(&self) -> Option<Result<Stringified, StringifyError>> {
        None
    }

    fn to_str(&self) -> Result<Stringified, StringifyError> {
        Ok(Stringified::Bytes(format!("{self:?}").into_bytes()))
    }

    fn repr(&self) -> String {
        format!("{self:?}")
    }

    fn get_item(&self, key: &Key) -> Result<Value, LookupError> {
        let _ = key;
        Err(LookupError::NotSubscriptable {
            type_name: self.type_name().to_string(),
        })
    }
}

/// Subscript used by format mapping keys and deferred-wrapper indexing.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Index(i64),
    Name(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{i}"),
            Key::Name(n) => f.write_str(&text_repr(n)),
        }
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Index(i)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Name(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Name(s)
    }
}

#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    None,
    Number(Number),
    Text(String),
    Bytes(Vec<u8>),
    SafeText(SafeText),
    SafeBytes(SafeBytes),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Object(Arc<dyn HostObject>),
}

impl Value {
    pub fn object(obj: impl HostObject + 'static) -> Self {
        Value::Object(Arc::new(obj))
    }

    pub fn list<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    pub fn map<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::None => "NoneType".to_string(),
            Value::Number(n) => n.type_name().to_string(),
            Value::Text(_) => "str".to_string(),
            Value::Bytes(_) => "bytes".to_string(),
            Value::SafeText(_) => "SafeText".to_string(),
            Value::SafeBytes(_) => "SafeBytes".to_string(),
            Value::List(_) => "list".to_string(),
            Value::Map(_) => "dict".to_string(),
            Value::Object(obj) => obj.type_name().to_string(),
        }
    }

    pub fn is_string(&self) -> bool {
        matches!(
            self,
            Value::Text(_) | Value::Bytes(_) | Value::SafeText(_) | Value::SafeBytes(_)
        )
    }

    /// Text-flavored strings are the ones quoted with `prefer_text` by default.
    pub fn is_text_flavored(&self) -> bool {
        matches!(self, Value::Text(_) | Value::SafeText(_))
    }

    /// Convert to a string without escaping. Strings pass through; objects use
    /// their text conversion when they have one, otherwise the generic one.
    pub fn stringify(self) -> Result<Stringified, MarkupError> {
        Ok(match self {
            Value::Text(s) => Stringified::Text(s),
            Value::Bytes(b) => Stringified::Bytes(b),
            Value::SafeText(t) => Stringified::SafeText(t),
            Value::SafeBytes(b) => Stringified::SafeBytes(b),
            Value::Number(n) => Stringified::Bytes(n.to_string().into_bytes()),
            Value::None => Stringified::Bytes(b"None".to_vec()),
            v @ (Value::List(_) | Value::Map(_)) => Stringified::Bytes(v.repr().into_bytes()),
            Value::Object(obj) => match obj.to_text() {
                Some(text) => text?,
                None => obj.to_str()?,
            },
        })
    }

    /// Diagnostic representation in the host's style.
    pub fn repr(&self) -> String {
        match self {
            Value::None => "None".to_string(),
            Value::Number(n) => n.to_string(),
            Value::Text(s) => text_repr(s),
            Value::Bytes(b) => bytes_repr(b),
            Value::SafeText(t) => format!("SafeText({})", text_repr(t.as_str())),
            Value::SafeBytes(b) => format!("SafeBytes({})", bytes_repr(b.as_bytes())),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::repr).collect();
                format!("[{}]", inner.join(", "))
            }
            Value::Map(entries) => {
                let inner: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", text_repr(k), v.repr()))
                    .collect();
                format!("{{{}}}", inner.join(", "))
            }
            Value::Object(obj) => obj.repr(),
        }
    }

    /// Subscript this value. Slicing a safe string yields a plain string:
    /// a fragment of markup is not necessarily markup.
    pub fn get_item(&self, key: &Key) -> Result<Value, LookupError> {
        match (self, key) {
            (Value::List(items), Key::Index(i)) => {
                let at = resolve_index(*i, items.len())?;
                Ok(items[at].clone())
            }
            (Value::Map(entries), key) => {
                let name = match key {
                    Key::Name(n) => n.clone(),
                    Key::Index(i) => i.to_string(),
                };
                entries
                    .get(&name)
                    .cloned()
                    .ok_or(LookupError::MissingKey(name))
            }
            (Value::Text(s), Key::Index(i)) => char_at(s, *i),
            (Value::SafeText(t), Key::Index(i)) => char_at(t.as_str(), *i),
            (Value::Bytes(b), Key::Index(i)) => byte_at(b, *i),
            (Value::SafeBytes(b), Key::Index(i)) => byte_at(b.as_bytes(), *i),
            (Value::Object(obj), key) => obj.get_item(key),
            (Value::None | Value::Number(_), _) => Err(LookupError::NotSubscriptable {
                type_name: self.type_name(),
            }),
            (_, key) => Err(LookupError::BadKey {
                type_name: self.type_name(),
                key: key.to_string(),
            }),
        }
    }

    /// Containers and objects behave like mappings for `%(name)s` lookups.
    pub fn is_mapping_like(&self) -> bool {
        matches!(self, Value::List(_) | Value::Map(_) | Value::Object(_))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::SafeText(a), Value::SafeText(b)) => a == b,
            (Value::SafeBytes(a), Value::SafeBytes(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

fn resolve_index(index: i64, len: usize) -> Result<usize, LookupError> {
    let resolved = if index < 0 {
        i64::try_from(len).ok().map(|l| l + index)
    } else {
        Some(index)
    };
    resolved
        .and_then(|i| usize::try_from(i).ok())
        .filter(|&i| i < len)
        .ok_or(LookupError::IndexOutOfRange { index, len })
}

fn char_at(s: &str, index: i64) -> Result<Value, LookupError> {
    let len = s.chars().count();
    let at = resolve_index(index, len)?;
    let ch = s.chars().nth(at).ok_or(LookupError::IndexOutOfRange { index, len })?;
    Ok(Value::Text(ch.to_string()))
}

fn byte_at(b: &[u8], index: i64) -> Result<Value, LookupError> {
    let at = resolve_index(index, b.len())?;
    Ok(Value::Bytes(vec![b[at]]))
}

pub(crate) fn text_repr(s: &str) -> String {
    let quote = pick_quote(s.contains('\''), s.contains('"'));
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7F => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

pub(crate) fn bytes_repr(b: &[u8]) -> String {
    let quote = pick_quote(b.contains(&b'\''), b.contains(&b'"'));
    let mut out = String::with_capacity(b.len() + 3);
    out.push('b');
    out.push(quote);
    for &byte in b {
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            c if c as char == quote => {
                out.push('\\');
                out.push(quote);
            }
            0x20..=0x7E => out.push(byte as char),
            _ => out.push_str(&format!("\\x{byte:02x}")),
        }
    }
    out.push(quote);
    out
}

fn pick_quote(has_single: bool, has_double: bool) -> char {
    if has_single && !has_double { '"' } else { '\'' }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

macro_rules! int_into_value {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(i: $t) -> Self {
                Value::Number(Number::Int(i64::from(i)))
            }
        })*
    };
}

int_into_value!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Number(Number::Float(f64::from(f)))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Number(Number::Float(f))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Text(s.clone())
    }
}

impl From<&[u8]> for Value {
    fn from(b: &[u8]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for Value {
    fn from(b: &[u8; N]) -> Self {
        Value::Bytes(b.to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<SafeText> for Value {
    fn from(t: SafeText) -> Self {
        Value::SafeText(t)
    }
}

impl From<&SafeText> for Value {
    fn from(t: &SafeText) -> Self {
        Value::SafeText(t.clone())
    }
}

impl From<SafeBytes> for Value {
    fn from(b: SafeBytes) -> Self {
        Value::SafeBytes(b)
    }
}

impl From<&SafeBytes> for Value {
    fn from(b: &SafeBytes) -> Self {
        Value::SafeBytes(b.clone())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Value::Map(entries)
    }
}

impl From<Arc<dyn HostObject>> for Value {
    fn from(obj: Arc<dyn HostObject>) -> Self {
        Value::Object(obj)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::None, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Point(i32, i32);

    impl HostObject for Point {
        fn type_name(&self) -> &str {
            "Point"
        }
    }

    #[derive(Debug)]
    struct Named;

    impl HostObject for Named {
        fn to_text(&self) -> Option<Result<Stringified, StringifyError>> {
            Some(Ok(Stringified::Text("named <text>".to_string())))
        }
    }

    #[test]
    fn numbers_render_host_style() {
        assert_eq!(Number::Int(-42).to_string(), "-42");
        assert_eq!(Number::Float(3.0).to_string(), "3.0");
        assert_eq!(Number::Float(0.5).to_string(), "0.5");
        assert_eq!(Number::Float(1e20).to_string(), "1e+20");
        assert_eq!(Number::Float(1.5e-7).to_string(), "1.5e-07");
        assert_eq!(Number::Float(f64::INFINITY).to_string(), "inf");
        assert_eq!(Number::Float(f64::NAN).to_string(), "nan");
    }

    #[test]
    fn reprs_follow_host_quoting() {
        assert_eq!(Value::from("a'b").repr(), "\"a'b\"");
        assert_eq!(Value::from("a\nb").repr(), "'a\\nb'");
        assert_eq!(Value::from(b"\xFFok").repr(), "b'\\xffok'");
        assert_eq!(Value::list([1, 2]).repr(), "[1, 2]");
        assert_eq!(
            Value::map([("k", Value::from("v"))]).repr(),
            "{'k': 'v'}"
        );
        assert_eq!(Value::from(SafeText::new("<b>")).repr(), "SafeText('<b>')");
        assert_eq!(Value::None.repr(), "None");
    }

    #[test]
    fn stringify_prefers_text_conversion() {
        let got = Value::object(Named).stringify().unwrap();
        assert_eq!(got, Stringified::Text("named <text>".to_string()));

        let got = Value::object(Point(1, 2)).stringify().unwrap();
        assert_eq!(got, Stringified::Bytes(b"Point(1, 2)".to_vec()));
    }

    #[test]
    fn containers_stringify_generically() {
        let got = Value::list(["<a>"]).stringify().unwrap();
        assert_eq!(got, Stringified::Bytes(b"['<a>']".to_vec()));
    }

    #[test]
    fn indexing_supports_negative_positions() {
        let list = Value::list([10, 20, 30]);
        assert_eq!(list.get_item(&Key::Index(-1)).unwrap(), Value::from(30));
        assert_eq!(
            list.get_item(&Key::Index(3)),
            Err(LookupError::IndexOutOfRange { index: 3, len: 3 })
        );
        assert_eq!(
            Value::from("héllo").get_item(&Key::Index(1)).unwrap(),
            Value::from("é")
        );
    }

    #[test]
    fn indexing_safe_text_yields_plain_text() {
        let got = Value::from(SafeText::new("&lt;")).get_item(&Key::Index(0)).unwrap();
        assert_eq!(got, Value::from("&"));
    }

    #[test]
    fn map_lookup_reports_missing_key() {
        let map = Value::map([("a", Value::from(1))]);
        assert_eq!(map.get_item(&Key::from("a")).unwrap(), Value::from(1));
        assert_eq!(
            map.get_item(&Key::from("b")),
            Err(LookupError::MissingKey("b".to_string()))
        );
    }

    #[test]
    fn objects_are_not_subscriptable_by_default() {
        let err = Value::object(Point(0, 0)).get_item(&Key::Index(0)).unwrap_err();
        assert_eq!(
            err,
            LookupError::NotSubscriptable {
                type_name: "Point".to_string()
            }
        );
    }
}
