//! The per-value escape decision.

use crate::bridge;
use crate::error::Result;
use crate::escape;
use crate::safe::{Safe, SafeBytes, SafeText};
use crate::value::{Number, Stringified, Value};

/// Safety-tagged result of [`quote_with`].
#[derive(Clone, Debug, PartialEq)]
pub enum Quoted {
    Number(Number),
    Text(SafeText),
    Bytes(SafeBytes),
}

impl Quoted {
    pub fn is_text(&self) -> bool {
        matches!(self, Quoted::Text(_))
    }

    /// Text view of this result; bytes are promoted lossily.
    pub fn into_text(self) -> Quoted {
        match self {
            Quoted::Bytes(b) => Quoted::Text(bridge::promote(b)),
            other => other,
        }
    }

    /// Numbers are rendered with the host number formatter.
    pub fn into_safe(self) -> Safe {
        match self {
            Quoted::Number(n) => Safe::Text(SafeText::from_escaped(n.to_string())),
            Quoted::Text(t) => Safe::Text(t),
            Quoted::Bytes(b) => Safe::Bytes(b),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Quoted::Number(n) => Value::Number(n),
            Quoted::Text(t) => Value::SafeText(t),
            Quoted::Bytes(b) => Value::SafeBytes(b),
        }
    }
}

impl From<Quoted> for Value {
    fn from(q: Quoted) -> Self {
        q.into_value()
    }
}

/// Quote with `prefer_text` inferred from the value's flavor: text-flavored
/// values prefer text, everything else may stay byte-flavored.
pub fn quote(value: impl Into<Value>) -> Result<Quoted> {
    let value = value.into();
    let prefer_text = value.is_text_flavored();
    quote_with(value, prefer_text)
}

/// Decide how `value` becomes safe markup.
///
/// Order (first match wins):
/// 1. numbers and `SafeText` pass through unchanged;
/// 2. non-strings are stringified, and stringified `SafeText` passes through;
/// 3. `SafeBytes` passes through unless `prefer_text`, then it is promoted;
/// 4. plain strings are escaped; byte results are promoted when `prefer_text`.
pub fn quote_with(value: impl Into<Value>, prefer_text: bool) -> Result<Quoted> {
    let stringified = match value.into() {
        Value::Number(n) => return Ok(Quoted::Number(n)),
        Value::SafeText(t) => return Ok(Quoted::Text(t)),
        Value::Text(s) => Stringified::Text(s),
        Value::Bytes(b) => Stringified::Bytes(b),
        Value::SafeBytes(b) => Stringified::SafeBytes(b),
        other => {
            log::trace!(target: "markup.quote", "stringifying {}", other.type_name());
            other.stringify()?
        }
    };

    Ok(match stringified {
        Stringified::SafeText(t) => Quoted::Text(t),
        Stringified::SafeBytes(b) if prefer_text => Quoted::Text(bridge::promote(b)),
        Stringified::SafeBytes(b) => Quoted::Bytes(b),
        Stringified::Text(s) => Quoted::Text(SafeText::from_escaped(escape::escape_text_owned(s))),
        Stringified::Bytes(b) => {
            let escaped = SafeBytes::from_escaped(escape::escape_bytes_owned(b));
            if prefer_text {
                Quoted::Text(bridge::promote(escaped))
            } else {
                Quoted::Bytes(escaped)
            }
        }
    })
}

/// Infallible quoting for plain text.
pub fn quote_text(s: &str) -> SafeText {
    SafeText::from_escaped(escape::escape_text(s).into_owned())
}

/// Stringify without escaping. Safe strings lose their tag: the result is a
/// plain copy of their content.
pub fn plainstr(value: impl Into<Value>) -> Result<Value> {
    Ok(match value.into().stringify()? {
        Stringified::Text(s) => Value::Text(s),
        Stringified::Bytes(b) => Value::Bytes(b),
        Stringified::SafeText(t) => Value::Text(t.into_string()),
        Stringified::SafeBytes(b) => Value::Bytes(b.into_bytes()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MarkupError, StringifyError};
    use crate::value::HostObject;

    #[derive(Debug)]
    struct PreEscaped;

    impl HostObject for PreEscaped {
        fn to_text(&self) -> Option<std::result::Result<Stringified, StringifyError>> {
            Some(Ok(Stringified::SafeText(SafeText::new("<b>bold</b>"))))
        }
    }

    #[derive(Debug)]
    struct Broken;

    impl HostObject for Broken {
        fn to_str(&self) -> std::result::Result<Stringified, StringifyError> {
            Err(StringifyError::new("Broken", "refuses"))
        }
    }

    #[test]
    fn script_tag_is_escaped_as_text() {
        let q = quote_with("<script>", true).unwrap();
        assert_eq!(q, Quoted::Text(SafeText::new("&lt;script&gt;")));
    }

    #[test]
    fn numbers_pass_through() {
        assert_eq!(quote_with(5, true).unwrap(), Quoted::Number(Number::Int(5)));
        assert_eq!(
            quote_with(2.5, false).unwrap(),
            Quoted::Number(Number::Float(2.5))
        );
    }

    #[test]
    fn requoting_never_double_escapes() {
        let once = quote_with("a & b", true).unwrap();
        let twice = quote_with(once.clone().into_value(), true).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn bytes_stay_bytes_unless_text_preferred() {
        assert_eq!(
            quote_with(b"<x>", false).unwrap(),
            Quoted::Bytes(SafeBytes::new(b"&lt;x&gt;".to_vec()))
        );
        assert_eq!(
            quote_with(b"<x>\xFF", true).unwrap(),
            Quoted::Text(SafeText::new("&lt;x&gt;\u{FFFD}"))
        );
    }

    #[test]
    fn safe_bytes_promote_only_when_text_preferred() {
        let sb = SafeBytes::new(b"<i>".to_vec());
        assert_eq!(quote_with(sb.clone(), false).unwrap(), Quoted::Bytes(sb.clone()));
        assert_eq!(quote_with(sb, true).unwrap(), Quoted::Text(SafeText::new("<i>")));
    }

    #[test]
    fn object_markup_is_not_reescaped() {
        let q = quote_with(Value::object(PreEscaped), true).unwrap();
        assert_eq!(q, Quoted::Text(SafeText::new("<b>bold</b>")));
    }

    #[test]
    fn object_generic_conversion_is_escaped() {
        #[derive(Debug)]
        struct Angle;
        impl HostObject for Angle {}

        let q = quote_with(Value::object(Angle), false).unwrap();
        assert_eq!(q, Quoted::Bytes(SafeBytes::new(b"Angle".to_vec())));
        let q = quote_with(Value::list(["<"]), true).unwrap();
        assert_eq!(q, Quoted::Text(SafeText::new("[&#39;&lt;&#39;]")));
    }

    #[test]
    fn stringify_errors_propagate() {
        let err = quote_with(Value::object(Broken), true).unwrap_err();
        assert!(matches!(err, MarkupError::Stringify(e) if e.message == "refuses"));
    }

    #[test]
    fn inferred_flavor() {
        assert!(quote("x").unwrap().is_text());
        assert!(!quote(b"x").unwrap().is_text());
    }

    #[test]
    fn plainstr_strips_the_tag() {
        assert_eq!(plainstr(SafeText::new("&amp;")).unwrap(), Value::from("&amp;"));
        assert_eq!(plainstr(7).unwrap(), Value::from(b"7"));
    }
}
