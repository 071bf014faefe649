//! Tag and join helpers built on the safe combinators.

use crate::error::Result;
use crate::quote::quote_with;
use crate::safe::SafeText;
use crate::value::{Number, Value};

/// Attribute value for [`htmltag`].
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    /// `true` renders a bare attribute, `false` omits it.
    Flag(bool),
    /// `Value::None` omits the attribute; anything else is escaped.
    Value(Value),
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        AttrValue::Flag(b)
    }
}

impl From<Value> for AttrValue {
    fn from(v: Value) -> Self {
        AttrValue::Value(v)
    }
}

macro_rules! attr_value_from {
    ($($t:ty),* $(,)?) => {
        $(impl From<$t> for AttrValue {
            fn from(v: $t) -> Self {
                AttrValue::Value(Value::from(v))
            }
        })*
    };
}

attr_value_from!(&str, String, i32, i64, u32, f64, Number, SafeText);

impl<T: Into<Value>> From<Option<T>> for AttrValue {
    fn from(v: Option<T>) -> Self {
        AttrValue::Value(Value::from(v))
    }
}

/// Concatenate quoted `items` with no separator.
pub fn htmljoin<I>(items: I) -> Result<SafeText>
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    SafeText::empty().join(items)
}

/// `<name attr="value" ...>` with every name and value escaped.
///
/// Attribute names are lowercased, stripped of leading and trailing `_`,
/// and inner `_` become `-` (so `data_id` gives `data-id`, `class_` gives
/// `class`). Repeated `class` values are merged with a space;
/// safe values keep their markup in the merge. Attributes
/// keep the order of their first occurrence.
pub fn htmltag<I, K, V>(name: &str, attrs: I) -> Result<SafeText>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<AttrValue>,
{
    let mut merged: Vec<(String, AttrValue)> = Vec::new();
    for (raw_name, value) in attrs {
        let attr = normalize_attr_name(raw_name.as_ref());
        let mut value = value.into();
        if attr == "class" {
            let previous = match merged.iter().find(|(n, _)| n == "class") {
                Some((_, v)) => class_markup(v)?,
                None => String::new(),
            };
            let joined = format!("{previous} {}", class_markup(&value)?);
            let joined = joined.trim();
            if joined.is_empty() {
                continue;
            }
            value = AttrValue::Value(Value::SafeText(SafeText::new(joined)));
        }
        match merged.iter_mut().find(|(n, _)| *n == attr) {
            Some(slot) => slot.1 = value,
            None => merged.push((attr, value)),
        }
    }

    let attr_template = SafeText::new("%s=\"%s\"");
    let mut rendered = Vec::with_capacity(merged.len());
    for (attr, value) in merged {
        match value {
            AttrValue::Flag(true) => rendered.push(Value::Text(attr)),
            AttrValue::Flag(false) | AttrValue::Value(Value::None) => {}
            AttrValue::Value(v) => {
                rendered.push(Value::SafeText(attr_template.format((attr, v))?));
            }
        }
    }

    let separator = if rendered.is_empty() { "" } else { " " };
    let attrs = SafeText::new(" ").join(rendered)?;
    SafeText::new("<%s%s%s>").format((name, separator, attrs))
}

fn normalize_attr_name(name: &str) -> String {
    name.to_lowercase().trim_matches('_').replace('_', "-")
}

/// Class value as markup: plain values are quoted, safe ones kept as-is.
fn class_markup(value: &AttrValue) -> Result<String> {
    Ok(match value {
        AttrValue::Flag(_) | AttrValue::Value(Value::None) => String::new(),
        AttrValue::Value(v) => quote_with(v.clone(), true)?.into_safe().into_text().into_string(),
    })
}
