//! Safe HTML markup strings.
//!
//! Values substituted into templates are escaped exactly once: [`quote`]
//! decides per value, and the safe types ([`SafeText`], [`SafeBytes`])
//! re-quote the other operand of every concatenation, join and `%` format,
//! so a safe value never degrades into an unescaped string.

pub mod bridge;
pub mod deferred;
pub mod error;
pub mod escape;
pub mod host;
pub mod quote;
pub mod safe;
pub mod stats;
pub mod tag;
pub mod value;
pub mod writer;

mod format;
#[cfg(feature = "serde")]
mod serde_impl;

pub use crate::bridge::{promote, promote_strict};
pub use crate::deferred::{BytesArg, Deferred, FormatArg, FormatArgs, TextArg, wrap, wrap_with};
pub use crate::error::{FormatError, LookupError, MarkupError, Result, StringifyError};
pub use crate::escape::{escape_bytes, escape_text};
pub use crate::host::{ByteWrapperClass, HostBindings, LocalByteWrapper, install_bindings};
pub use crate::quote::{Quoted, plainstr, quote, quote_text, quote_with};
pub use crate::safe::{Safe, SafeBytes, SafeText};
pub use crate::tag::{AttrValue, htmljoin, htmltag};
pub use crate::value::{HostObject, Key, Number, Stringified, Value};
pub use crate::writer::{
    CaptureSink, Fallback, Grabbed, SharedSink, Sink, SinkResolver, StreamSink, StringSink,
    WriterStack, WriterStackConfig, write,
};
