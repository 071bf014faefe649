//! Bindings supplied by the embedding templating layer.
//!
//! The byte-flavored format argument is built by a class the host may
//! provide. The class is resolved lazily, once; a failed resolution is
//! cached and reported by every byte-flavored wrap, while text-flavored
//! formatting keeps working.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::deferred::BytesArg;
use crate::error::{LookupError, MarkupError};
use crate::safe::SafeBytes;
use crate::value::Value;

/// Constructor for byte-flavored format arguments.
pub trait ByteWrapperClass: Send + Sync {
    fn name(&self) -> &str;

    fn construct(&self, escaped: SafeBytes, original: Value) -> Result<BytesArg, MarkupError>;
}

/// Built-in constructor used when the host supplies nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalByteWrapper;

impl ByteWrapperClass for LocalByteWrapper {
    fn name(&self) -> &str {
        "LocalByteWrapper"
    }

    fn construct(&self, escaped: SafeBytes, original: Value) -> Result<BytesArg, MarkupError> {
        Ok(BytesArg::new(escaped, original))
    }
}

type Resolved = Result<Arc<dyn ByteWrapperClass>, LookupError>;
type Resolver = Box<dyn Fn() -> Resolved + Send + Sync>;

pub struct HostBindings {
    resolve: Resolver,
    byte_wrapper: OnceLock<Resolved>,
}

impl HostBindings {
    pub fn new<F>(resolve: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn ByteWrapperClass>, LookupError> + Send + Sync + 'static,
    {
        Self {
            resolve: Box::new(resolve),
            byte_wrapper: OnceLock::new(),
        }
    }

    pub fn local() -> Self {
        Self::new(|| Ok(Arc::new(LocalByteWrapper) as Arc<dyn ByteWrapperClass>))
    }

    /// Resolved on first use; later calls return the cached outcome.
    pub fn byte_wrapper_class(&self) -> Result<Arc<dyn ByteWrapperClass>, LookupError> {
        self.byte_wrapper
            .get_or_init(|| {
                let resolved = (self.resolve)();
                match &resolved {
                    Ok(class) => {
                        log::debug!(target: "markup.host", "resolved byte wrapper class {}", class.name())
                    }
                    Err(err) => log::warn!(target: "markup.host", "byte wrapper class unavailable: {err}"),
                }
                resolved
            })
            .clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.byte_wrapper.get().is_some()
    }
}

impl fmt::Debug for HostBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostBindings")
            .field("resolved", &self.is_resolved())
            .finish_non_exhaustive()
    }
}

impl Default for HostBindings {
    fn default() -> Self {
        Self::local()
    }
}

static BINDINGS: OnceLock<HostBindings> = OnceLock::new();

/// Install process-wide bindings. Fails, handing them back, when bindings
/// were already installed or already used.
pub fn install_bindings(bindings: HostBindings) -> Result<(), HostBindings> {
    BINDINGS.set(bindings)
}

/// Installed bindings, or the local ones when nothing was installed.
pub fn bindings() -> &'static HostBindings {
    BINDINGS.get_or_init(HostBindings::local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn local_bindings_construct_byte_args() {
        let bindings = HostBindings::local();
        assert!(!bindings.is_resolved());
        let class = bindings.byte_wrapper_class().unwrap();
        let arg = class
            .construct(SafeBytes::new(b"x".to_vec()), Value::from(b"x"))
            .unwrap();
        assert_eq!(arg.escaped().as_bytes(), b"x");
        assert!(bindings.is_resolved());
    }

    #[test]
    fn resolution_runs_once_and_caches_failure() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let bindings = HostBindings::new(|| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Err(LookupError::HostClassUnavailable {
                name: "StrWrapper",
                reason: "templating layer not loaded".to_string(),
            })
        });
        for _ in 0..3 {
            assert!(matches!(
                bindings.byte_wrapper_class(),
                Err(LookupError::HostClassUnavailable { name: "StrWrapper", .. })
            ));
        }
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_class_only_breaks_byte_wrapping() {
        let bindings = HostBindings::new(|| {
            Err(LookupError::HostClassUnavailable {
                name: "StrWrapper",
                reason: "missing".to_string(),
            })
        });
        assert!(crate::deferred::wrap_in(&bindings, Value::from("text"), false).is_ok());
        assert!(crate::deferred::wrap_in(&bindings, Value::from(1), false).is_ok());
        let err = crate::deferred::wrap_in(&bindings, Value::from(b"bytes"), false).unwrap_err();
        assert!(matches!(err, MarkupError::Lookup(LookupError::HostClassUnavailable { .. })));
    }
}
