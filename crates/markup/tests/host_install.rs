//! Process-wide bindings whose byte wrapper class cannot be resolved.
//! Runs in its own test binary so the installed bindings stay isolated.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use markup::host::bindings;
use markup::{
    ByteWrapperClass, HostBindings, LocalByteWrapper, LookupError, MarkupError, SafeBytes,
    SafeText, install_bindings,
};

static RESOLVE_CALLS: AtomicUsize = AtomicUsize::new(0);

fn install_failing() {
    let failing = HostBindings::new(|| {
        RESOLVE_CALLS.fetch_add(1, Ordering::SeqCst);
        Err(LookupError::HostClassUnavailable {
            name: "ByteWrapper",
            reason: "module not importable".to_string(),
        })
    });
    // Several tests race to install; only the first one wins.
    let _ = install_bindings(failing);
}

#[test]
fn byte_arguments_report_the_unavailable_class() {
    install_failing();
    let err = SafeBytes::new(b"<%s>".to_vec())
        .format(&b"x"[..])
        .unwrap_err();
    assert!(matches!(
        err,
        MarkupError::Lookup(LookupError::HostClassUnavailable { name: "ByteWrapper", .. })
    ));
    // The failure is cached: a second attempt does not resolve again.
    assert!(SafeBytes::new(b"%s".to_vec()).format(&b"y"[..]).is_err());
    assert_eq!(RESOLVE_CALLS.load(Ordering::SeqCst), 1);
    assert!(bindings().is_resolved());
}

#[test]
fn text_formatting_keeps_working() {
    install_failing();
    let got = SafeText::new("<%s>").format(("a&b",)).unwrap();
    assert_eq!(got.as_str(), "<a&amp;b>");

    // Byte values quoted for a text template are promoted before wrapping.
    let got = SafeText::new("<%s>").format((b"x<".to_vec(),)).unwrap();
    assert_eq!(got.as_str(), "<x&lt;>");

    // A byte template with only text and numbers never needs the class.
    let got = SafeBytes::new(b"%s=%d".to_vec()).format(("k", 1)).unwrap();
    assert!(got.is_text());
    assert_eq!(got.as_bytes(), b"k=1");
}

#[test]
fn reinstalling_is_refused() {
    install_failing();
    let again = HostBindings::new(|| {
        Ok(Arc::new(LocalByteWrapper) as Arc<dyn ByteWrapperClass>)
    });
    assert!(install_bindings(again).is_err());
}
