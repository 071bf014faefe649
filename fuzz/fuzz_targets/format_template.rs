#![no_main]

use libfuzzer_sys::fuzz_target;
use markup::{SafeBytes, SafeText, Value};

// Arbitrary templates may fail to format; they must never panic.
fuzz_target!(|data: &[u8]| {
    let args = markup::FormatArgs::tuple([
        Value::from("<x>"),
        Value::from(7),
        Value::from(2.5),
        Value::from(&b"\xFF&"[..]),
    ]);
    let _ = SafeBytes::new(data.to_vec()).format(args.clone());
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = SafeText::new(text).format(args);
    }
});
