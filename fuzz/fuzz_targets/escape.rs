#![no_main]

use libfuzzer_sys::fuzz_target;
use markup::escape::{escape_bytes, escaped_len, needs_escape};

fuzz_target!(|data: &[u8]| {
    let out = escape_bytes(data);
    assert_eq!(out.len(), escaped_len(data));
    assert!(!out.iter().any(|b| matches!(b, b'<' | b'>' | b'"' | b'\'')));
    assert_eq!(needs_escape(data), out.len() != data.len());
    if let Ok(text) = std::str::from_utf8(data) {
        let escaped = markup::escape_text(text);
        assert_eq!(escaped.as_bytes(), &out[..]);
    }
});
