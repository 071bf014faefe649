#![no_main]

use libfuzzer_sys::fuzz_target;
use markup::{Safe, SafeBytes};

// First byte picks the split point between the markup and the operand.
fuzz_target!(|data: &[u8]| {
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let at = usize::from(split) % (rest.len() + 1);
    let (base, operand) = rest.split_at(at);
    let base = SafeBytes::new(base.to_vec());

    let combined = base.concat(operand).expect("byte operands always quote");
    if let Safe::Bytes(bytes) = &combined {
        assert!(std::str::from_utf8(bytes.as_bytes()).is_ok());
        assert!(bytes.as_bytes().starts_with(base.as_bytes()));
    }
    let joined = base.join([operand, operand]).expect("byte items always quote");
    if !joined.is_text() {
        assert!(std::str::from_utf8(joined.as_bytes()).is_ok());
    }
});
