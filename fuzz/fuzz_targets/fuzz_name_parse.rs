#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Must not panic; errors are fine, panics are bugs.
        if let Some(name) = comprobante::core::DocumentName::parse(s) {
            // Accepted names must survive their own string form.
            let reparsed = comprobante::core::DocumentName::parse(&name.to_string());
            assert_eq!(reparsed, Some(name));
        }
    }
});
