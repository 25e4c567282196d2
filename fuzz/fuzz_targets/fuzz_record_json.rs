#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Stored records come back through serde; hostile JSON must not
        // panic, and anything that deserializes must serialize again.
        if let Ok(record) = serde_json::from_str::<comprobante::core::InvoiceRecord>(s) {
            serde_json::to_string(&record).unwrap();
        }
    }
});
