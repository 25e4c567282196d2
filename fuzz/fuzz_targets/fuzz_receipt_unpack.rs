#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes as a receipt container: zip or bare XML, must not
    // panic either way.
    let _ = comprobante::transport::unpack_receipt(data);
});
