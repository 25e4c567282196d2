#![cfg(feature = "sign")]

use std::io::Write;

use chrono::NaiveDate;
use comprobante::core::*;
use comprobante::sign::{
    C14N_URI, CertificateBundle, ENVELOPED_URI, SIGNATURE_ID, SignatureAlgorithm,
};
use comprobante::ubl;
use rust_decimal_macros::dec;

fn unsigned_boleta_xml() -> String {
    let emitter = Emitter::new(
        "20601234561",
        "COMERCIAL ANDINA S.A.C.",
        "Av. Arequipa 1250, Lince",
        "150116",
    );
    let record = RecordBuilder::new(
        "B001",
        "00000042",
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap(),
    )
    .buyer(Buyer::dni("45871236", "María Quispe"))
    .line("Cuaderno A4", dec!(2), dec!(5.90))
    .build()
    .unwrap();

    ubl::build(&emitter, &record).unwrap().xml
}

// --- Algorithm suite ---

#[test]
fn sha1_suite_is_the_default() {
    assert_eq!(SignatureAlgorithm::default(), SignatureAlgorithm::RsaSha1);
}

#[test]
fn suite_uris() {
    assert_eq!(
        SignatureAlgorithm::RsaSha1.signature_method_uri(),
        "http://www.w3.org/2000/09/xmldsig#rsa-sha1"
    );
    assert_eq!(
        SignatureAlgorithm::RsaSha1.digest_method_uri(),
        "http://www.w3.org/2000/09/xmldsig#sha1"
    );
    assert_eq!(
        SignatureAlgorithm::RsaSha256.signature_method_uri(),
        "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256"
    );
    assert_eq!(
        SignatureAlgorithm::RsaSha256.digest_method_uri(),
        "http://www.w3.org/2001/04/xmlenc#sha256"
    );
}

#[test]
fn fixed_identifiers() {
    assert_eq!(C14N_URI, "http://www.w3.org/TR/2001/REC-xml-c14n-20010315");
    assert_eq!(ENVELOPED_URI, "http://www.w3.org/2000/09/xmldsig#enveloped-signature");
    assert_eq!(SIGNATURE_ID, "SignSUNAT");
}

// --- Document / signer contract ---

#[test]
fn unsigned_documents_carry_exactly_one_slot() {
    let xml = unsigned_boleta_xml();
    let slot = "<ext:ExtensionContent></ext:ExtensionContent>";
    assert_eq!(xml.matches(slot).count(), 1);
    // The slot comes before any signed content would reference it.
    assert!(xml.find(slot).unwrap() < xml.find("<cbc:UBLVersionID>").unwrap());
}

// --- Keystore failures ---

#[test]
fn garbage_bundle_is_a_signing_error() {
    let err = CertificateBundle::from_pkcs12(&[0u8; 64], "secret").unwrap_err();
    assert!(matches!(err, CpeError::Signing(_)));
    assert!(err.to_string().starts_with("signing error:"));
}

#[test]
fn truncated_file_is_a_signing_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"\x30\x82").unwrap();
    file.flush().unwrap();

    let err = CertificateBundle::from_pkcs12_file(file.path(), "secret").unwrap_err();
    assert!(matches!(err, CpeError::Signing(_)));
}

#[test]
fn missing_bundle_file_names_the_path() {
    let err = CertificateBundle::from_pkcs12_file("/no/such/dir/cert.pfx", "secret").unwrap_err();
    assert!(err.to_string().contains("/no/such/dir/cert.pfx"));
}
