#![cfg(feature = "transport")]

use comprobante::core::*;
use comprobante::transport::{
    RelayClient, RelayConfig, SolCredentials, SunatEnvironment, Transport, default_duplicate_phrases,
    pack_xml, parse_receipt_status, unpack_receipt,
};

fn name() -> DocumentName {
    DocumentName::new("20601234561", DocumentTypeCode::Boleta, "B001", "00000042")
}

// --- Containers ---

#[test]
fn submission_container_round_trips() {
    let name = name();
    let xml = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?><Invoice></Invoice>";

    let zipped = pack_xml(&name.xml_name(), xml).unwrap();
    assert!(zipped.starts_with(b"PK"));
    assert_eq!(unpack_receipt(&zipped).unwrap(), xml);
}

#[test]
fn bare_receipt_passes_through_unpacking() {
    let cdr = b"<ApplicationResponse>ok</ApplicationResponse>";
    assert_eq!(unpack_receipt(cdr).unwrap(), cdr);
}

// --- Receipt status ---

const ACCEPTED_CDR: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ar:ApplicationResponse xmlns:ar="urn:oasis:names:specification:ubl:schema:xsd:ApplicationResponse-2" xmlns:cac="urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2" xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2">
  <cbc:UBLVersionID>2.0</cbc:UBLVersionID>
  <cbc:ID>012345</cbc:ID>
  <cbc:ResponseDate>2025-03-14</cbc:ResponseDate>
  <cac:DocumentResponse>
    <cac:Response>
      <cbc:ReferenceID>B001-00000042</cbc:ReferenceID>
      <cbc:ResponseCode>0</cbc:ResponseCode>
      <cbc:Description>La Boleta numero B001-00000042, ha sido aceptada</cbc:Description>
    </cac:Response>
    <cac:DocumentReference>
      <cbc:ID>20601234561-03-B001-00000042</cbc:ID>
    </cac:DocumentReference>
  </cac:DocumentResponse>
</ar:ApplicationResponse>"#;

#[test]
fn accepted_receipt_parses() {
    let status = parse_receipt_status(ACCEPTED_CDR).unwrap();
    assert!(status.is_accepted());
    assert_eq!(status.response_code, "0");
    assert_eq!(status.reference_id.as_deref(), Some("B001-00000042"));
    assert!(status.description.contains("ha sido aceptada"));
}

#[test]
fn rejection_receipt_is_not_accepted() {
    let cdr = ACCEPTED_CDR
        .replace("<cbc:ResponseCode>0</cbc:ResponseCode>", "<cbc:ResponseCode>2324</cbc:ResponseCode>")
        .replace("ha sido aceptada", "El comprobante fue rechazado");

    let status = parse_receipt_status(&cdr).unwrap();
    assert!(!status.is_accepted());
    assert_eq!(status.response_code, "2324");
    assert!(status.description.contains("rechazado"));
}

#[test]
fn only_the_first_response_block_counts() {
    let cdr = r#"<ApplicationResponse>
      <DocumentResponse>
        <Response><ResponseCode>0</ResponseCode><Description>primera</Description></Response>
        <Response><ResponseCode>99</ResponseCode><Description>segunda</Description></Response>
      </DocumentResponse>
    </ApplicationResponse>"#;

    let status = parse_receipt_status(cdr).unwrap();
    assert_eq!(status.response_code, "0");
    assert_eq!(status.description, "primera");
}

#[test]
fn receipt_without_response_code_is_an_error() {
    let err = parse_receipt_status("<ApplicationResponse></ApplicationResponse>").unwrap_err();
    assert!(matches!(err, CpeError::Xml(_)));
}

#[test]
fn packed_receipt_parses_after_unpacking() {
    let packed = pack_xml(&name().receipt_name(), ACCEPTED_CDR.as_bytes()).unwrap();
    let bytes = unpack_receipt(&packed).unwrap();
    let status = parse_receipt_status(std::str::from_utf8(&bytes).unwrap()).unwrap();
    assert!(status.is_accepted());
}

// --- Direct service addressing ---

#[test]
fn environment_endpoints() {
    assert_eq!(
        SunatEnvironment::Beta.endpoint(),
        "https://e-beta.sunat.gob.pe/ol-ti-itcpfegem-beta/billService"
    );
    assert_eq!(
        SunatEnvironment::Production.endpoint(),
        "https://e-factura.sunat.gob.pe/ol-ti-itcpfegem/billService"
    );
}

#[test]
fn environment_labels() {
    assert_eq!(SunatEnvironment::from_label("beta"), SunatEnvironment::Beta);
    assert_eq!(SunatEnvironment::from_label("BETA"), SunatEnvironment::Beta);
    assert_eq!(SunatEnvironment::from_label("produccion"), SunatEnvironment::Production);
    assert_eq!(SunatEnvironment::from_label(""), SunatEnvironment::Production);
}

#[test]
fn basic_username_concatenates_ruc_and_sol_user() {
    let credentials = SolCredentials::new("20601234561", "MODDATOS", "moddatos");
    assert_eq!(credentials.basic_username(), "20601234561MODDATOS");
}

#[test]
fn sol_password_never_prints() {
    let credentials = SolCredentials::new("20601234561", "MODDATOS", "s3creta");
    let debug = format!("{credentials:?}");
    assert!(debug.contains("20601234561"));
    assert!(debug.contains("MODDATOS"));
    assert!(!debug.contains("s3creta"));
}

// --- Relay configuration ---

#[test]
fn relay_config_seeds_default_duplicate_phrases() {
    let config = RelayConfig::new("https://relay.example.com", "produccion", "user", "pass");
    assert_eq!(config.duplicate_phrases, default_duplicate_phrases());
    assert_eq!(config.duplicate_phrases.len(), 6);
    assert!(config.duplicate_phrases.iter().any(|p| p == "registrado previamente"));
    assert!(config.duplicate_phrases.iter().any(|p| p == "ya existe"));
}

#[test]
fn relay_password_never_prints() {
    let config = RelayConfig::new("https://relay.example.com", "produccion", "user", "s3creta");
    let debug = format!("{config:?}");
    assert!(debug.contains("relay.example.com"));
    assert!(!debug.contains("s3creta"));
}

#[test]
fn relay_transport_supports_status_queries() {
    let client = RelayClient::new(RelayConfig::new(
        "https://relay.example.com",
        "produccion",
        "user",
        "pass",
    ))
    .unwrap();
    let transport = Transport::Relay(client);
    assert!(transport.supports_query());
}
