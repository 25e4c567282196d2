//! UBL 2.1 document generation for the SUNAT CPE regime.
//!
//! Produces the unsigned XML for boletas, facturas, and notas de crédito
//! following the SEE layout: reserved `ext:UBLExtensions` block first, then
//! the document body in fixed element order. The serialized bytes are
//! already in inclusive canonical form (single line, UTF-8, start/end tag
//! pairs, alphabetical attributes), so the signature over them survives a
//! verifier's re-canonicalization.
//!
//! # Example
//!
//! ```no_run
//! use comprobante::core::*;
//! use comprobante::ubl;
//!
//! let emitter: Emitter = todo!();
//! let record: InvoiceRecord = todo!(); // build via RecordBuilder
//! let artifact = ubl::build(&emitter, &record).unwrap();
//! println!("{} -> {} bytes", artifact.name, artifact.xml.len());
//! ```

mod credit_note;
mod invoice;
pub(crate) mod xml_utils;

pub use credit_note::to_credit_note_xml;
pub use invoice::to_invoice_xml;
pub use xml_utils::{format_decimal, sanitize_text};

use crate::core::{CpeError, DocumentKind, DocumentName, Emitter, InvoiceRecord};

/// UBL version stamped on every document.
pub const UBL_VERSION_ID: &str = "2.1";

/// SUNAT customization of UBL 2.1.
pub const CUSTOMIZATION_ID: &str = "2.0";

/// Fixed note inside the `cac:Signature` block.
pub const SIGNATURE_NOTE: &str =
    "Elaborado por Sistema de Emision Electronica Facturador SUNAT (SEE-SFS) 1.4";

/// Namespace URIs declared on document roots.
///
/// Declaration order on the root is the default namespace first, then
/// prefixes alphabetically; that is the order inclusive C14N fixes, so
/// emitting it directly keeps the bytes canonical.
pub mod ns {
    pub const INVOICE: &str = "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2";
    pub const CREDIT_NOTE: &str = "urn:oasis:names:specification:ubl:schema:xsd:CreditNote-2";
    pub const CAC: &str =
        "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
    pub const CBC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";
    pub const CCTS: &str = "urn:un:unece:uncefact:documentation:2";
    pub const DS: &str = "http://www.w3.org/2000/09/xmldsig#";
    pub const EXT: &str =
        "urn:oasis:names:specification:ubl:schema:xsd:CommonExtensionComponents-2";
    pub const QDT: &str = "urn:oasis:names:specification:ubl:schema:xsd:QualifiedDatatypes-2";
    pub const UDT: &str =
        "urn:un:unece:uncefact:data:specification:UnqualifiedDataTypesSchemaModule:2";
}

/// An unsigned document plus its deterministic artifact name.
#[derive(Debug, Clone)]
pub struct BuildArtifact {
    pub name: DocumentName,
    pub xml: String,
}

/// Build the unsigned UBL document for a record. Dispatches on the record
/// kind; validation is the caller's business (see `RecordBuilder::build`).
pub fn build(emitter: &Emitter, record: &InvoiceRecord) -> Result<BuildArtifact, CpeError> {
    let xml = match record.kind {
        DocumentKind::Invoice => to_invoice_xml(emitter, record)?,
        DocumentKind::CreditNote => to_credit_note_xml(emitter, record)?,
    };
    Ok(BuildArtifact {
        name: DocumentName::for_record(&emitter.ruc, record),
        xml,
    })
}
