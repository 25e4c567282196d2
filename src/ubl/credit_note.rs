//! UBL `CreditNote` serialization (nota de crédito, catálogo 01 code 07).

use super::invoice::{
    LineElems, write_currency_code, write_customer_party, write_document_tax_total,
    write_extension_block, write_issue_date_time, write_line, write_monetary_total,
    write_signature_block, write_supplier_party,
};
use super::xml_utils::{XmlResult, XmlWriter, sanitize_text};
use super::{CUSTOMIZATION_ID, UBL_VERSION_ID, ns};
use crate::core::catalog::DocumentTypeCode;
use crate::core::{CpeError, DocumentKind, Emitter, InvoiceRecord};

/// Serialize a credit-note record to the SUNAT UBL 2.1 `CreditNote`
/// document.
///
/// The note must reference the original document; its series/number land in
/// both `cac:DiscrepancyResponse` and `cac:BillingReference`, and the
/// referenced type code is re-derived from the referenced series prefix.
pub fn to_credit_note_xml(emitter: &Emitter, record: &InvoiceRecord) -> XmlResult {
    let reference = record.credit_note_ref.as_ref().ok_or_else(|| {
        CpeError::Validation("credit note record carries no reference to the original document".into())
    })?;
    let referenced_id = format!("{}-{}", reference.series, reference.number);
    let referenced_code = DocumentTypeCode::for_series(DocumentKind::Invoice, &reference.series);

    let mut w = XmlWriter::new()?;
    let currency = record.currency_code.as_str();

    w.start_element_with_attrs(
        "CreditNote",
        &[
            ("xmlns", ns::CREDIT_NOTE),
            ("xmlns:cac", ns::CAC),
            ("xmlns:cbc", ns::CBC),
            ("xmlns:ccts", ns::CCTS),
            ("xmlns:ds", ns::DS),
            ("xmlns:ext", ns::EXT),
            ("xmlns:qdt", ns::QDT),
            ("xmlns:udt", ns::UDT),
        ],
    )?;

    write_extension_block(&mut w)?;

    w.text_element("cbc:UBLVersionID", UBL_VERSION_ID)?;
    w.text_element("cbc:CustomizationID", CUSTOMIZATION_ID)?;
    w.text_element("cbc:ID", &format!("{}-{}", record.series, record.number))?;
    write_issue_date_time(&mut w, record)?;
    write_currency_code(&mut w, currency)?;

    // Motive block, then the pointer back to the corrected document.
    w.start_element("cac:DiscrepancyResponse")?;
    w.text_element("cbc:ReferenceID", &referenced_id)?;
    w.text_element("cbc:ResponseCode", &reference.reason_code)?;
    w.text_element("cbc:Description", sanitize_text(&reference.reason).trim())?;
    w.end_element("cac:DiscrepancyResponse")?;

    w.start_element("cac:BillingReference")?;
    w.start_element("cac:InvoiceDocumentReference")?;
    w.text_element("cbc:ID", &referenced_id)?;
    w.text_element("cbc:DocumentTypeCode", referenced_code.code())?;
    w.end_element("cac:InvoiceDocumentReference")?;
    w.end_element("cac:BillingReference")?;

    write_signature_block(&mut w, emitter)?;
    write_supplier_party(&mut w, emitter)?;
    write_customer_party(&mut w, record)?;
    write_document_tax_total(&mut w, record.total, currency)?;
    write_monetary_total(&mut w, record.total, currency)?;

    for (idx, line) in record.lines.iter().enumerate() {
        write_line(&mut w, LineElems::CREDIT_NOTE, idx + 1, line, currency)?;
    }

    w.end_element("CreditNote")?;
    w.into_string()
}
