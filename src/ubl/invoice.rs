//! UBL `Invoice` serialization (boleta de venta / factura).

use rust_decimal::Decimal;

use super::xml_utils::{XmlResult, XmlWriter, format_decimal, sanitize_text};
use super::{CUSTOMIZATION_ID, SIGNATURE_NOTE, UBL_VERSION_ID, ns};
use crate::core::catalog::{self, list_uri};
use crate::core::{Emitter, InvoiceRecord, LineItem, igv_portion, net_of_igv};

/// Serialize a sale record to the SUNAT UBL 2.1 `Invoice` document.
///
/// Covers both boleta (`03`) and factura (`01`); the type code follows the
/// series prefix. Element order is fixed and the `ext:UBLExtensions` block
/// always comes first, empty, for the signer to fill.
pub fn to_invoice_xml(emitter: &Emitter, record: &InvoiceRecord) -> XmlResult {
    let mut w = XmlWriter::new()?;
    let currency = record.currency_code.as_str();

    w.start_element_with_attrs(
        "Invoice",
        &[
            ("xmlns", ns::INVOICE),
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
    w.text_element_with_attrs(
        "cbc:InvoiceTypeCode",
        record.type_code().code(),
        &[
            ("listAgencyName", catalog::AGENCY_SUNAT),
            ("listID", catalog::OPERATION_DOMESTIC_SALE),
            ("listName", "Tipo de Documento"),
            ("listSchemeURI", list_uri::CATALOG_51),
            ("listURI", list_uri::CATALOG_01),
            ("name", "Tipo de Operacion"),
        ],
    )?;
    write_currency_code(&mut w, currency)?;

    write_signature_block(&mut w, emitter)?;
    write_supplier_party(&mut w, emitter)?;
    write_customer_party(&mut w, record)?;
    write_document_tax_total(&mut w, record.total, currency)?;
    write_monetary_total(&mut w, record.total, currency)?;

    for (idx, line) in record.lines.iter().enumerate() {
        write_line(&mut w, LineElems::INVOICE, idx + 1, line, currency)?;
    }

    w.end_element("Invoice")?;
    w.into_string()
}

/// Element names that differ between `Invoice` and `CreditNote` lines.
pub(super) struct LineElems {
    pub line: &'static str,
    pub quantity: &'static str,
}

impl LineElems {
    pub(super) const INVOICE: Self = Self {
        line: "cac:InvoiceLine",
        quantity: "cbc:InvoicedQuantity",
    };
    pub(super) const CREDIT_NOTE: Self = Self {
        line: "cac:CreditNoteLine",
        quantity: "cbc:CreditedQuantity",
    };
}

/// Reserved signature slot. Must be present and empty on unsigned output;
/// the signer locates it by position, not by search.
pub(super) fn write_extension_block(w: &mut XmlWriter) -> Result<(), crate::core::CpeError> {
    w.start_element("ext:UBLExtensions")?;
    w.start_element("ext:UBLExtension")?;
    w.empty_element("ext:ExtensionContent")?;
    w.end_element("ext:UBLExtension")?;
    w.end_element("ext:UBLExtensions")?;
    Ok(())
}

pub(super) fn write_issue_date_time(
    w: &mut XmlWriter,
    record: &InvoiceRecord,
) -> Result<(), crate::core::CpeError> {
    w.text_element("cbc:IssueDate", &record.issued_at.format("%Y-%m-%d").to_string())?;
    w.text_element("cbc:IssueTime", &record.issued_at.format("%H:%M:%S").to_string())?;
    Ok(())
}

pub(super) fn write_currency_code(
    w: &mut XmlWriter,
    currency: &str,
) -> Result<(), crate::core::CpeError> {
    w.text_element_with_attrs(
        "cbc:DocumentCurrencyCode",
        currency,
        &[
            (
                "listAgencyName",
                "United Nations Economic Commission for Europe",
            ),
            ("listID", "ISO 4217 Alpha"),
            ("listName", "Currency"),
        ],
    )?;
    Ok(())
}

/// `cac:Signature` placeholder party. Distinct from the XML-DSig block;
/// this one is part of the visible document body.
pub(super) fn write_signature_block(
    w: &mut XmlWriter,
    emitter: &Emitter,
) -> Result<(), crate::core::CpeError> {
    w.start_element("cac:Signature")?;
    w.text_element("cbc:ID", &emitter.ruc)?;
    w.text_element("cbc:Note", SIGNATURE_NOTE)?;
    w.start_element("cac:SignatoryParty")?;
    w.start_element("cac:PartyIdentification")?;
    w.text_element("cbc:ID", &emitter.ruc)?;
    w.end_element("cac:PartyIdentification")?;
    w.start_element("cac:PartyName")?;
    w.text_element("cbc:Name", sanitize_text(&emitter.legal_name).trim())?;
    w.end_element("cac:PartyName")?;
    w.end_element("cac:SignatoryParty")?;
    w.start_element("cac:DigitalSignatureAttachment")?;
    w.start_element("cac:ExternalReference")?;
    w.text_element("cbc:URI", "SIGN")?;
    w.end_element("cac:ExternalReference")?;
    w.end_element("cac:DigitalSignatureAttachment")?;
    w.end_element("cac:Signature")?;
    Ok(())
}

pub(super) fn write_supplier_party(
    w: &mut XmlWriter,
    emitter: &Emitter,
) -> Result<(), crate::core::CpeError> {
    w.start_element("cac:AccountingSupplierParty")?;
    w.start_element("cac:Party")?;
    w.start_element("cac:PartyIdentification")?;
    w.text_element_with_attrs(
        "cbc:ID",
        &emitter.ruc,
        &identity_scheme_attrs(catalog::IdentityDocType::Ruc.code()),
    )?;
    w.end_element("cac:PartyIdentification")?;
    w.start_element("cac:PartyName")?;
    w.text_element("cbc:Name", sanitize_text(emitter.display_name()).trim())?;
    w.end_element("cac:PartyName")?;
    w.start_element("cac:PostalAddress")?;
    w.text_element("cbc:ID", &emitter.ubigeo)?;
    w.text_element("cbc:StreetName", sanitize_text(&emitter.address).trim())?;
    w.start_element("cac:Country")?;
    w.text_element("cbc:IdentificationCode", "PE")?;
    w.end_element("cac:Country")?;
    w.end_element("cac:PostalAddress")?;
    w.start_element("cac:PartyLegalEntity")?;
    w.text_element(
        "cbc:RegistrationName",
        sanitize_text(&emitter.legal_name).trim(),
    )?;
    w.end_element("cac:PartyLegalEntity")?;
    w.end_element("cac:Party")?;
    w.end_element("cac:AccountingSupplierParty")?;
    Ok(())
}

pub(super) fn write_customer_party(
    w: &mut XmlWriter,
    record: &InvoiceRecord,
) -> Result<(), crate::core::CpeError> {
    let buyer = &record.buyer;
    w.start_element("cac:AccountingCustomerParty")?;
    w.start_element("cac:Party")?;
    w.start_element("cac:PartyIdentification")?;
    w.text_element_with_attrs(
        "cbc:ID",
        &buyer.doc_number,
        &identity_scheme_attrs(buyer.doc_type.code()),
    )?;
    w.end_element("cac:PartyIdentification")?;
    w.start_element("cac:PartyLegalEntity")?;
    w.text_element("cbc:RegistrationName", sanitize_text(&buyer.name).trim())?;
    w.end_element("cac:PartyLegalEntity")?;
    w.end_element("cac:Party")?;
    w.end_element("cac:AccountingCustomerParty")?;
    Ok(())
}

fn identity_scheme_attrs(scheme_id: &str) -> [(&'static str, &str); 4] {
    [
        ("schemeAgencyName", catalog::AGENCY_SUNAT),
        ("schemeID", scheme_id),
        ("schemeName", "Documento de Identidad"),
        ("schemeURI", list_uri::CATALOG_06),
    ]
}

/// Document-level IGV aggregate, derived from the tax-inclusive total.
pub(super) fn write_document_tax_total(
    w: &mut XmlWriter,
    total: Decimal,
    currency: &str,
) -> Result<(), crate::core::CpeError> {
    let taxable = net_of_igv(total);
    let igv = igv_portion(total);

    w.start_element("cac:TaxTotal")?;
    w.amount_element("cbc:TaxAmount", igv, currency)?;
    w.start_element("cac:TaxSubtotal")?;
    w.amount_element("cbc:TaxableAmount", taxable, currency)?;
    w.amount_element("cbc:TaxAmount", igv, currency)?;
    w.start_element("cac:TaxCategory")?;
    write_tax_scheme(w)?;
    w.end_element("cac:TaxCategory")?;
    w.end_element("cac:TaxSubtotal")?;
    w.end_element("cac:TaxTotal")?;
    Ok(())
}

fn write_tax_scheme(w: &mut XmlWriter) -> Result<(), crate::core::CpeError> {
    w.start_element("cac:TaxScheme")?;
    w.text_element_with_attrs(
        "cbc:ID",
        catalog::TAX_SCHEME_IGV_ID,
        &[
            ("schemeAgencyName", catalog::AGENCY_SUNAT),
            ("schemeID", catalog::TAX_SCHEME_UNECE_5153),
            ("schemeName", catalog::TAX_SCHEME_NAME_LIST),
        ],
    )?;
    w.text_element("cbc:Name", catalog::TAX_SCHEME_IGV_NAME)?;
    w.text_element("cbc:TaxTypeCode", catalog::TAX_SCHEME_IGV_TYPE)?;
    w.end_element("cac:TaxScheme")?;
    Ok(())
}

pub(super) fn write_monetary_total(
    w: &mut XmlWriter,
    total: Decimal,
    currency: &str,
) -> Result<(), crate::core::CpeError> {
    w.start_element("cac:LegalMonetaryTotal")?;
    w.amount_element("cbc:LineExtensionAmount", net_of_igv(total), currency)?;
    w.amount_element("cbc:TaxInclusiveAmount", total, currency)?;
    w.amount_element("cbc:PayableAmount", total, currency)?;
    w.end_element("cac:LegalMonetaryTotal")?;
    Ok(())
}

/// One document line. The same breakdown serves invoices and credit notes;
/// only the outer element names differ.
pub(super) fn write_line(
    w: &mut XmlWriter,
    elems: LineElems,
    index: usize,
    line: &LineItem,
    currency: &str,
) -> Result<(), crate::core::CpeError> {
    let net = net_of_igv(line.subtotal);
    let igv = igv_portion(line.subtotal);
    let unit_net = net_of_igv(line.unit_price);
    let percent = format_decimal(crate::core::IGV_RATE * Decimal::ONE_HUNDRED);

    w.start_element(elems.line)?;
    w.text_element("cbc:ID", &index.to_string())?;
    w.quantity_element(elems.quantity, line.quantity, &line.unit_code)?;
    w.amount_element("cbc:LineExtensionAmount", net, currency)?;

    w.start_element("cac:PricingReference")?;
    w.start_element("cac:AlternativeConditionPrice")?;
    w.amount_element("cbc:PriceAmount", line.unit_price, currency)?;
    w.text_element_with_attrs(
        "cbc:PriceTypeCode",
        catalog::PRICE_TYPE_UNIT_WITH_TAX,
        &[
            ("listAgencyName", catalog::AGENCY_SUNAT),
            ("listName", "Tipo de Precio"),
            ("listURI", list_uri::CATALOG_16),
        ],
    )?;
    w.end_element("cac:AlternativeConditionPrice")?;
    w.end_element("cac:PricingReference")?;

    w.start_element("cac:TaxTotal")?;
    w.amount_element("cbc:TaxAmount", igv, currency)?;
    w.start_element("cac:TaxSubtotal")?;
    w.amount_element("cbc:TaxableAmount", net, currency)?;
    w.amount_element("cbc:TaxAmount", igv, currency)?;
    w.start_element("cac:TaxCategory")?;
    w.text_element("cbc:Percent", &percent)?;
    w.text_element_with_attrs(
        "cbc:TaxExemptionReasonCode",
        catalog::IGV_AFFECTATION_TAXED,
        &[
            ("listAgencyName", catalog::AGENCY_SUNAT),
            ("listName", "Afectacion del IGV"),
            ("listURI", list_uri::CATALOG_07),
        ],
    )?;
    write_tax_scheme(w)?;
    w.end_element("cac:TaxCategory")?;
    w.end_element("cac:TaxSubtotal")?;
    w.end_element("cac:TaxTotal")?;

    w.start_element("cac:Item")?;
    w.text_element("cbc:Description", sanitize_text(&line.description).trim())?;
    w.end_element("cac:Item")?;

    w.start_element("cac:Price")?;
    w.amount_element("cbc:PriceAmount", unit_net, currency)?;
    w.end_element("cac:Price")?;

    w.end_element(elems.line)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Buyer, DocumentKind, Transmission};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn sample_emitter() -> Emitter {
        Emitter::new(
            "20601234561",
            "COMERCIAL ANDINA S.A.C.",
            "Av. Arequipa 1250, Lince",
            "150116",
        )
        .with_trade_name("Andina Store")
    }

    fn sample_record(series: &str) -> InvoiceRecord {
        InvoiceRecord {
            series: series.to_string(),
            number: "00000042".to_string(),
            kind: DocumentKind::Invoice,
            issued_at: NaiveDate::from_ymd_opt(2025, 3, 14)
                .and_then(|d| d.and_hms_opt(10, 30, 0))
                .unwrap(),
            currency_code: "PEN".to_string(),
            buyer: Buyer::dni("45871236", "María Quispe"),
            lines: vec![LineItem::new("Cuaderno A4", dec!(2), dec!(5.90), dec!(11.80))],
            total: dec!(11.80),
            credit_note_ref: None,
            transmission: Transmission::default(),
        }
    }

    #[test]
    fn boleta_has_fixed_header_order() {
        let xml = to_invoice_xml(&sample_emitter(), &sample_record("B001")).unwrap();
        let ext = xml.find("<ext:UBLExtensions>").unwrap();
        let version = xml.find("<cbc:UBLVersionID>2.1</cbc:UBLVersionID>").unwrap();
        let id = xml.find("<cbc:ID>B001-00000042</cbc:ID>").unwrap();
        assert!(ext < version && version < id);
        assert!(xml.contains("<cbc:IssueDate>2025-03-14</cbc:IssueDate>"));
        assert!(xml.contains("<cbc:IssueTime>10:30:00</cbc:IssueTime>"));
    }

    #[test]
    fn root_declares_all_namespaces_in_canonical_order() {
        let xml = to_invoice_xml(&sample_emitter(), &sample_record("B001")).unwrap();
        let root_end = xml.find("><ext:UBLExtensions>").unwrap();
        let root = &xml[..root_end];
        let positions: Vec<usize> = [
            "xmlns=",
            "xmlns:cac=",
            "xmlns:cbc=",
            "xmlns:ccts=",
            "xmlns:ds=",
            "xmlns:ext=",
            "xmlns:qdt=",
            "xmlns:udt=",
        ]
        .iter()
        .map(|p| root.find(p).unwrap())
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(root.contains("urn:oasis:names:specification:ubl:schema:xsd:Invoice-2"));
        assert!(root.contains("urn:oasis:names:specification:ubl:schema:xsd:QualifiedDatatypes-2"));
    }

    #[test]
    fn type_code_follows_series_prefix() {
        let boleta = to_invoice_xml(&sample_emitter(), &sample_record("B001")).unwrap();
        assert!(boleta.contains(">03</cbc:InvoiceTypeCode>"));
        let factura = to_invoice_xml(&sample_emitter(), &sample_record("F001")).unwrap();
        assert!(factura.contains(">01</cbc:InvoiceTypeCode>"));
        assert!(factura.contains("listID=\"0101\""));
        assert!(factura.contains("name=\"Tipo de Operacion\""));
    }

    #[test]
    fn extension_content_is_an_empty_tag_pair() {
        let xml = to_invoice_xml(&sample_emitter(), &sample_record("B001")).unwrap();
        assert!(xml.contains("<ext:ExtensionContent></ext:ExtensionContent>"));
        assert!(!xml.contains("<ext:ExtensionContent/>"));
    }

    #[test]
    fn tax_breakdown_derives_from_inclusive_total() {
        let xml = to_invoice_xml(&sample_emitter(), &sample_record("B001")).unwrap();
        assert!(xml.contains("<cbc:TaxableAmount currencyID=\"PEN\">10.00</cbc:TaxableAmount>"));
        assert!(xml.contains("<cbc:TaxInclusiveAmount currencyID=\"PEN\">11.80</cbc:TaxInclusiveAmount>"));
        assert!(xml.contains("<cbc:PayableAmount currencyID=\"PEN\">11.80</cbc:PayableAmount>"));
        // Line: 2 x 5.90 inclusive -> 5.00 net unit price.
        assert!(xml.contains("<cac:Price><cbc:PriceAmount currencyID=\"PEN\">5.00</cbc:PriceAmount></cac:Price>"));
        assert!(xml.contains("<cbc:Percent>18.00</cbc:Percent>"));
    }

    #[test]
    fn supplier_and_customer_parties_carry_scheme_attrs() {
        let xml = to_invoice_xml(&sample_emitter(), &sample_record("B001")).unwrap();
        assert!(xml.contains(
            "schemeAgencyName=\"PE:SUNAT\" schemeID=\"6\" schemeName=\"Documento de Identidad\""
        ));
        assert!(xml.contains("schemeID=\"1\""));
        assert!(xml.contains("<cbc:RegistrationName>María Quispe</cbc:RegistrationName>"));
        assert!(xml.contains("<cbc:Name>Andina Store</cbc:Name>"));
        assert!(xml.contains("<cbc:ID>150116</cbc:ID>"));
    }

    #[test]
    fn line_description_is_cut_at_control_chars() {
        let mut record = sample_record("B001");
        record.lines[0].description = "Cuaderno A4\tcolor azul".to_string();
        let xml = to_invoice_xml(&sample_emitter(), &record).unwrap();
        assert!(xml.contains("<cbc:Description>Cuaderno A4</cbc:Description>"));
    }

    #[test]
    fn output_is_one_line() {
        let xml = to_invoice_xml(&sample_emitter(), &sample_record("B001")).unwrap();
        assert!(!xml.contains('\n'));
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    }
}
