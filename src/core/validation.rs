use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::error::ValidationIssue;
use super::types::{DocumentKind, Emitter, InvoiceRecord};

/// Validate a record before any document is built from it.
/// Returns all findings (not just the first).
///
/// An empty result means the record can be rendered; it does not promise
/// the authority will accept the document.
pub fn validate_record(record: &InvoiceRecord) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if record.series.trim().is_empty() {
        issues.push(ValidationIssue::new("series", "series must not be empty"));
    }
    if record.number.trim().is_empty() {
        issues.push(ValidationIssue::new(
            "number",
            "correlative must not be empty",
        ));
    } else if !record.number.bytes().all(|b| b.is_ascii_digit()) {
        issues.push(ValidationIssue::new(
            "number",
            "correlative must be numeric",
        ));
    }
    if record.currency_code.len() != 3 {
        issues.push(ValidationIssue::new(
            "currency_code",
            "currency must be a 3-letter ISO 4217 code",
        ));
    }

    if record.buyer.name.trim().is_empty() {
        issues.push(ValidationIssue::new("buyer.name", "buyer name is required"));
    }
    if record.buyer.doc_number.trim().is_empty() {
        issues.push(ValidationIssue::new(
            "buyer.doc_number",
            "buyer identity document number is required",
        ));
    }

    if record.lines.is_empty() {
        issues.push(ValidationIssue::new(
            "lines",
            "document must carry at least one line",
        ));
    }
    for (idx, line) in record.lines.iter().enumerate() {
        let field = |name: &str| format!("lines[{idx}].{name}");
        if line.description.trim().is_empty() {
            issues.push(ValidationIssue::new(
                field("description"),
                "description is required",
            ));
        }
        if line.quantity <= Decimal::ZERO {
            issues.push(ValidationIssue::new(
                field("quantity"),
                "quantity must be positive",
            ));
        }
        if line.unit_price <= Decimal::ZERO {
            issues.push(ValidationIssue::new(
                field("unit_price"),
                "unit price must be positive",
            ));
        }
        if line.subtotal <= Decimal::ZERO {
            issues.push(ValidationIssue::new(
                field("subtotal"),
                "line subtotal must be positive",
            ));
        }
    }

    if record.total <= Decimal::ZERO {
        issues.push(ValidationIssue::new(
            "total",
            "grand total must be positive",
        ));
    } else if !record.lines.is_empty() {
        let lines_total: Decimal = record.lines.iter().map(|l| l.subtotal).sum();
        if (lines_total - record.total).abs() > dec!(0.01) {
            issues.push(ValidationIssue::new(
                "total",
                format!(
                    "grand total {} does not match line sum {}",
                    record.total, lines_total
                ),
            ));
        }
    }

    match record.kind {
        DocumentKind::CreditNote => match &record.credit_note_ref {
            None => issues.push(ValidationIssue::new(
                "credit_note_ref",
                "credit note requires a reference to the modified document",
            )),
            Some(reference) => {
                if reference.series.trim().is_empty() || reference.number.trim().is_empty() {
                    issues.push(ValidationIssue::new(
                        "credit_note_ref",
                        "referenced series and number are required",
                    ));
                }
                if reference.reason_code.trim().is_empty() {
                    issues.push(ValidationIssue::new(
                        "credit_note_ref.reason_code",
                        "catálogo 09 reason code is required",
                    ));
                }
            }
        },
        DocumentKind::Invoice => {
            if record.credit_note_ref.is_some() {
                issues.push(ValidationIssue::new(
                    "credit_note_ref",
                    "sale documents must not carry a credit note reference",
                ));
            }
        }
    }

    issues
}

/// Validate the issuer configuration. Meant to run once at startup, before
/// the first document is built.
pub fn validate_emitter(emitter: &Emitter) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if emitter.ruc.len() != 11 || !emitter.ruc.bytes().all(|b| b.is_ascii_digit()) {
        issues.push(ValidationIssue::new("ruc", "RUC must be 11 digits"));
    }
    if emitter.legal_name.trim().is_empty() {
        issues.push(ValidationIssue::new("legal_name", "legal name is required"));
    }
    if emitter.ubigeo.len() != 6 || !emitter.ubigeo.bytes().all(|b| b.is_ascii_digit()) {
        issues.push(ValidationIssue::new("ubigeo", "ubigeo must be 6 digits"));
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::IdentityDocType;
    use crate::core::types::{Buyer, LineItem, Transmission};
    use chrono::NaiveDate;

    fn sample_record() -> InvoiceRecord {
        InvoiceRecord {
            series: "B001".to_string(),
            number: "00000042".to_string(),
            kind: DocumentKind::Invoice,
            issued_at: NaiveDate::from_ymd_opt(2025, 3, 14)
                .and_then(|d| d.and_hms_opt(10, 30, 0))
                .unwrap(),
            currency_code: "PEN".to_string(),
            buyer: Buyer {
                doc_type: IdentityDocType::Dni,
                doc_number: "45871236".to_string(),
                name: "María Quispe".to_string(),
            },
            lines: vec![LineItem::new("Cuaderno A4", dec!(2), dec!(5.90), dec!(11.80))],
            total: dec!(11.80),
            credit_note_ref: None,
            transmission: Transmission::default(),
        }
    }

    #[test]
    fn accepts_complete_record() {
        assert!(validate_record(&sample_record()).is_empty());
    }

    #[test]
    fn rejects_empty_lines_and_missing_buyer() {
        let mut record = sample_record();
        record.lines.clear();
        record.buyer.name.clear();
        let issues = validate_record(&record);
        assert!(issues.iter().any(|i| i.field == "lines"));
        assert!(issues.iter().any(|i| i.field == "buyer.name"));
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let mut record = sample_record();
        record.lines[0].quantity = Decimal::ZERO;
        record.lines[0].unit_price = dec!(-1);
        let issues = validate_record(&record);
        assert!(issues.iter().any(|i| i.field == "lines[0].quantity"));
        assert!(issues.iter().any(|i| i.field == "lines[0].unit_price"));
    }

    #[test]
    fn credit_note_requires_reference() {
        let mut record = sample_record();
        record.kind = DocumentKind::CreditNote;
        record.series = "BC01".to_string();
        let issues = validate_record(&record);
        assert!(issues.iter().any(|i| i.field == "credit_note_ref"));
    }

    #[test]
    fn total_must_match_line_sum() {
        let mut record = sample_record();
        record.total = dec!(99.00);
        let issues = validate_record(&record);
        assert!(issues.iter().any(|i| i.field == "total"));
    }

    #[test]
    fn emitter_needs_valid_ruc_and_ubigeo() {
        let emitter = Emitter::new("20123456789", "ANDINA SOFT S.A.C.", "Av. Arequipa 1250", "150101");
        assert!(validate_emitter(&emitter).is_empty());

        let bad = Emitter::new("123", "ANDINA SOFT S.A.C.", "Av. Arequipa 1250", "15-01");
        let issues = validate_emitter(&bad);
        assert!(issues.iter().any(|i| i.field == "ruc"));
        assert!(issues.iter().any(|i| i.field == "ubigeo"));
    }
}
