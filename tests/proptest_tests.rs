//! Property-based tests and edge case tests for the comprobante crate.
//!
//! Run with: `cargo test --features all --test proptest_tests`

#![cfg(feature = "ubl")]

use chrono::{NaiveDate, NaiveDateTime};
use comprobante::core::*;
use comprobante::ubl::{self, format_decimal};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn issued() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, 14)
        .unwrap()
        .and_hms_opt(10, 30, 0)
        .unwrap()
}

fn emitter() -> Emitter {
    Emitter::new(
        "20601234561",
        "COMERCIAL ANDINA S.A.C.",
        "Av. Arequipa 1250, Lince",
        "150116",
    )
}

/// Build a valid boleta carrying the given lines.
fn build_boleta(lines: &[(String, Decimal, Decimal)]) -> InvoiceRecord {
    let mut builder = RecordBuilder::new("B001", "00000042", issued())
        .buyer(Buyer::dni("45871236", "María Quispe"));
    for (description, quantity, unit_price) in lines {
        builder = builder.line(description.clone(), *quantity, *unit_price);
    }
    builder.build().unwrap()
}

// ── Proptest Strategies ─────────────────────────────────────────────────────

/// Tax-inclusive price from 0.01 to 999999.99, always two decimals.
fn arb_price() -> impl Strategy<Value = Decimal> {
    (1u64..100_000_000u64).prop_map(|cents| Decimal::new(cents as i64, 2))
}

/// Whole-unit quantity from 1 to 999.
fn arb_quantity() -> impl Strategy<Value = Decimal> {
    (1u32..=999u32).prop_map(Decimal::from)
}

/// Item description over an alphabet free of XML metacharacters, so the
/// raw text can be searched for in the serialized document.
fn arb_description() -> impl Strategy<Value = String> {
    "[A-Za-z0-9][A-Za-z0-9 áéíóúñ]{0,38}"
}

/// One sale line as (description, quantity, tax-inclusive unit price).
fn arb_line() -> impl Strategy<Value = (String, Decimal, Decimal)> {
    (arb_description(), arb_quantity(), arb_price())
}

/// 1 to 8 sale lines.
fn arb_lines() -> impl Strategy<Value = Vec<(String, Decimal, Decimal)>> {
    prop::collection::vec(arb_line(), 1..=8)
}

/// Any catálogo 01 type code this pipeline issues.
fn arb_type_code() -> impl Strategy<Value = DocumentTypeCode> {
    prop_oneof![
        Just(DocumentTypeCode::Factura),
        Just(DocumentTypeCode::Boleta),
        Just(DocumentTypeCode::CreditNote),
    ]
}

// ── Property Tests ──────────────────────────────────────────────────────────

proptest! {
    /// Derived base plus derived IGV reconstructs any two-decimal
    /// inclusive amount exactly; the split never loses a cent.
    #[test]
    fn igv_split_reconstructs_the_inclusive_amount(cents in 1u64..100_000_000u64) {
        let inclusive = Decimal::new(cents as i64, 2);
        let base = net_of_igv(inclusive);
        let tax = igv_portion(inclusive);
        prop_assert!(base > Decimal::ZERO);
        prop_assert!(tax >= Decimal::ZERO);
        prop_assert_eq!(base + tax, inclusive);
    }

    /// Without an explicit override the grand total is exactly the sum
    /// of line subtotals, and the built record validates clean.
    #[test]
    fn builder_total_matches_the_line_sum(lines in arb_lines()) {
        let record = build_boleta(&lines);
        let sum: Decimal = record.lines.iter().map(|l| l.subtotal).sum();
        prop_assert_eq!(record.total, sum);
        prop_assert!(validate_record(&record).is_empty());
    }

    /// Records survive a JSON round trip with amounts and text intact.
    #[test]
    fn record_round_trips_through_json(lines in arb_lines()) {
        let record = build_boleta(&lines);
        let json = serde_json::to_string(&record).unwrap();
        let parsed: InvoiceRecord = serde_json::from_str(&json).unwrap();

        prop_assert_eq!(&parsed.series, &record.series);
        prop_assert_eq!(parsed.issued_at, record.issued_at);
        prop_assert_eq!(parsed.total, record.total);
        prop_assert_eq!(parsed.lines.len(), record.lines.len());
        for (a, b) in parsed.lines.iter().zip(&record.lines) {
            prop_assert_eq!(&a.description, &b.description);
            prop_assert_eq!(a.quantity, b.quantity);
            prop_assert_eq!(a.unit_price, b.unit_price);
            prop_assert_eq!(a.subtotal, b.subtotal);
        }
    }

    /// Document names parse back from their string form unchanged.
    #[test]
    fn document_name_round_trips(
        ruc in "[12]0[0-9]{9}",
        type_code in arb_type_code(),
        series in "[A-Z][A-Z0-9]{2,3}",
        number in 1u64..=99_999_999u64,
    ) {
        let name = DocumentName::new(ruc, type_code, series, pad_correlative(number));
        prop_assert_eq!(DocumentName::parse(&name.to_string()), Some(name));
    }

    /// Padded correlatives always carry the statutory eight digits and
    /// decode back to the number they were made from.
    #[test]
    fn correlatives_pad_to_eight_digits(number in 0u64..=99_999_999u64) {
        let padded = pad_correlative(number);
        prop_assert_eq!(padded.len(), 8);
        prop_assert!(padded.bytes().all(|b| b.is_ascii_digit()));
        prop_assert_eq!(padded.parse::<u64>().unwrap(), number);
    }

    /// Formatted amounts keep at least two decimals and parse back to
    /// the value they came from.
    #[test]
    fn formatted_amounts_parse_back(cents in 1u64..100_000_000u64) {
        let amount = Decimal::new(cents as i64, 2);
        let formatted = format_decimal(amount);
        let decimals = formatted.split('.').nth(1).map(str::len).unwrap_or(0);
        prop_assert!(decimals >= 2, "too few decimals in {}", formatted);
        prop_assert_eq!(formatted.parse::<Decimal>().unwrap(), amount);
    }

    /// Built documents are single-line XML carrying one InvoiceLine per
    /// record line and every description verbatim.
    #[test]
    fn built_xml_is_single_line_and_complete(lines in arb_lines()) {
        let record = build_boleta(&lines);
        let artifact = ubl::build(&emitter(), &record).unwrap();

        prop_assert!(artifact.xml.starts_with("<?xml"));
        prop_assert!(!artifact.xml.contains('\n'));
        prop_assert_eq!(
            artifact.xml.matches("<cac:InvoiceLine>").count(),
            lines.len()
        );
        for (description, _, _) in &lines {
            prop_assert!(artifact.xml.contains(description.as_str()));
        }
    }

    /// Document-level monetary elements derive from the grand total: the
    /// serialized base, IGV and payable amounts are the formatted split.
    #[test]
    fn document_totals_derive_from_the_grand_total(lines in arb_lines()) {
        let record = build_boleta(&lines);
        let artifact = ubl::build(&emitter(), &record).unwrap();

        let base = format_decimal(net_of_igv(record.total));
        let tax = format_decimal(igv_portion(record.total));
        let inclusive = format_decimal(record.total);
        let base_elem = format!(
            "<cbc:LineExtensionAmount currencyID=\"PEN\">{base}</cbc:LineExtensionAmount>"
        );
        let tax_elem = format!("<cbc:TaxAmount currencyID=\"PEN\">{tax}</cbc:TaxAmount>");
        let inclusive_elem = format!(
            "<cbc:TaxInclusiveAmount currencyID=\"PEN\">{inclusive}</cbc:TaxInclusiveAmount>"
        );
        let payable_elem =
            format!("<cbc:PayableAmount currencyID=\"PEN\">{inclusive}</cbc:PayableAmount>");
        prop_assert!(artifact.xml.contains(&base_elem));
        prop_assert!(artifact.xml.contains(&tax_elem));
        prop_assert!(artifact.xml.contains(&inclusive_elem));
        prop_assert!(artifact.xml.contains(&payable_elem));
    }
}

// ── Edge Case Tests ─────────────────────────────────────────────────────────

// --- Unicode text ---

#[test]
fn unicode_buyer_and_item_text() {
    let scenarios = [
        ("日本語商店", "383 piezas 寿司セット"), // CJK
        ("Müller und Söhne", "Törtchen im Überkarton"), // Umlauts
        ("شركة عربية", "قلم حبر"),             // RTL Arabic
        ("María-José Ñahui", "Ñandú de peluche"), // Spanish
    ];

    for (buyer_name, description) in scenarios {
        let record = RecordBuilder::new("B001", "00000042", issued())
            .buyer(Buyer::dni("45871236", buyer_name))
            .line(description, dec!(1), dec!(10.00))
            .build()
            .unwrap();
        let artifact = ubl::build(&emitter(), &record).unwrap();
        assert!(
            artifact.xml.contains(buyer_name),
            "buyer name missing for {buyer_name}"
        );
        assert!(
            artifact.xml.contains(description),
            "description missing for {description}"
        );
    }
}

// --- Line count ceiling ---

#[test]
fn ten_thousand_lines_is_the_ceiling() {
    let mut builder = RecordBuilder::new("B001", "00000042", issued())
        .buyer(Buyer::dni("45871236", "María Quispe"));
    for _ in 0..10_000 {
        builder = builder.line("Item", dec!(1), dec!(1.00));
    }
    let record = builder.build().unwrap();
    assert_eq!(record.total, dec!(10000.00));
}

#[test]
fn over_ten_thousand_lines_is_rejected() {
    let mut builder = RecordBuilder::new("B001", "00000042", issued())
        .buyer(Buyer::dni("45871236", "María Quispe"));
    for _ in 0..10_001 {
        builder = builder.line("Item", dec!(1), dec!(1.00));
    }
    let err = builder.build().unwrap_err();
    assert!(err.to_string().contains("10,000 lines"));
}

// --- Hostile text ---

#[test]
fn leading_control_character_empties_the_description() {
    // The raw record text passes validation (trimmed it is non-empty),
    // but the serialized form cuts at the first control character.
    let record = RecordBuilder::new("B001", "00000042", issued())
        .buyer(Buyer::dni("45871236", "María Quispe"))
        .line("\ntodo en la segunda línea", dec!(1), dec!(10.00))
        .build()
        .unwrap();
    let artifact = ubl::build(&emitter(), &record).unwrap();
    assert!(
        artifact
            .xml
            .contains("<cbc:Description></cbc:Description>")
    );
    assert!(!artifact.xml.contains('\n'));
}

#[test]
fn very_long_description_passes_through() {
    let long = "á".repeat(500);
    let record = RecordBuilder::new("B001", "00000042", issued())
        .buyer(Buyer::dni("45871236", "María Quispe"))
        .line(long.clone(), dec!(1), dec!(10.00))
        .build()
        .unwrap();
    let artifact = ubl::build(&emitter(), &record).unwrap();
    assert!(artifact.xml.contains(&long));
}

// --- Degenerate amounts ---

#[test]
fn one_cent_sale_splits_to_zero_tax() {
    assert_eq!(net_of_igv(dec!(0.01)), dec!(0.01));
    assert_eq!(igv_portion(dec!(0.01)), dec!(0.00));

    let record = RecordBuilder::new("B001", "00000042", issued())
        .buyer(Buyer::dni("45871236", "María Quispe"))
        .line("Bolsa", dec!(1), dec!(0.01))
        .build()
        .unwrap();
    let artifact = ubl::build(&emitter(), &record).unwrap();
    assert!(
        artifact
            .xml
            .contains("<cbc:TaxInclusiveAmount currencyID=\"PEN\">0.01</cbc:TaxInclusiveAmount>")
    );
}

#[test]
fn large_amounts_keep_their_precision() {
    let record = RecordBuilder::new("F001", "00000105", issued())
        .buyer(Buyer::ruc("20518823429", "DISTRIBUIDORA NORTE S.R.L."))
        .line("Lote mayorista", dec!(999), dec!(999999.99))
        .build()
        .unwrap();
    assert_eq!(record.total, dec!(998999990.01));
    let artifact = ubl::build(&emitter(), &record).unwrap();
    assert!(artifact.xml.contains("998999990.01"));
}
