use chrono::NaiveDateTime;
use rust_decimal::Decimal;

use super::error::CpeError;
use super::tax::round_half_up;
use super::types::*;
use super::validation;

/// Builder for constructing valid sales records.
///
/// ```
/// use comprobante::core::*;
/// use rust_decimal_macros::dec;
/// use chrono::NaiveDate;
///
/// let issued = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap().and_hms_opt(10, 30, 0).unwrap();
/// let record = RecordBuilder::new("B001", "00000042", issued)
///     .buyer(Buyer::dni("45871236", "María Quispe"))
///     .line("Cuaderno A4", dec!(2), dec!(5.90))
///     .build()
///     .unwrap();
/// assert_eq!(record.total, dec!(11.80));
/// ```
pub struct RecordBuilder {
    series: String,
    number: String,
    kind: DocumentKind,
    issued_at: NaiveDateTime,
    currency_code: String,
    buyer: Option<Buyer>,
    lines: Vec<LineItem>,
    total: Option<Decimal>,
    credit_note_ref: Option<CreditNoteRef>,
}

impl RecordBuilder {
    pub fn new(
        series: impl Into<String>,
        number: impl Into<String>,
        issued_at: NaiveDateTime,
    ) -> Self {
        Self {
            series: series.into(),
            number: number.into(),
            kind: DocumentKind::Invoice,
            issued_at,
            currency_code: "PEN".to_string(),
            buyer: None,
            lines: Vec::new(),
            total: None,
            credit_note_ref: None,
        }
    }

    pub fn currency(mut self, code: impl Into<String>) -> Self {
        self.currency_code = code.into();
        self
    }

    pub fn buyer(mut self, buyer: Buyer) -> Self {
        self.buyer = Some(buyer);
        self
    }

    /// Append a prepared line.
    pub fn add_line(mut self, line: LineItem) -> Self {
        self.lines.push(line);
        self
    }

    /// Append a unit-count line; the subtotal is quantity times price,
    /// rounded to two decimals.
    pub fn line(
        mut self,
        description: impl Into<String>,
        quantity: Decimal,
        unit_price: Decimal,
    ) -> Self {
        let subtotal = round_half_up(quantity * unit_price);
        self.lines
            .push(LineItem::new(description, quantity, unit_price, subtotal));
        self
    }

    /// Override the grand total. Without this the builder sums the line
    /// subtotals.
    pub fn total(mut self, total: Decimal) -> Self {
        self.total = Some(total);
        self
    }

    /// Turn the record into a credit note against a previous document.
    pub fn credit_note(mut self, reference: CreditNoteRef) -> Self {
        self.kind = DocumentKind::CreditNote;
        self.credit_note_ref = Some(reference);
        self
    }

    /// Build the record, running validation.
    /// The error message carries all findings (not just the first).
    pub fn build(self) -> Result<InvoiceRecord, CpeError> {
        if self.lines.len() > 10_000 {
            return Err(CpeError::Validation(
                "document cannot have more than 10,000 lines".into(),
            ));
        }

        let record = self.assemble()?;

        let issues = validation::validate_record(&record);
        if !issues.is_empty() {
            let msg = issues
                .iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(CpeError::Validation(msg));
        }

        Ok(record)
    }

    /// Build without validation, for tests and store imports.
    pub fn build_unchecked(self) -> Result<InvoiceRecord, CpeError> {
        self.assemble()
    }

    fn assemble(self) -> Result<InvoiceRecord, CpeError> {
        let buyer = self
            .buyer
            .ok_or_else(|| CpeError::Validation("buyer is required".into()))?;
        let total = self
            .total
            .unwrap_or_else(|| self.lines.iter().map(|l| l.subtotal).sum());

        Ok(InvoiceRecord {
            series: self.series,
            number: self.number,
            kind: self.kind,
            issued_at: self.issued_at,
            currency_code: self.currency_code,
            buyer,
            lines: self.lines,
            total,
            credit_note_ref: self.credit_note_ref,
            transmission: Transmission::default(),
        })
    }
}
