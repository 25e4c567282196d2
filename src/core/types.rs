use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::catalog::{CreditNoteReason, DocumentTypeCode, IdentityDocType};

/// The issuing company, as registered with SUNAT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Emitter {
    /// 11-digit RUC of the issuer.
    pub ruc: String,
    /// Registered legal name (razón social).
    pub legal_name: String,
    /// Commercial name, if distinct from the legal name.
    pub trade_name: Option<String>,
    /// Fiscal address as one line.
    pub address: String,
    /// INEI ubigeo code (e.g. "150101" for Lima).
    pub ubigeo: String,
}

impl Emitter {
    pub fn new(
        ruc: impl Into<String>,
        legal_name: impl Into<String>,
        address: impl Into<String>,
        ubigeo: impl Into<String>,
    ) -> Self {
        Self {
            ruc: ruc.into(),
            legal_name: legal_name.into(),
            trade_name: None,
            address: address.into(),
            ubigeo: ubigeo.into(),
        }
    }

    pub fn with_trade_name(mut self, name: impl Into<String>) -> Self {
        self.trade_name = Some(name.into());
        self
    }

    /// Name shown in the supplier `PartyName` block. Falls back to the
    /// legal name when no commercial name is registered.
    pub fn display_name(&self) -> &str {
        self.trade_name.as_deref().unwrap_or(&self.legal_name)
    }
}

/// Which statutory document a record represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentKind {
    /// Sale document: boleta de venta or factura, split by series prefix.
    Invoice,
    /// Nota de crédito referencing a previously issued document.
    CreditNote,
}

impl DocumentKind {
    /// Catálogo 01 type code for this kind under the given series.
    ///
    /// Credit notes are always `07`. For sales the series prefix decides:
    /// `F`-series is a factura (`01`), anything else a boleta (`03`).
    pub fn type_code(&self, series: &str) -> DocumentTypeCode {
        DocumentTypeCode::for_series(*self, series)
    }
}

/// The customer a document is issued to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Buyer {
    /// Catálogo 06 identity document type.
    pub doc_type: IdentityDocType,
    /// Identity document number (DNI, RUC, ...).
    pub doc_number: String,
    /// Registered or personal name.
    pub name: String,
}

impl Buyer {
    pub fn new(
        doc_type: IdentityDocType,
        doc_number: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            doc_type,
            doc_number: doc_number.into(),
            name: name.into(),
        }
    }

    /// Natural person identified by DNI (the boleta common case).
    pub fn dni(doc_number: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(IdentityDocType::Dni, doc_number, name)
    }

    /// Company identified by RUC (required for facturas).
    pub fn ruc(doc_number: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(IdentityDocType::Ruc, doc_number, name)
    }
}

/// One sale line. All money fields are tax-inclusive; the builder derives
/// the IGV-exclusive values itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// Item description as shown on the document.
    pub description: String,
    /// Quantity sold (must be positive).
    pub quantity: Decimal,
    /// Unit price including IGV (must be positive).
    pub unit_price: Decimal,
    /// Line subtotal including IGV (quantity * unit_price as charged).
    pub subtotal: Decimal,
    /// UN/ECE Rec 20 unit code ("NIU" for units, "KGM" for kilograms, ...).
    pub unit_code: String,
    /// Seller's item identifier, if any.
    pub sku: Option<String>,
}

impl LineItem {
    /// A quantity-of-units line with the default "NIU" unit code.
    pub fn new(
        description: impl Into<String>,
        quantity: Decimal,
        unit_price: Decimal,
        subtotal: Decimal,
    ) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
            subtotal,
            unit_code: "NIU".to_string(),
            sku: None,
        }
    }
}

/// Reference from a credit note to the document it modifies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditNoteRef {
    /// Series of the referenced document (e.g. "B001").
    pub series: String,
    /// Zero-padded correlative of the referenced document.
    pub number: String,
    /// Catálogo 09 response code (e.g. "07" for per-item return).
    pub reason_code: String,
    /// Free-text reason shown on the note.
    pub reason: String,
}

impl CreditNoteRef {
    /// Reference with a typed catálogo 09 reason.
    pub fn new(
        series: impl Into<String>,
        number: impl Into<String>,
        reason: CreditNoteReason,
        description: impl Into<String>,
    ) -> Self {
        Self {
            series: series.into(),
            number: number.into(),
            reason_code: reason.code().to_string(),
            reason: description.into(),
        }
    }
}

/// Lifecycle state of a record with respect to the tax authority.
///
/// `Pending` and `Error` records are eligible for (re)transmission, so a
/// scheduled sweep keeps retrying failed records. `Rejected`, `Sent` and
/// `Accepted` are settled; they need an explicit transition back to
/// `Pending` by the record store before the engine touches them again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransmissionState {
    /// Not yet transmitted, or re-queued for another attempt.
    Pending,
    /// Accepted for processing but no receipt on hand (ticketed).
    Sent,
    /// Accepted with a receipt (CDR) persisted locally.
    Accepted,
    /// Definitively rejected by the authority.
    Rejected,
    /// A transport-level failure was recorded against the record.
    Error,
}

impl TransmissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Sent => "SENT",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::Error => "ERROR",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(Self::Pending),
            "SENT" => Some(Self::Sent),
            "ACCEPTED" => Some(Self::Accepted),
            "REJECTED" => Some(Self::Rejected),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }

    /// Whether a record in this state may be handed to the transmission
    /// engine.
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Pending | Self::Error)
    }
}

impl Default for TransmissionState {
    fn default() -> Self {
        Self::Pending
    }
}

/// The slice of a sales record the engine writes back after an attempt.
///
/// The record itself lives in the caller's store; the engine only ever
/// reads the business fields and writes this block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transmission {
    /// Current lifecycle state.
    pub state: TransmissionState,
    /// When the last attempt that produced an outcome finished.
    pub transmitted_at: Option<DateTime<Utc>>,
    /// Last authority or relay message, verbatim.
    pub message: Option<String>,
    /// Authority/relay status code ("0", "200", "Client.0111", ...).
    pub state_code: Option<String>,
    /// Classification of the last failure; cleared on success.
    pub error_class: Option<ErrorClass>,
    /// Relay-assigned external identifier, if any.
    pub external_id: Option<String>,
    /// Content digest of the signed document (base64).
    pub digest: Option<String>,
    /// Where the signed XML was persisted.
    pub xml_path: Option<PathBuf>,
    /// Where the receipt (CDR) was persisted.
    pub receipt_path: Option<PathBuf>,
}

/// A sales record as handed to the engine by the record store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Document series (e.g. "B001", "F001", "BC01").
    pub series: String,
    /// Correlative within the series, zero-padded to 8 digits.
    pub number: String,
    /// Boleta/factura or nota de crédito.
    pub kind: DocumentKind,
    /// Issue timestamp in local business time.
    pub issued_at: NaiveDateTime,
    /// ISO 4217 currency ("PEN" unless stated otherwise).
    pub currency_code: String,
    /// Customer the document is issued to.
    pub buyer: Buyer,
    /// Sale lines, tax-inclusive.
    pub lines: Vec<LineItem>,
    /// Grand total including IGV, as charged.
    pub total: Decimal,
    /// Required when `kind` is `CreditNote`, absent otherwise.
    pub credit_note_ref: Option<CreditNoteRef>,
    /// Engine write-back block.
    pub transmission: Transmission,
}

impl InvoiceRecord {
    /// Catálogo 01 type code for this record.
    pub fn type_code(&self) -> DocumentTypeCode {
        self.kind.type_code(&self.series)
    }
}

/// Coarse classification of a failed outcome, persisted on the record so
/// operators can tell a definitive rejection from a flaky wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorClass {
    /// The authority (or the relay on its behalf) rejected the document.
    AuthorityFault,
    /// The HTTP exchange completed but with a non-success status.
    TransportHttp,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorityFault => "AUTHORITY_FAULT",
            Self::TransportHttp => "TRANSPORT_HTTP",
        }
    }
}

/// Uniform result of one submission attempt, whichever transport ran it.
///
/// A failed outcome is a definitive answer from the remote side. Unknown
/// outcomes (connect failures, timeouts) are never represented here; they
/// surface as [`CpeError::Transport`](crate::core::error::CpeError).
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    /// Whether the document was accepted for processing.
    pub success: bool,
    /// Authority or relay status code, when one was reported.
    pub state_code: Option<String>,
    /// Human-readable message, verbatim from the remote side.
    pub message: String,
    /// Receipt (CDR) XML bytes, when the remote side returned one.
    pub receipt: Option<Vec<u8>>,
    /// Relay-assigned external identifier, when one was reported.
    pub external_id: Option<String>,
    /// Content digest of the signed document, when one was reported.
    pub digest: Option<String>,
    /// Failure classification; `None` on success.
    pub error_class: Option<ErrorClass>,
}

impl SubmissionOutcome {
    /// Successful outcome with an optional receipt.
    pub fn accepted(message: impl Into<String>, receipt: Option<Vec<u8>>) -> Self {
        Self {
            success: true,
            state_code: None,
            message: message.into(),
            receipt,
            external_id: None,
            digest: None,
            error_class: None,
        }
    }

    /// The authority answered and said no.
    pub fn authority_fault(code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            state_code: code,
            message: message.into(),
            receipt: None,
            external_id: None,
            digest: None,
            error_class: Some(ErrorClass::AuthorityFault),
        }
    }

    /// The HTTP exchange completed with a non-success status.
    pub fn transport_http(status: u16, message: impl Into<String>) -> Self {
        Self {
            success: false,
            state_code: Some(status.to_string()),
            message: message.into(),
            receipt: None,
            external_id: None,
            digest: None,
            error_class: Some(ErrorClass::TransportHttp),
        }
    }

    pub fn with_state_code(mut self, code: impl Into<String>) -> Self {
        self.state_code = Some(code.into());
        self
    }

    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }

    pub fn with_digest(mut self, digest: impl Into<String>) -> Self {
        self.digest = Some(digest.into());
        self
    }
}
