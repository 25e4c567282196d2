//! SUNAT catalog codes used on CPE documents.
//!
//! Only the subsets this crate emits are modeled; the catalog numbers refer
//! to the annexes of R.S. 097-2012/SUNAT and its amendments.

use serde::{Deserialize, Serialize};

use super::types::DocumentKind;

/// Agency name stamped on every SUNAT-codified attribute.
pub const AGENCY_SUNAT: &str = "PE:SUNAT";

/// Catálogo 51 operation type for domestic sales (venta interna).
pub const OPERATION_DOMESTIC_SALE: &str = "0101";

/// Catálogo 07 affectation code for IGV-taxed operations (gravado).
pub const IGV_AFFECTATION_TAXED: &str = "10";

/// Catálogo 16 price type for prices that already include IGV.
pub const PRICE_TYPE_UNIT_WITH_TAX: &str = "01";

/// Catálogo 05 tax identifiers for IGV.
pub const TAX_SCHEME_IGV_ID: &str = "1000";
pub const TAX_SCHEME_IGV_NAME: &str = "IGV";
pub const TAX_SCHEME_IGV_TYPE: &str = "VAT";

/// UN/ECE 5153 duty/tax/fee list, stamped as schemeID on TaxScheme/ID.
pub const TAX_SCHEME_UNECE_5153: &str = "UN/ECE 5153";

/// schemeName companion on TaxScheme/ID.
pub const TAX_SCHEME_NAME_LIST: &str = "Codigo de tributos";

/// Official catalog URIs referenced from list/scheme attributes.
pub mod list_uri {
    pub const CATALOG_01: &str = "urn:pe:gob:sunat:cpe:see:gem:catalogos:catalogo01";
    pub const CATALOG_06: &str = "urn:pe:gob:sunat:cpe:see:gem:catalogos:catalogo06";
    pub const CATALOG_07: &str = "urn:pe:gob:sunat:cpe:see:gem:catalogos:catalogo07";
    pub const CATALOG_09: &str = "urn:pe:gob:sunat:cpe:see:gem:catalogos:catalogo09";
    pub const CATALOG_16: &str = "urn:pe:gob:sunat:cpe:see:gem:catalogos:catalogo16";
    pub const CATALOG_51: &str = "urn:pe:gob:sunat:cpe:see:gem:catalogos:catalogo51";
}

/// Catálogo 01: document type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentTypeCode {
    /// 01: factura.
    Factura,
    /// 03: boleta de venta.
    Boleta,
    /// 07: nota de crédito.
    CreditNote,
}

impl DocumentTypeCode {
    /// Two-digit catálogo 01 code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Factura => "01",
            Self::Boleta => "03",
            Self::CreditNote => "07",
        }
    }

    /// Parse from a catálogo 01 code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "01" => Some(Self::Factura),
            "03" => Some(Self::Boleta),
            "07" => Some(Self::CreditNote),
            _ => None,
        }
    }

    /// Type code for a document kind under a given series.
    ///
    /// Credit notes are `07` regardless of series. Sales split on the series
    /// prefix: an `F`-series is a factura, everything else a boleta.
    pub fn for_series(kind: DocumentKind, series: &str) -> Self {
        match kind {
            DocumentKind::CreditNote => Self::CreditNote,
            DocumentKind::Invoice => {
                if series.starts_with('F') {
                    Self::Factura
                } else {
                    Self::Boleta
                }
            }
        }
    }
}

/// Catálogo 06: identity document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentityDocType {
    /// 1: DNI (documento nacional de identidad).
    Dni,
    /// 4: carnet de extranjería.
    ForeignerCard,
    /// 6: RUC.
    Ruc,
    /// 7: pasaporte.
    Passport,
}

impl IdentityDocType {
    /// Single-digit catálogo 06 code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Dni => "1",
            Self::ForeignerCard => "4",
            Self::Ruc => "6",
            Self::Passport => "7",
        }
    }

    /// Parse from a catálogo 06 code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Self::Dni),
            "4" => Some(Self::ForeignerCard),
            "6" => Some(Self::Ruc),
            "7" => Some(Self::Passport),
            _ => None,
        }
    }

    /// Parse from the labels record stores commonly carry. Unknown labels
    /// fall back to DNI, matching how walk-in sales are captured.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "CE" | "CARNET" => Self::ForeignerCard,
            "RUC" => Self::Ruc,
            "PASAPORTE" | "PASSPORT" => Self::Passport,
            _ => Self::Dni,
        }
    }
}

/// Catálogo 09: credit note reason codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditNoteReason {
    /// 01: anulación de la operación.
    Annulment,
    /// 02: anulación por error en el RUC.
    RucError,
    /// 03: corrección por error en la descripción.
    DescriptionError,
    /// 04: descuento global.
    GlobalDiscount,
    /// 05: descuento por ítem.
    ItemDiscount,
    /// 06: devolución total.
    TotalReturn,
    /// 07: devolución por ítem.
    ItemReturn,
    /// 08: bonificación.
    Bonus,
    /// 09: disminución en el valor.
    ValueDecrease,
    /// 10: otros conceptos.
    Other,
}

impl CreditNoteReason {
    /// Two-digit catálogo 09 code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Annulment => "01",
            Self::RucError => "02",
            Self::DescriptionError => "03",
            Self::GlobalDiscount => "04",
            Self::ItemDiscount => "05",
            Self::TotalReturn => "06",
            Self::ItemReturn => "07",
            Self::Bonus => "08",
            Self::ValueDecrease => "09",
            Self::Other => "10",
        }
    }

    /// Parse from a catálogo 09 code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "01" => Some(Self::Annulment),
            "02" => Some(Self::RucError),
            "03" => Some(Self::DescriptionError),
            "04" => Some(Self::GlobalDiscount),
            "05" => Some(Self::ItemDiscount),
            "06" => Some(Self::TotalReturn),
            "07" => Some(Self::ItemReturn),
            "08" => Some(Self::Bonus),
            "09" => Some(Self::ValueDecrease),
            "10" => Some(Self::Other),
            _ => None,
        }
    }
}
