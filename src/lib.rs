//! # comprobante
//!
//! Peruvian electronic invoicing (SUNAT CPE) library covering the full
//! lifecycle: UBL 2.1 boletas, facturas and notas de crédito, enveloped
//! XML-DSig signing from a PKCS#12 bundle, direct SOAP and PSE relay
//! transports, and CDR reconciliation back into the sales record.
//!
//! All monetary values use [`rust_decimal::Decimal`]; floating point never
//! touches an amount. Prices are IGV-inclusive as charged at the counter,
//! and the builders derive the tax-exclusive figures themselves.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use comprobante::core::*;
//! use rust_decimal_macros::dec;
//!
//! let issued = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
//!     .and_hms_opt(10, 30, 0).unwrap();
//! let record = RecordBuilder::new("B001", "00000042", issued)
//!     .buyer(Buyer::dni("45871236", "María Quispe"))
//!     .line("Cuaderno A4", dec!(2), dec!(5.90))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(record.total, dec!(11.80));
//! assert_eq!(record.type_code().code(), "03");
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Record types, SUNAT catalogs, IGV arithmetic, numbering, validation |
//! | `ubl` | UBL 2.1 boleta/factura/nota de crédito XML generation |
//! | `sign` | PKCS#12 keystore, enveloped XML-DSig |
//! | `transport` | Direct SOAP (`sendBill`) and PSE relay REST clients |
//! | `pipeline` | End-to-end processor: build, sign, submit, reconcile |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "ubl")]
pub mod ubl;

#[cfg(feature = "sign")]
pub mod sign;

#[cfg(feature = "transport")]
pub mod transport;

#[cfg(feature = "pipeline")]
pub mod pipeline;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
