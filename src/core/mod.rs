//! Core CPE types, SUNAT catalogs, IGV arithmetic, numbering, and validation.
//!
//! Everything here is pure and offline; the wire-facing modules build on
//! top of these types.

mod builder;
pub mod catalog;
mod error;
mod numbering;
mod tax;
mod types;
mod validation;

pub use builder::*;
pub use catalog::{CreditNoteReason, DocumentTypeCode, IdentityDocType};
pub use error::*;
pub use numbering::*;
pub use tax::{igv_portion, net_of_igv, round_half_up, IGV_RATE};
pub use types::*;
pub use validation::*;
