use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::catalog::DocumentTypeCode;
use super::types::InvoiceRecord;

/// Width SUNAT correlatives are zero-padded to.
pub const CORRELATIVE_WIDTH: usize = 8;

/// Pad a raw correlative to the statutory 8-digit form.
pub fn pad_correlative(number: u64) -> String {
    format!("{number:0>CORRELATIVE_WIDTH$}")
}

/// Deterministic artifact name of a document:
/// `{ruc}-{typeCode}-{series}-{number}`, e.g.
/// `20600055519-03-B001-00000042`.
///
/// The same name keys the transport file names and the local artifact
/// paths, so a record can be matched to its files from the name alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentName {
    /// Issuer RUC.
    pub ruc: String,
    /// Catálogo 01 type code.
    pub type_code: DocumentTypeCode,
    /// Document series.
    pub series: String,
    /// Zero-padded correlative.
    pub number: String,
}

impl DocumentName {
    pub fn new(
        ruc: impl Into<String>,
        type_code: DocumentTypeCode,
        series: impl Into<String>,
        number: impl Into<String>,
    ) -> Self {
        Self {
            ruc: ruc.into(),
            type_code,
            series: series.into(),
            number: number.into(),
        }
    }

    /// Name of the document a record will produce when issued by `ruc`.
    ///
    /// The correlative is re-padded defensively; records created by older
    /// store versions carry unpadded numbers.
    pub fn for_record(ruc: &str, record: &InvoiceRecord) -> Self {
        Self {
            ruc: ruc.to_string(),
            type_code: record.type_code(),
            series: record.series.clone(),
            number: format!("{:0>CORRELATIVE_WIDTH$}", record.number),
        }
    }

    /// Parse a name back from its string form. Returns `None` when the
    /// shape or the type code is not a CPE name.
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.splitn(4, '-');
        let ruc = parts.next()?;
        let code = parts.next()?;
        let series = parts.next()?;
        let number = parts.next()?;
        if ruc.len() != 11 || !ruc.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if series.is_empty() || number.is_empty() {
            return None;
        }
        Some(Self {
            ruc: ruc.to_string(),
            type_code: DocumentTypeCode::from_code(code)?,
            series: series.to_string(),
            number: number.to_string(),
        })
    }

    /// `{name}.xml`, the signed document file.
    pub fn xml_name(&self) -> String {
        format!("{self}.xml")
    }

    /// `{name}.zip`, the transport container file.
    pub fn zip_name(&self) -> String {
        format!("{self}.zip")
    }

    /// `R-{name}.xml`, the receipt (CDR) file.
    pub fn receipt_name(&self) -> String {
        format!("R-{self}.xml")
    }
}

impl fmt::Display for DocumentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.ruc,
            self.type_code.code(),
            self.series,
            self.number
        )
    }
}

/// Correlative allocator, one counter per series behind a single lock.
///
/// Concurrent issuance must never hand the same correlative to two
/// records, so allocation goes through this instead of a read-compute-
/// write against the store.
#[derive(Debug, Default)]
pub struct SeriesAllocator {
    counters: Mutex<HashMap<String, u64>>,
}

impl SeriesAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a series from the highest correlative already issued. Later
    /// seeds only ever move the counter forward.
    pub fn seed(&self, series: &str, last_issued: u64) {
        let mut counters = lock_counters(&self.counters);
        let entry = counters.entry(series.to_string()).or_insert(0);
        if last_issued > *entry {
            *entry = last_issued;
        }
    }

    /// Allocate the next correlative for a series, zero-padded.
    pub fn allocate(&self, series: &str) -> String {
        let mut counters = lock_counters(&self.counters);
        let entry = counters.entry(series.to_string()).or_insert(0);
        *entry += 1;
        pad_correlative(*entry)
    }

    /// Next correlative that `allocate` would hand out, without consuming.
    pub fn peek(&self, series: &str) -> String {
        let counters = lock_counters(&self.counters);
        pad_correlative(counters.get(series).copied().unwrap_or(0) + 1)
    }
}

fn lock_counters(
    counters: &Mutex<HashMap<String, u64>>,
) -> std::sync::MutexGuard<'_, HashMap<String, u64>> {
    // A poisoned lock only means another thread panicked mid-allocation;
    // the map itself is still consistent.
    counters.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
