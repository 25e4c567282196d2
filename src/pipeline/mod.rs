//! Submission pipeline: build, sign, submit, reconcile.
//!
//! [`Processor`] runs one record end to end and writes the result back
//! into the record's transmission block. Submission is guarded per
//! document name, so a scheduled sweep and a manual "send now" cannot
//! race on the same record; only `Pending` and `Error` records are
//! accepted, settled ones must be re-queued explicitly.
//!
//! An observed remote answer, acceptance or rejection, always lands on
//! the record. A network-level failure does not: the remote outcome was
//! not observed, so the record keeps its prior state and the error
//! propagates to the caller.

mod artifacts;

pub use artifacts::ArtifactStore;

use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;

use chrono::Utc;

use crate::core::{
    CpeError, DocumentName, Emitter, ErrorClass, InvoiceRecord, SubmissionOutcome,
    TransmissionState, validate_emitter, validate_record,
};
use crate::transport::{Submission, Transport, parse_receipt_status, unpack_receipt};
use crate::ubl;

/// Per-document advisory locks for the duration of a submission attempt.
#[derive(Debug, Default)]
struct InFlightSet {
    names: Mutex<HashSet<String>>,
}

impl InFlightSet {
    fn claim(&self, name: &DocumentName) -> Result<InFlightGuard<'_>, CpeError> {
        let key = name.to_string();
        let mut names = lock_names(&self.names);
        if !names.insert(key.clone()) {
            return Err(CpeError::InFlight(format!(
                "document {key} is already being transmitted"
            )));
        }
        Ok(InFlightGuard { set: self, key })
    }
}

#[derive(Debug)]
struct InFlightGuard<'a> {
    set: &'a InFlightSet,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        lock_names(&self.set.names).remove(&self.key);
    }
}

fn lock_names(names: &Mutex<HashSet<String>>) -> std::sync::MutexGuard<'_, HashSet<String>> {
    // A poisoned lock only means another task panicked mid-claim; the
    // set itself is still consistent.
    names.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Counts from one [`Processor::sweep`] pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub attempted: usize,
    pub accepted: usize,
    pub sent: usize,
    pub rejected: usize,
    pub errored: usize,
    pub skipped: usize,
}

impl fmt::Display for SweepSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "attempted {}, accepted {}, sent {}, rejected {}, errored {}, skipped {}",
            self.attempted, self.accepted, self.sent, self.rejected, self.errored, self.skipped
        )
    }
}

/// End-to-end processor for one emitter over one transport.
pub struct Processor {
    emitter: Emitter,
    transport: Transport,
    store: ArtifactStore,
    in_flight: InFlightSet,
}

impl Processor {
    pub fn new(emitter: Emitter, transport: Transport, store: ArtifactStore) -> Self {
        Self {
            emitter,
            transport,
            store,
            in_flight: InFlightSet::default(),
        }
    }

    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Process one record end to end: validate, build, sign, submit,
    /// reconcile.
    ///
    /// The outcome (or the local failure) is written into
    /// `record.transmission` before returning, except for network-level
    /// failures, which leave the record untouched and surface as
    /// [`CpeError::Transport`].
    pub async fn process(&self, record: &mut InvoiceRecord) -> Result<SubmissionOutcome, CpeError> {
        if !record.transmission.state.is_eligible() {
            return Err(CpeError::Validation(format!(
                "record {}-{} is {}, not eligible for transmission",
                record.series,
                record.number,
                record.transmission.state.as_str()
            )));
        }

        let name = DocumentName::for_record(&self.emitter.ruc, record);
        let _guard = self.in_flight.claim(&name)?;

        let mut issues = validate_emitter(&self.emitter);
        issues.extend(validate_record(record));
        if !issues.is_empty() {
            let message = issues
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            let err = CpeError::Validation(message);
            mark_local_failure(record, &err);
            return Err(err);
        }

        let artifact = match ubl::build(&self.emitter, record) {
            Ok(artifact) => artifact,
            Err(e) => {
                mark_local_failure(record, &e);
                return Err(e);
            }
        };

        let submission = match self.transport.submit(&name, &artifact.xml).await {
            Ok(submission) => submission,
            Err(e @ CpeError::Transport(_)) => {
                tracing::warn!(document = %name, error = %e, "submission did not reach an outcome");
                return Err(e);
            }
            Err(e) => {
                mark_local_failure(record, &e);
                return Err(e);
            }
        };

        Ok(self.reconcile(record, &name, submission))
    }

    /// Fold a submission into the record and persist its artifacts.
    fn reconcile(
        &self,
        record: &mut InvoiceRecord,
        name: &DocumentName,
        submission: Submission,
    ) -> SubmissionOutcome {
        let Submission {
            mut outcome,
            signed_xml,
        } = submission;

        if let Some(receipt) = outcome.receipt.clone() {
            refine_from_receipt(&mut outcome, &receipt);
        }
        fold_outcome(record, &outcome);

        // Persistence failures must not mask an observed outcome; the
        // paths stay unset and recovery refetches later.
        match self.store.store_signed(name, signed_xml.as_slice()) {
            Ok(path) => record.transmission.xml_path = Some(path),
            Err(e) => {
                tracing::error!(document = %name, error = %e, "signed document not persisted")
            }
        }
        if let Some(receipt) = outcome.receipt.as_deref() {
            match self.store.store_receipt(name, receipt) {
                Ok(path) => record.transmission.receipt_path = Some(path),
                Err(e) => tracing::error!(document = %name, error = %e, "receipt not persisted"),
            }
        }

        outcome
    }

    /// Rehydrate missing local artifacts for a record that was already
    /// submitted, by querying the relay. Signing and sending are not
    /// idempotent-safe and are never re-invoked here.
    ///
    /// Returns whether the record changed. A settled record with both
    /// artifacts on disk returns without any remote call.
    pub async fn recover(&self, record: &mut InvoiceRecord) -> Result<bool, CpeError> {
        if !matches!(
            record.transmission.state,
            TransmissionState::Sent | TransmissionState::Accepted
        ) {
            return Ok(false);
        }
        let name = DocumentName::for_record(&self.emitter.ruc, record);

        let missing_signed = !self.store.has_signed(&name);
        let missing_receipt = !self.store.has_receipt(&name);
        if !missing_signed && !missing_receipt {
            let mut changed = false;
            if record.transmission.xml_path.is_none() {
                record.transmission.xml_path = Some(self.store.xml_path(&name));
                changed = true;
            }
            if record.transmission.receipt_path.is_none() {
                record.transmission.receipt_path = Some(self.store.receipt_path(&name));
                changed = true;
            }
            return Ok(changed);
        }

        let _guard = self.in_flight.claim(&name)?;
        let lookup = self.transport.query(&name).await?;
        if !lookup.confirmed {
            return Err(CpeError::Transport(format!(
                "document {name} is not known to the relay; nothing to recover"
            )));
        }

        let mut changed = false;
        if missing_signed {
            if let Some(xml) = lookup.signed_xml.as_deref() {
                record.transmission.xml_path = Some(self.store.store_signed(&name, xml)?);
                changed = true;
            }
        }
        if missing_receipt {
            if let Some(receipt) = lookup.receipt.as_deref() {
                record.transmission.receipt_path = Some(self.store.store_receipt(&name, receipt)?);
                if record.transmission.state == TransmissionState::Sent {
                    record.transmission.state = TransmissionState::Accepted;
                }
                changed = true;
            }
        }
        if changed {
            tracing::info!(document = %name, "local artifacts rehydrated from the relay");
        }
        Ok(changed)
    }

    /// Process every eligible record in the batch, continuing past
    /// per-record failures. Settled records are counted as skipped.
    pub async fn sweep(&self, records: &mut [InvoiceRecord]) -> SweepSummary {
        let mut summary = SweepSummary::default();
        for record in records.iter_mut() {
            if !record.transmission.state.is_eligible() {
                summary.skipped += 1;
                continue;
            }
            summary.attempted += 1;
            let label = format!("{}-{}", record.series, record.number);
            match self.process(record).await {
                Ok(outcome) if outcome.success => {
                    if outcome.receipt.is_some() {
                        summary.accepted += 1;
                    } else {
                        summary.sent += 1;
                    }
                    tracing::info!(document = %label, "record transmitted");
                }
                Ok(outcome) => {
                    match outcome.error_class {
                        Some(ErrorClass::AuthorityFault) => summary.rejected += 1,
                        _ => summary.errored += 1,
                    }
                    tracing::warn!(document = %label, message = %outcome.message, "record not accepted");
                }
                Err(e) => {
                    summary.errored += 1;
                    tracing::warn!(document = %label, error = %e, "record attempt failed");
                }
            }
        }
        tracing::info!(%summary, "sweep finished");
        summary
    }
}

/// Map an outcome onto the record's transmission block.
///
/// Success with a receipt is `Accepted`; success without one is `Sent`,
/// with the receipt expected out of band. An authority fault settles the
/// record as `Rejected`; an HTTP-layer failure leaves it retryable in
/// `Error`.
fn fold_outcome(record: &mut InvoiceRecord, outcome: &SubmissionOutcome) {
    let t = &mut record.transmission;
    t.state = if outcome.success {
        if outcome.receipt.is_some() {
            TransmissionState::Accepted
        } else {
            TransmissionState::Sent
        }
    } else {
        match outcome.error_class {
            Some(ErrorClass::AuthorityFault) => TransmissionState::Rejected,
            _ => TransmissionState::Error,
        }
    };
    t.transmitted_at = Some(Utc::now());
    t.message = Some(outcome.message.clone());
    t.state_code = outcome.state_code.clone();
    t.error_class = outcome.error_class;
    // Identifiers from an earlier phase survive an outcome that does not
    // carry its own.
    if outcome.external_id.is_some() {
        t.external_id = outcome.external_id.clone();
    }
    if outcome.digest.is_some() {
        t.digest = outcome.digest.clone();
    }
}

/// A failure before any network call: recorded on the record, retryable.
fn mark_local_failure(record: &mut InvoiceRecord, error: &CpeError) {
    let t = &mut record.transmission;
    t.state = TransmissionState::Error;
    t.message = Some(error.to_string());
    t.error_class = None;
}

/// Pull the authority's own verdict out of the receipt: its description
/// and response code are more specific than the transport-level message.
/// An unreadable receipt leaves the outcome as the transport reported it.
fn refine_from_receipt(outcome: &mut SubmissionOutcome, receipt: &[u8]) {
    let Ok(xml) = unpack_receipt(receipt) else {
        return;
    };
    let Ok(text) = String::from_utf8(xml) else {
        return;
    };
    let Ok(status) = parse_receipt_status(&text) else {
        return;
    };
    if !status.description.is_empty() {
        outcome.message = status.description;
    }
    outcome.state_code = Some(status.response_code);
}
