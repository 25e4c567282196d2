//! Submission transports.
//!
//! Two strategies reach SUNAT:
//!
//! * [`soap`] talks to the authority's `billService` directly. The caller
//!   signs locally, the document travels zipped inside a SOAP envelope,
//!   and the receipt (CDR) comes back in the same exchange.
//! * [`rest`] goes through a PSE relay (MiPSE). The relay signs on our
//!   behalf in one call and forwards to SUNAT in a second, with a token
//!   handshake in front and a status-query endpoint for recovery.
//!
//! [`Transport`] is the strategy selector: configured once, then every
//! submission goes through [`Transport::submit`] regardless of which side
//! does the signing.

pub mod container;
pub mod rest;
pub mod soap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

pub use container::{pack_xml, unpack_receipt};
pub use rest::{RelayClient, RelayConfig, RelayQuery, RemoteSigned, default_duplicate_phrases};
pub use soap::{
    DirectClient, ReceiptStatus, SolCredentials, SunatEnvironment, parse_receipt_status,
};

use crate::core::{CpeError, DocumentName, SubmissionOutcome};
use crate::sign::Signer;

/// Transport strategy, selected once at configuration time.
#[derive(Debug)]
pub enum Transport {
    /// Local signature, direct SOAP submission.
    Direct {
        client: DirectClient,
        signer: Signer,
    },
    /// Relay-performed signature and submission.
    Relay(RelayClient),
}

/// What one transport attempt produced: the definitive outcome plus the
/// signed bytes that were submitted.
#[derive(Debug)]
pub struct Submission {
    pub outcome: SubmissionOutcome,
    pub signed_xml: Vec<u8>,
}

impl Transport {
    /// Sign and submit one document.
    ///
    /// Network-level failures propagate as
    /// [`CpeError::Transport`](crate::core::CpeError) without an outcome,
    /// so the caller never mistakes an unobserved result for a rejection.
    pub async fn submit(
        &self,
        name: &DocumentName,
        unsigned_xml: &str,
    ) -> Result<Submission, CpeError> {
        match self {
            Self::Direct { client, signer } => {
                let signed = signer.sign(unsigned_xml)?;
                let outcome = client.send_bill(name, signed.xml.as_bytes()).await?;
                Ok(Submission {
                    outcome: outcome.with_digest(signed.digest),
                    signed_xml: signed.xml.into_bytes(),
                })
            }
            Self::Relay(client) => {
                let remote = client.sign_remote(name, unsigned_xml.as_bytes()).await?;
                let mut outcome = client.submit_with_recovery(name, &remote.xml).await?;
                if let Some(digest) = remote.digest {
                    outcome = outcome.with_digest(digest);
                }
                if let Some(external_id) = remote.external_id {
                    outcome = outcome.with_external_id(external_id);
                }
                Ok(Submission {
                    outcome,
                    signed_xml: remote.xml,
                })
            }
        }
    }

    /// Status lookup by artifact name. Only the relay exposes one; the
    /// direct service answers exclusively at submission time.
    pub async fn query(&self, name: &DocumentName) -> Result<RelayQuery, CpeError> {
        match self {
            Self::Direct { .. } => Err(CpeError::Transport(
                "the direct SOAP service has no status-query operation".into(),
            )),
            Self::Relay(client) => client.query(name).await,
        }
    }

    /// Whether [`Transport::query`] can answer on this strategy.
    pub fn supports_query(&self) -> bool {
        matches!(self, Self::Relay(_))
    }
}

/// Decode base64 that may arrive wrapped across lines or padded with
/// whitespace, as both SOAP bodies and relay JSON tend to deliver it.
pub(crate) fn decode_b64(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = value.split_whitespace().collect();
    BASE64.decode(compact)
}

/// Byte-bounded cut that never splits a UTF-8 sequence.
pub(crate) fn truncate_body(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_with_line_wraps_decodes() {
        assert_eq!(decode_b64("aGVs\nbG8=").unwrap(), b"hello");
        assert_eq!(decode_b64("  aGVsbG8=  ").unwrap(), b"hello");
        assert!(decode_b64("not base64!").is_err());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "ñ".repeat(150);
        let cut = truncate_body(&text, 200);
        assert!(cut.len() <= 200);
        assert!(cut.chars().all(|c| c == 'ñ'));
        assert_eq!(truncate_body("short", 200), "short");
    }
}
