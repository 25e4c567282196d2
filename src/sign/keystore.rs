//! PKCS#12 keystore loading.

use std::fmt;
use std::path::Path;
use std::time::SystemTime;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use p12::PFX;
use rsa::RsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey};
use x509_cert::Certificate;
use x509_cert::der::{Decode, Encode};

use crate::core::CpeError;

/// Private key and certificate material from a `.pfx`/`.p12` container.
///
/// Loaded once at startup and immutable afterwards. A certificate outside
/// its validity window is reported through `tracing` but does not fail the
/// load; beta-endpoint flows sign with stale test certificates on purpose.
pub struct CertificateBundle {
    key: RsaPrivateKey,
    leaf_der: Vec<u8>,
    chain_der: Vec<Vec<u8>>,
    subject: String,
}

impl fmt::Debug for CertificateBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateBundle")
            .field("subject", &self.subject)
            .field("chain_len", &self.chain_der.len())
            .finish_non_exhaustive()
    }
}

impl CertificateBundle {
    /// Parse a PKCS#12 container and extract the RSA key, the leaf
    /// certificate, and whatever issuer chain the container carries.
    pub fn from_pkcs12(bytes: &[u8], password: &str) -> Result<Self, CpeError> {
        let pfx = PFX::parse(bytes)
            .map_err(|e| CpeError::Signing(format!("PKCS#12 parse error: {e}")))?;

        let keys = pfx.key_bags(password).map_err(|e| {
            CpeError::Signing(format!("PKCS#12 key extraction failed (wrong passphrase?): {e}"))
        })?;
        let key_der = keys
            .first()
            .ok_or_else(|| CpeError::Signing("PKCS#12 container holds no private key".into()))?;
        let key = RsaPrivateKey::from_pkcs8_der(key_der)
            .map_err(|e| CpeError::Signing(format!("private key decode error: {e}")))?;

        let cert_ders = pfx.cert_bags(password).map_err(|e| {
            CpeError::Signing(format!("PKCS#12 certificate extraction failed: {e}"))
        })?;
        if cert_ders.is_empty() {
            return Err(CpeError::Signing(
                "PKCS#12 container holds no certificate".into(),
            ));
        }

        let (leaf_der, chain_der, subject) = split_leaf(&key, cert_ders)?;
        Ok(Self {
            key,
            leaf_der,
            chain_der,
            subject,
        })
    }

    pub fn from_pkcs12_file(path: impl AsRef<Path>, password: &str) -> Result<Self, CpeError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| CpeError::Signing(format!("cannot read {}: {e}", path.display())))?;
        Self::from_pkcs12(&bytes, password)
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.key
    }

    pub fn leaf_der(&self) -> &[u8] {
        &self.leaf_der
    }

    /// Leaf certificate as continuous base64. No line breaks; the signed
    /// document embeds this text verbatim in `ds:X509Certificate`.
    pub fn leaf_base64(&self) -> String {
        BASE64.encode(&self.leaf_der)
    }

    pub fn issuer_chain(&self) -> &[Vec<u8>] {
        &self.chain_der
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }
}

/// Pick the certificate matching the private key as the leaf; everything
/// else is the issuer chain. Falls back to the first certificate when no
/// SPKI matches, which covers containers that store the leaf without a
/// matching key order.
fn split_leaf(
    key: &RsaPrivateKey,
    cert_ders: Vec<Vec<u8>>,
) -> Result<(Vec<u8>, Vec<Vec<u8>>, String), CpeError> {
    let pub_der = key
        .to_public_key()
        .to_public_key_der()
        .map_err(|e| CpeError::Signing(format!("public key encode error: {e}")))?;

    let parsed: Vec<Certificate> = cert_ders
        .iter()
        .map(|der| Certificate::from_der(der))
        .collect::<Result<_, _>>()
        .map_err(|e| CpeError::Signing(format!("certificate decode error: {e}")))?;

    let leaf_idx = parsed
        .iter()
        .position(|cert| {
            cert.tbs_certificate
                .subject_public_key_info
                .to_der()
                .map(|spki| spki == pub_der.as_bytes())
                .unwrap_or(false)
        })
        .unwrap_or(0);

    let subject = parsed[leaf_idx].tbs_certificate.subject.to_string();
    warn_if_outside_validity(&parsed[leaf_idx], &subject);

    let mut certs = cert_ders;
    let leaf = certs.remove(leaf_idx);
    Ok((leaf, certs, subject))
}

fn warn_if_outside_validity(cert: &Certificate, subject: &str) {
    let validity = &cert.tbs_certificate.validity;
    let now = SystemTime::now();
    if validity.not_after.to_system_time() < now {
        tracing::warn!(subject = %subject, "signing certificate is expired");
    } else if validity.not_before.to_system_time() > now {
        tracing::warn!(subject = %subject, "signing certificate is not yet valid");
    }
}
