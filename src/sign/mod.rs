//! Enveloped XML-DSig signing for CPE documents.
//!
//! SUNAT verifies signatures after inclusive C14N 1.0 and the builder
//! already emits documents in that canonical form, so no canonicalization
//! engine is needed here: digest the document without its XML declaration,
//! sign the canonical rendering of `ds:SignedInfo`, and splice the
//! finished `ds:Signature` into the reserved extension slot.
//!
//! The canonical rendering of `ds:SignedInfo` carries every namespace in
//! scope at the slot (the eight root declarations), because that is what a
//! verifier sees when it canonicalizes the subtree out of the signed
//! document.

mod keystore;

pub use keystore::CertificateBundle;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rsa::Pkcs1v15Sign;
use sha1::{Digest, Sha1};
use sha2::Sha256;

use crate::core::CpeError;
use crate::ubl::ns;

/// Canonicalization identifier stamped on `ds:CanonicalizationMethod`.
pub const C14N_URI: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";

/// Enveloped-signature transform identifier.
pub const ENVELOPED_URI: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// Id attribute on the emitted `ds:Signature`.
pub const SIGNATURE_ID: &str = "SignSUNAT";

const EXTENSION_SLOT: &str = "<ext:ExtensionContent></ext:ExtensionContent>";

/// Signature suite. SUNAT production still runs on SHA-1; the SHA-256
/// suite is kept for relay providers that accept it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureAlgorithm {
    /// rsa-sha1 with SHA-1 digests, the SEE default.
    #[default]
    RsaSha1,
    /// rsa-sha256 with SHA-256 digests.
    RsaSha256,
}

impl SignatureAlgorithm {
    pub fn signature_method_uri(&self) -> &'static str {
        match self {
            Self::RsaSha1 => "http://www.w3.org/2000/09/xmldsig#rsa-sha1",
            Self::RsaSha256 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
        }
    }

    pub fn digest_method_uri(&self) -> &'static str {
        match self {
            Self::RsaSha1 => "http://www.w3.org/2000/09/xmldsig#sha1",
            Self::RsaSha256 => "http://www.w3.org/2001/04/xmlenc#sha256",
        }
    }
}

/// Signed document bytes plus the reference digest that went into the
/// signature. The digest doubles as the record-level content hash.
#[derive(Debug, Clone)]
pub struct SignedArtifact {
    pub xml: String,
    pub digest: String,
}

/// Applies the enveloped signature. One instance per process; the bundle
/// never reloads.
#[derive(Debug)]
pub struct Signer {
    bundle: CertificateBundle,
    algorithm: SignatureAlgorithm,
}

impl Signer {
    pub fn new(bundle: CertificateBundle) -> Self {
        Self {
            bundle,
            algorithm: SignatureAlgorithm::default(),
        }
    }

    pub fn with_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    pub fn bundle(&self) -> &CertificateBundle {
        &self.bundle
    }

    /// Sign `xml` and splice the signature into the reserved extension
    /// slot. The first empty `ext:ExtensionContent` pair is the slot; the
    /// input must carry one.
    ///
    /// Re-signing identical bytes with the same key yields the identical
    /// signed document.
    pub fn sign(&self, xml: &str) -> Result<SignedArtifact, CpeError> {
        if !xml.contains(EXTENSION_SLOT) {
            return Err(CpeError::Signing(
                "document carries no empty extension slot for the signature".into(),
            ));
        }
        let default_ns = root_default_namespace(xml)?;

        let digest = self.digest_b64(strip_declaration(xml).as_bytes());
        let body = signed_info_body(self.algorithm, &digest);
        let canonical = canonical_signed_info(default_ns, &body);
        let signature_value = BASE64.encode(self.sign_canonical(canonical.as_bytes())?);
        let certificate = self.bundle.leaf_base64();

        let signature = format!(
            "<ds:Signature xmlns:ds=\"{ds}\" Id=\"{SIGNATURE_ID}\">\
             <ds:SignedInfo>{body}</ds:SignedInfo>\
             <ds:SignatureValue>{signature_value}</ds:SignatureValue>\
             <ds:KeyInfo><ds:X509Data><ds:X509Certificate>{certificate}</ds:X509Certificate>\
             </ds:X509Data></ds:KeyInfo>\
             </ds:Signature>",
            ds = ns::DS,
        );

        let signed = xml.replacen(
            EXTENSION_SLOT,
            &format!("<ext:ExtensionContent>{signature}</ext:ExtensionContent>"),
            1,
        );
        Ok(SignedArtifact {
            xml: signed,
            digest,
        })
    }

    fn digest_b64(&self, data: &[u8]) -> String {
        match self.algorithm {
            SignatureAlgorithm::RsaSha1 => BASE64.encode(Sha1::digest(data)),
            SignatureAlgorithm::RsaSha256 => BASE64.encode(Sha256::digest(data)),
        }
    }

    fn sign_canonical(&self, data: &[u8]) -> Result<Vec<u8>, CpeError> {
        let key = self.bundle.private_key();
        let signature = match self.algorithm {
            SignatureAlgorithm::RsaSha1 => {
                key.sign(Pkcs1v15Sign::new::<Sha1>(), &Sha1::digest(data))
            }
            SignatureAlgorithm::RsaSha256 => {
                key.sign(Pkcs1v15Sign::new::<Sha256>(), &Sha256::digest(data))
            }
        };
        signature.map_err(|e| CpeError::Signing(format!("RSA signing error: {e}")))
    }
}

/// The digest input excludes the XML declaration; canonical form starts at
/// the root element.
fn strip_declaration(xml: &str) -> &str {
    match xml.find("?>") {
        Some(pos) if xml.starts_with("<?xml") => &xml[pos + 2..],
        _ => xml,
    }
}

fn root_default_namespace(xml: &str) -> Result<&str, CpeError> {
    let start = xml
        .find("xmlns=\"")
        .ok_or_else(|| CpeError::Signing("document root declares no default namespace".into()))?
        + 7;
    let rest = &xml[start..];
    let end = rest
        .find('"')
        .ok_or_else(|| CpeError::Signing("unterminated namespace declaration".into()))?;
    Ok(&rest[..end])
}

fn signed_info_body(algorithm: SignatureAlgorithm, digest_b64: &str) -> String {
    format!(
        "<ds:CanonicalizationMethod Algorithm=\"{C14N_URI}\"></ds:CanonicalizationMethod>\
         <ds:SignatureMethod Algorithm=\"{sig}\"></ds:SignatureMethod>\
         <ds:Reference URI=\"\">\
         <ds:Transforms>\
         <ds:Transform Algorithm=\"{ENVELOPED_URI}\"></ds:Transform>\
         <ds:Transform Algorithm=\"{C14N_URI}\"></ds:Transform>\
         </ds:Transforms>\
         <ds:DigestMethod Algorithm=\"{dig}\"></ds:DigestMethod>\
         <ds:DigestValue>{digest_b64}</ds:DigestValue>\
         </ds:Reference>",
        sig = algorithm.signature_method_uri(),
        dig = algorithm.digest_method_uri(),
    )
}

/// Inclusive C14N renders every in-scope namespace on the subtree root,
/// default namespace first, prefixes alphabetical.
fn canonical_signed_info(default_ns: &str, body: &str) -> String {
    format!(
        "<ds:SignedInfo xmlns=\"{default_ns}\" \
         xmlns:cac=\"{cac}\" xmlns:cbc=\"{cbc}\" xmlns:ccts=\"{ccts}\" \
         xmlns:ds=\"{ds}\" xmlns:ext=\"{ext}\" xmlns:qdt=\"{qdt}\" \
         xmlns:udt=\"{udt}\">{body}</ds:SignedInfo>",
        cac = ns::CAC,
        cbc = ns::CBC,
        ccts = ns::CCTS,
        ds = ns::DS,
        ext = ns::EXT,
        qdt = ns::QDT,
        udt = ns::UDT,
    )
}
