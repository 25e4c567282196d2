//! Relay (PSE) REST transport.
//!
//! The relay exposes four operations under `/pro/{system}/`: a token
//! exchange, `cpe/generar` (the relay signs the document), `cpe/enviar`
//! (the relay forwards it to SUNAT) and `cpe/consultar/{name}` (status
//! lookup). Everything is JSON over bearer auth except the token call.

use std::fmt;
use std::time::{Duration, Instant};

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::core::{CpeError, DocumentName, SubmissionOutcome};

const TOKEN_TIMEOUT: Duration = Duration::from_secs(30);
const SIGN_TIMEOUT: Duration = Duration::from_secs(60);
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(120);
const QUERY_TIMEOUT: Duration = Duration::from_secs(60);
const RESPONSE_BODY_LIMIT: usize = 200;

/// Tokens are renewed this many seconds before the server-declared TTL
/// runs out, so a request issued right at the edge still authenticates.
const TOKEN_RENEWAL_MARGIN_SECS: u64 = 60;

/// Rejection phrases that mean the document already reached the
/// authority. Matched lowercase, as substrings, because the relay reports
/// this condition only in free text.
pub fn default_duplicate_phrases() -> Vec<String> {
    [
        "registrado previamente",
        "informado anteriormente",
        "ya existe",
        "duplicado",
        "cpe ya informado",
        "serie y número ya están registrados",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Relay endpoint and account configuration.
#[derive(Clone)]
pub struct RelayConfig {
    /// Service root, without the `/pro/{system}` suffix.
    pub base_url: String,
    /// Deployment label inside the relay, e.g. `produccion`.
    pub system: String,
    pub user: String,
    pub password: String,
    /// Phrase set for duplicate detection; authority wording changes, so
    /// deployments can extend this without a code change.
    pub duplicate_phrases: Vec<String>,
}

impl RelayConfig {
    pub fn new(
        base_url: impl Into<String>,
        system: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            system: system.into(),
            user: user.into(),
            password: password.into(),
            duplicate_phrases: default_duplicate_phrases(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/pro/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.system,
            path
        )
    }

    fn is_duplicate_message(&self, message: &str) -> bool {
        let lowered = message.to_lowercase();
        self.duplicate_phrases
            .iter()
            .any(|phrase| lowered.contains(phrase.as_str()))
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("base_url", &self.base_url)
            .field("system", &self.system)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Result of the relay's signing phase.
#[derive(Debug, Clone)]
pub struct RemoteSigned {
    /// Signed document bytes, decoded.
    pub xml: Vec<u8>,
    /// Digest the relay computed over the document.
    pub digest: Option<String>,
    /// Relay-assigned correlation id.
    pub external_id: Option<String>,
}

/// Result of a status lookup.
#[derive(Debug, Clone)]
pub struct RelayQuery {
    /// Whether the relay confirmed the document is registered.
    pub confirmed: bool,
    pub message: Option<String>,
    /// Signed document bytes, when the relay still holds them.
    pub signed_xml: Option<Vec<u8>>,
    /// Receipt bytes, when the relay still holds them.
    pub receipt: Option<Vec<u8>>,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    usuario: &'a str,
    #[serde(rename = "contraseña")]
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    token_acceso: Option<String>,
    #[serde(default = "default_token_ttl")]
    expira_en: u64,
}

fn default_token_ttl() -> u64 {
    600
}

#[derive(Serialize)]
struct SignRequest<'a> {
    tipo_integracion: u8,
    nombre_archivo: &'a str,
    contenido_archivo: &'a str,
}

#[derive(Deserialize)]
struct SignResponse {
    estado: Option<serde_json::Value>,
    xml: Option<String>,
    codigo_hash: Option<String>,
    mensaje: Option<String>,
    external_id: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    nombre_xml_firmado: &'a str,
    contenido_xml_firmado: &'a str,
}

#[derive(Deserialize)]
struct SubmitResponse {
    estado: Option<serde_json::Value>,
    mensaje: Option<String>,
    cdr: Option<String>,
    /// Issued for batched operations (summaries, voids); logged, not
    /// folded into the outcome.
    ticket: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct QueryResponse {
    estado: Option<serde_json::Value>,
    mensaje: Option<String>,
    xml: Option<String>,
    cdr: Option<String>,
}

/// Client for the two-phase relay flow. Holds the token cache, the only
/// shared mutable state in the crate.
#[derive(Debug)]
pub struct RelayClient {
    http: reqwest::Client,
    config: RelayConfig,
    token: Mutex<Option<CachedToken>>,
}

impl RelayClient {
    pub fn new(config: RelayConfig) -> Result<Self, CpeError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| CpeError::Transport(format!("HTTP client build error: {e}")))?;
        Ok(Self {
            http,
            config,
            token: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Current token, renewing lazily when absent or inside the renewal
    /// margin.
    async fn access_token(&self) -> Result<String, CpeError> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.value.clone());
            }
        }
        let fresh = self.request_token().await?;
        let value = fresh.value.clone();
        *guard = Some(fresh);
        Ok(value)
    }

    async fn request_token(&self) -> Result<CachedToken, CpeError> {
        let payload = TokenRequest {
            usuario: &self.config.user,
            password: &self.config.password,
        };
        let response = self
            .http
            .post(self.config.endpoint("auth/cpe/token"))
            .timeout(TOKEN_TIMEOUT)
            .header(ACCEPT, "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| CpeError::Transport(format!("token request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CpeError::Transport(format!("token response read failed: {e}")))?;
        if !status.is_success() {
            return Err(CpeError::Transport(failure_message(status.as_u16(), &body)));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| CpeError::Transport(format!("token response parse error: {e}")))?;
        let value = parsed
            .token_acceso
            .filter(|token| !token.is_empty())
            .ok_or_else(|| CpeError::Transport("relay token response carries no token".into()))?;

        let ttl = parsed.expira_en.saturating_sub(TOKEN_RENEWAL_MARGIN_SECS);
        tracing::debug!(ttl_secs = parsed.expira_en, "relay access token renewed");
        Ok(CachedToken {
            value,
            expires_at: Instant::now() + Duration::from_secs(ttl),
        })
    }

    /// Phase one: the relay signs the document.
    ///
    /// Nothing has been submitted yet at this point, so every failure here
    /// is safe to retry; definitive relay refusals surface as
    /// [`CpeError::Signing`].
    pub async fn sign_remote(
        &self,
        name: &DocumentName,
        xml: &[u8],
    ) -> Result<RemoteSigned, CpeError> {
        let token = self.access_token().await?;
        let file_name = name.to_string();
        let content = BASE64.encode(xml);
        let payload = SignRequest {
            tipo_integracion: 0,
            nombre_archivo: &file_name,
            contenido_archivo: &content,
        };

        let response = self
            .http
            .post(self.config.endpoint("cpe/generar"))
            .timeout(SIGN_TIMEOUT)
            .header(ACCEPT, "application/json")
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| CpeError::Transport(format!("relay sign request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CpeError::Transport(format!("relay sign response read failed: {e}")))?;
        if !status.is_success() {
            return Err(CpeError::Signing(failure_message(status.as_u16(), &body)));
        }

        let parsed: SignResponse = serde_json::from_str(&body)
            .map_err(|e| CpeError::Transport(format!("relay sign response parse error: {e}")))?;
        if !estado_ok(parsed.estado.as_ref()) && parsed.xml.is_none() {
            let message = parsed
                .mensaje
                .unwrap_or_else(|| "relay reported a signing failure".to_string());
            return Err(CpeError::Signing(message));
        }

        let xml_b64 = parsed.xml.ok_or_else(|| {
            CpeError::Signing("relay reported success without a signed document".into())
        })?;
        let xml = super::decode_b64(&xml_b64)
            .map_err(|e| CpeError::Signing(format!("signed document decode error: {e}")))?;

        tracing::debug!(document = %name, digest = ?parsed.codigo_hash, "relay signed document");
        Ok(RemoteSigned {
            xml,
            digest: parsed.codigo_hash,
            external_id: parsed.external_id.as_ref().map(value_text),
        })
    }

    /// Phase two: the relay forwards the signed document to SUNAT.
    ///
    /// Both an HTTP error status and a 200 body with a non-success
    /// `estado` are definitive answers and come back as failed outcomes;
    /// only network-level trouble propagates as an error.
    pub async fn submit(
        &self,
        name: &DocumentName,
        signed_xml: &[u8],
    ) -> Result<SubmissionOutcome, CpeError> {
        let token = self.access_token().await?;
        let file_name = name.to_string();
        let content = BASE64.encode(signed_xml);
        let payload = SubmitRequest {
            nombre_xml_firmado: &file_name,
            contenido_xml_firmado: &content,
        };

        let response = self
            .http
            .post(self.config.endpoint("cpe/enviar"))
            .timeout(SUBMIT_TIMEOUT)
            .header(ACCEPT, "application/json")
            .bearer_auth(&token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| CpeError::Transport(format!("relay submit request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CpeError::Transport(format!("relay submit response read failed: {e}")))?;
        if !status.is_success() {
            return Ok(SubmissionOutcome::transport_http(
                status.as_u16(),
                failure_message(status.as_u16(), &body),
            ));
        }

        let parsed: SubmitResponse = serde_json::from_str(&body)
            .map_err(|e| CpeError::Transport(format!("relay submit response parse error: {e}")))?;
        if let Some(ticket) = parsed.ticket.as_ref() {
            tracing::debug!(document = %name, ticket = %value_text(ticket), "relay issued a tracking ticket");
        }

        if estado_ok(parsed.estado.as_ref()) {
            let receipt = match parsed.cdr.as_deref() {
                Some(cdr) if !cdr.is_empty() => Some(
                    super::decode_b64(cdr)
                        .map_err(|e| CpeError::Transport(format!("receipt decode error: {e}")))?,
                ),
                _ => None,
            };
            let message = parsed
                .mensaje
                .unwrap_or_else(|| "Comprobante enviado y aceptado por SUNAT".to_string());
            Ok(SubmissionOutcome::accepted(message, receipt))
        } else {
            let message = parsed
                .mensaje
                .unwrap_or_else(|| "relay reported a submission failure".to_string());
            Ok(SubmissionOutcome::authority_fault(
                parsed.estado.as_ref().map(value_text),
                message,
            ))
        }
    }

    /// Submit, and when the relay answers "already registered", confirm
    /// through a status lookup and fold the rejection into a success.
    ///
    /// The lookup must itself succeed for the promotion to happen; a
    /// failed or unconfirmed lookup preserves the original rejection.
    pub async fn submit_with_recovery(
        &self,
        name: &DocumentName,
        signed_xml: &[u8],
    ) -> Result<SubmissionOutcome, CpeError> {
        let outcome = self.submit(name, signed_xml).await?;
        if outcome.success || !self.config.is_duplicate_message(&outcome.message) {
            return Ok(outcome);
        }

        tracing::info!(document = %name, "document already known to the authority, querying state");
        let lookup = match self.query(name).await {
            Ok(lookup) => lookup,
            Err(e) => {
                tracing::warn!(document = %name, error = %e, "duplicate lookup failed, keeping the rejection");
                return Ok(outcome);
            }
        };
        if !lookup.confirmed {
            return Ok(outcome);
        }

        let message = format!(
            "Comprobante ya registrado: {}",
            lookup.message.as_deref().unwrap_or_default()
        );
        Ok(SubmissionOutcome::accepted(message, lookup.receipt))
    }

    /// Status lookup by document name.
    pub async fn query(&self, name: &DocumentName) -> Result<RelayQuery, CpeError> {
        let token = self.access_token().await?;
        let response = self
            .http
            .get(self.config.endpoint(&format!("cpe/consultar/{name}")))
            .timeout(QUERY_TIMEOUT)
            .header(ACCEPT, "application/json")
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| CpeError::Transport(format!("relay query request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CpeError::Transport(format!("relay query response read failed: {e}")))?;
        if !status.is_success() {
            return Err(CpeError::Transport(failure_message(status.as_u16(), &body)));
        }

        let parsed: QueryResponse = serde_json::from_str(&body)
            .map_err(|e| CpeError::Transport(format!("relay query response parse error: {e}")))?;
        let signed_xml = decode_optional(parsed.xml.as_deref(), name, "signed document");
        let receipt = decode_optional(parsed.cdr.as_deref(), name, "receipt");
        Ok(RelayQuery {
            confirmed: estado_ok(parsed.estado.as_ref()),
            message: parsed.mensaje,
            signed_xml,
            receipt,
        })
    }
}

/// Decode an optional base64 field from a lookup; a corrupt field is
/// logged and dropped rather than failing the whole lookup.
fn decode_optional(value: Option<&str>, name: &DocumentName, field: &str) -> Option<Vec<u8>> {
    let value = value.filter(|v| !v.is_empty())?;
    match super::decode_b64(value) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::warn!(document = %name, field, error = %e, "field in query response does not decode");
            None
        }
    }
}

/// The relay's `estado` arrives as a JSON number on the documented path
/// but has been observed as a string; both spellings of 200 count.
fn estado_ok(estado: Option<&serde_json::Value>) -> bool {
    match estado {
        Some(value) => value.as_i64() == Some(200) || value.as_str() == Some("200"),
        None => false,
    }
}

fn value_text(value: &serde_json::Value) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => value.to_string(),
    }
}

/// Most specific human message in an error body: the known JSON keys in
/// order, then the raw text.
fn failure_message(status: u16, body: &str) -> String {
    if let Some(message) = extract_json_message(body) {
        return message;
    }
    format!(
        "Error {status}: {}",
        super::truncate_body(body, RESPONSE_BODY_LIMIT)
    )
}

fn extract_json_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    for key in ["mensaje", "message", "errores", "error"] {
        if let Some(field) = value.get(key) {
            if field.is_null() {
                continue;
            }
            let text = value_text(field);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}
