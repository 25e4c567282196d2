//! Direct SOAP transport against the SUNAT `billService` endpoint.

use std::fmt;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::header::CONTENT_TYPE;

use super::container;
use crate::core::{CpeError, DocumentName, SubmissionOutcome};

const SOAP_TIMEOUT: Duration = Duration::from_secs(30);
const SOAP_ACTION: &str = "urn:sendBill";
const RESPONSE_BODY_LIMIT: usize = 200;

/// `billService` endpoints per environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SunatEnvironment {
    /// Homologation endpoint; accepts test credentials.
    Beta,
    Production,
}

impl SunatEnvironment {
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Beta => "https://e-beta.sunat.gob.pe/ol-ti-itcpfegem-beta/billService",
            Self::Production => "https://e-factura.sunat.gob.pe/ol-ti-itcpfegem/billService",
        }
    }

    /// Environment from a config label. Anything that is not `BETA`
    /// selects production.
    pub fn from_label(label: &str) -> Self {
        if label.eq_ignore_ascii_case("beta") {
            Self::Beta
        } else {
            Self::Production
        }
    }
}

/// Clave SOL credentials. The Basic-auth username is the RUC concatenated
/// with the SOL user.
#[derive(Clone)]
pub struct SolCredentials {
    pub ruc: String,
    pub sol_user: String,
    pub sol_password: String,
}

impl fmt::Debug for SolCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolCredentials")
            .field("ruc", &self.ruc)
            .field("sol_user", &self.sol_user)
            .finish_non_exhaustive()
    }
}

impl SolCredentials {
    pub fn new(
        ruc: impl Into<String>,
        sol_user: impl Into<String>,
        sol_password: impl Into<String>,
    ) -> Self {
        Self {
            ruc: ruc.into(),
            sol_user: sol_user.into(),
            sol_password: sol_password.into(),
        }
    }

    pub fn basic_username(&self) -> String {
        format!("{}{}", self.ruc, self.sol_user)
    }
}

/// Synchronous-submission client for the `sendBill` operation.
#[derive(Debug)]
pub struct DirectClient {
    http: reqwest::Client,
    environment: SunatEnvironment,
    credentials: SolCredentials,
}

impl DirectClient {
    pub fn new(
        environment: SunatEnvironment,
        credentials: SolCredentials,
    ) -> Result<Self, CpeError> {
        let http = reqwest::Client::builder()
            .timeout(SOAP_TIMEOUT)
            .build()
            .map_err(|e| CpeError::Transport(format!("HTTP client build error: {e}")))?;
        Ok(Self {
            http,
            environment,
            credentials,
        })
    }

    pub fn environment(&self) -> SunatEnvironment {
        self.environment
    }

    /// Submit a signed document through `sendBill`.
    ///
    /// A SOAP fault becomes a failed outcome carrying the authority's own
    /// code and message; a non-200 status becomes a failed outcome with the
    /// truncated body. Connection failures and timeouts surface as
    /// [`CpeError::Transport`] because the remote outcome is unknown.
    pub async fn send_bill(
        &self,
        name: &DocumentName,
        signed_xml: &[u8],
    ) -> Result<SubmissionOutcome, CpeError> {
        let zipped = container::pack_xml(&name.xml_name(), signed_xml)?;
        let envelope = sendbill_envelope(&name.zip_name(), &BASE64.encode(&zipped));

        let response = self
            .http
            .post(self.environment.endpoint())
            .basic_auth(
                self.credentials.basic_username(),
                Some(&self.credentials.sol_password),
            )
            .header(CONTENT_TYPE, "text/xml;charset=UTF-8")
            .header("SOAPAction", SOAP_ACTION)
            .body(envelope)
            .send()
            .await
            .map_err(|e| CpeError::Transport(format!("sendBill request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CpeError::Transport(format!("sendBill response read failed: {e}")))?;

        if !status.is_success() {
            return Ok(SubmissionOutcome::transport_http(
                status.as_u16(),
                super::truncate_body(&body, RESPONSE_BODY_LIMIT),
            ));
        }
        parse_sendbill_response(&body)
    }
}

fn sendbill_envelope(zip_name: &str, zip_b64: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:ser="http://service.sunat.gob.pe">
   <soapenv:Header/>
   <soapenv:Body>
      <ser:sendBill>
         <fileName>{zip_name}</fileName>
         <contentFile>{zip_b64}</contentFile>
      </ser:sendBill>
   </soapenv:Body>
</soapenv:Envelope>"#
    )
}

#[derive(Debug, Default)]
struct SoapResponse {
    fault_code: Option<String>,
    fault_string: Option<String>,
    application_response: Option<String>,
}

/// Map a 200 `sendBill` body to an outcome: fault first, then the
/// embedded receipt. A body with neither is an unknown remote outcome and
/// propagates as a transport error.
fn parse_sendbill_response(body: &str) -> Result<SubmissionOutcome, CpeError> {
    let parsed = parse_soap_response(body)?;

    if parsed.fault_code.is_some() || parsed.fault_string.is_some() {
        let message = parsed
            .fault_string
            .unwrap_or_else(|| "SOAP fault with no description".to_string());
        return Ok(SubmissionOutcome::authority_fault(
            parsed.fault_code,
            message,
        ));
    }

    match parsed.application_response {
        Some(b64) => {
            let receipt = super::decode_b64(&b64)
                .map_err(|e| CpeError::Transport(format!("receipt decode error: {e}")))?;
            Ok(SubmissionOutcome::accepted(
                "Comprobante enviado y aceptado por SUNAT",
                Some(receipt),
            ))
        }
        None => Err(CpeError::Transport(
            "authority response carried neither a fault nor a receipt".into(),
        )),
    }
}

/// Prefixes on SOAP responses vary by server stack, so elements are
/// matched by local name.
fn parse_soap_response(xml: &str) -> Result<SoapResponse, CpeError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut response = SoapResponse::default();
    let mut path: Vec<String> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = std::str::from_utf8(e.local_name().as_ref())
                    .unwrap_or("")
                    .to_string();
                path.push(name);
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().unwrap_or_default().to_string();
                if text.is_empty() {
                    continue;
                }
                match path.last().map(String::as_str) {
                    Some("faultcode") => response.fault_code = Some(text),
                    Some("faultstring") => response.fault_string = Some(text),
                    Some("applicationResponse") => response.application_response = Some(text),
                    _ => {}
                }
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(CpeError::Xml(format!("SOAP response parse error: {e}"))),
            _ => {}
        }
    }
    Ok(response)
}

/// Acceptance data parsed from a CDR `ApplicationResponse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptStatus {
    /// `{series}-{number}` of the document the receipt answers.
    pub reference_id: Option<String>,
    /// Authority response code; `0` is acceptance.
    pub response_code: String,
    /// Authority message, verbatim.
    pub description: String,
}

impl ReceiptStatus {
    pub fn is_accepted(&self) -> bool {
        self.response_code == "0"
    }
}

/// Pull `ReferenceID` / `ResponseCode` / `Description` out of a receipt.
/// Only the first `Response` block counts.
pub fn parse_receipt_status(xml: &str) -> Result<ReceiptStatus, CpeError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut reference_id: Option<String> = None;
    let mut response_code: Option<String> = None;
    let mut description: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let name = std::str::from_utf8(e.local_name().as_ref())
                    .unwrap_or("")
                    .to_string();
                path.push(name);
            }
            Ok(Event::Text(ref e)) => {
                let in_response = path.len() >= 2 && path[path.len() - 2] == "Response";
                if !in_response {
                    continue;
                }
                let text = e.unescape().unwrap_or_default().to_string();
                match path.last().map(String::as_str) {
                    Some("ReferenceID") if reference_id.is_none() => reference_id = Some(text),
                    Some("ResponseCode") if response_code.is_none() => response_code = Some(text),
                    Some("Description") if description.is_none() => description = Some(text),
                    _ => {}
                }
            }
            Ok(Event::End(_)) => {
                path.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(CpeError::Xml(format!("receipt parse error: {e}"))),
            _ => {}
        }
    }

    let response_code =
        response_code.ok_or_else(|| CpeError::Xml("receipt carries no ResponseCode".into()))?;
    Ok(ReceiptStatus {
        reference_id,
        response_code,
        description: description.unwrap_or_default(),
    })
}
