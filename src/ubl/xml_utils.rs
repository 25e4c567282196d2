use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use rust_decimal::Decimal;
use std::io::Cursor;

use crate::core::CpeError;

pub type XmlResult = Result<String, CpeError>;

fn xml_io(e: std::io::Error) -> CpeError {
    CpeError::Xml(format!("XML write error: {e}"))
}

/// Event writer producing the exact byte stream that gets digested and
/// signed.
///
/// Output is deliberately single-line: no indentation, empty elements
/// written as start/end pairs, attributes in emission order with double
/// quotes. Serialized this way the document is already its own inclusive
/// canonical form (minus the XML declaration), so the signer never has to
/// re-canonicalize.
pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    pub fn new() -> Result<Self, CpeError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(quick_xml::events::BytesDecl::new(
                "1.0",
                Some("UTF-8"),
                None,
            )))
            .map_err(xml_io)?;
        Ok(Self { writer })
    }

    pub fn into_string(self) -> Result<String, CpeError> {
        let buf = self.writer.into_inner().into_inner();
        String::from_utf8(buf).map_err(|e| CpeError::Xml(format!("XML UTF-8 error: {e}")))
    }

    pub fn start_element(&mut self, name: &str) -> Result<&mut Self, CpeError> {
        let elem = BytesStart::new(name);
        self.writer
            .write_event(Event::Start(elem))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn start_element_with_attrs(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, CpeError> {
        let mut elem = BytesStart::new(name);
        for (k, v) in attrs {
            elem.push_attribute((*k, *v));
        }
        self.writer
            .write_event(Event::Start(elem))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn end_element(&mut self, name: &str) -> Result<&mut Self, CpeError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    /// Write `<name></name>` as a start/end pair. Never collapses to
    /// `<name/>`; the canonical form always carries both tags.
    pub fn empty_element(&mut self, name: &str) -> Result<&mut Self, CpeError> {
        self.start_element(name)?;
        self.end_element(name)
    }

    pub fn text_element(&mut self, name: &str, text: &str) -> Result<&mut Self, CpeError> {
        self.start_element(name)?;
        self.write_text(text)?;
        self.end_element(name)
    }

    pub fn text_element_with_attrs(
        &mut self,
        name: &str,
        text: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, CpeError> {
        self.start_element_with_attrs(name, attrs)?;
        self.write_text(text)?;
        self.end_element(name)
    }

    // Canonical text escapes exactly `&`, `<` and `>`. Quotes stay
    // literal in character data, so the default full escape would
    // produce bytes a re-canonicalizing verifier does not see.
    fn write_text(&mut self, text: &str) -> Result<(), CpeError> {
        let escaped = quick_xml::escape::partial_escape(text);
        self.writer
            .write_event(Event::Text(BytesText::from_escaped(escaped)))
            .map_err(xml_io)
    }

    /// Write a decimal amount with currencyID attribute.
    pub fn amount_element(
        &mut self,
        name: &str,
        amount: Decimal,
        currency: &str,
    ) -> Result<&mut Self, CpeError> {
        self.text_element_with_attrs(name, &format_decimal(amount), &[("currencyID", currency)])
    }

    /// Write a quantity with unit code attributes (UN/ECE Rec 20).
    pub fn quantity_element(
        &mut self,
        name: &str,
        qty: Decimal,
        unit: &str,
    ) -> Result<&mut Self, CpeError> {
        self.text_element_with_attrs(
            name,
            &format_decimal(qty),
            &[
                ("unitCode", unit),
                (
                    "unitCodeListAgencyName",
                    "United Nations Economic Commission for Europe",
                ),
                ("unitCodeListID", "UN/ECE rec 20"),
            ],
        )
    }
}

/// Format a Decimal for XML output: always at least 2 decimal places,
/// trailing zeros beyond that stripped.
pub fn format_decimal(d: Decimal) -> String {
    let s = d.normalize().to_string();
    if let Some(dot_pos) = s.find('.') {
        let decimals = s.len() - dot_pos - 1;
        if decimals < 2 {
            format!("{s}{}", "0".repeat(2 - decimals))
        } else {
            s
        }
    } else {
        format!("{s}.00")
    }
}

/// Cut free text at the first control or line-break character. The
/// canonical byte stream must stay one line.
pub fn sanitize_text(input: &str) -> &str {
    match input.find(|c: char| c.is_control()) {
        Some(pos) => &input[..pos],
        None => input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn format_decimal_cases() {
        assert_eq!(format_decimal(dec!(100)), "100.00");
        assert_eq!(format_decimal(dec!(1500.0)), "1500.00");
        assert_eq!(format_decimal(dec!(49.90)), "49.90");
        assert_eq!(format_decimal(dec!(11.80)), "11.80");
        assert_eq!(format_decimal(dec!(0.005)), "0.005");
        assert_eq!(format_decimal(dec!(18)), "18.00");
    }

    #[test]
    fn sanitize_cuts_at_first_control_char() {
        assert_eq!(sanitize_text("Cuaderno A4"), "Cuaderno A4");
        assert_eq!(sanitize_text("línea uno\nlínea dos"), "línea uno");
        assert_eq!(sanitize_text("tab\there"), "tab");
        assert_eq!(sanitize_text("\ncomienza mal"), "");
    }

    #[test]
    fn text_escaping_leaves_quotes_literal() {
        let mut w = XmlWriter::new().unwrap();
        w.text_element("cbc:Note", "Juguetería \"El Sol\" & Cía <SAC>")
            .unwrap();
        let xml = w.into_string().unwrap();
        assert!(xml.contains("Juguetería \"El Sol\" &amp; Cía &lt;SAC&gt;"));
    }

    #[test]
    fn empty_element_writes_tag_pair() {
        let mut w = XmlWriter::new().unwrap();
        w.empty_element("ext:ExtensionContent").unwrap();
        let xml = w.into_string().unwrap();
        assert!(xml.ends_with("<ext:ExtensionContent></ext:ExtensionContent>"));
    }

    #[test]
    fn output_is_single_line() {
        let mut w = XmlWriter::new().unwrap();
        w.start_element("a").unwrap();
        w.text_element("b", "x").unwrap();
        w.end_element("a").unwrap();
        let xml = w.into_string().unwrap();
        assert!(!xml.contains('\n'));
    }
}
