//! Parses the authority's SOAP response (§4.3 Parsing).

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use verifactu_types::error::VerifactuError;

/// The authority's registration state code.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ResponseState {
    Correcto,
    AceptadoConErrores,
    Rechazado,
}

impl ResponseState {
    fn from_wire(s: &str) -> Option<Self> {
        match s {
            "Correcto" => Some(ResponseState::Correcto),
            "AceptadoConErrores" => Some(ResponseState::AceptadoConErrores),
            "Rechazado" => Some(ResponseState::Rechazado),
            _ => None,
        }
    }

    /// Whether the response counts as an accepted submission (§4.5 `submit`
    /// step 6): `Correcto` or `AceptadoConErrores`, not `Rechazado`.
    pub fn accepted(self) -> bool {
        !matches!(self, ResponseState::Rechazado)
    }
}

/// Everything the submission client needs out of a parsed response.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedResponse {
    pub state: ResponseState,
    pub verification_code: Option<String>,
    pub error_code: Option<String>,
    pub error_description: Option<String>,
    /// Present only for query responses.
    pub registration_instant: Option<String>,
}

/// Operation-specific response element names, plus the generic fallback
/// `Respuesta`. The register name is fixed by §8's literal scenario 5; the
/// others follow the same `Respuesta<Operation>` shape the authority's other
/// responses use and aren't pinned down by a literal example.
const RESPONSE_ELEMENT_NAMES: &[&str] = &[
    "RespuestaRegFactura",
    "RespuestaAnulacionFactura",
    "RespuestaConsultaFactuSistemaFacturacion",
    "Respuesta",
];

fn local_name(qname: &[u8]) -> &str {
    let s = std::str::from_utf8(qname).unwrap_or("");
    match s.rfind(':') {
        Some(i) => &s[i + 1..],
        None => s,
    }
}

/// Parses `xml`, surfacing a `soapenv:Fault` anywhere under `Body` as a
/// protocol-level [`VerifactuError::soap`] before looking for a business
/// response element. A missing operation response element (and no fault) is
/// itself a fatal parse error, per §4.3.
pub fn parse_response(xml: &str) -> Result<ParsedResponse, VerifactuError> {
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<String> = Vec::new();
    let mut found_response = false;
    let mut in_fault = false;
    let mut fault_code: Option<String> = None;
    let mut fault_string: Option<String> = None;

    let mut state: Option<ResponseState> = None;
    let mut verification_code = None;
    let mut error_code = None;
    let mut error_description = None;
    let mut registration_instant = None;

    let mut buf = Vec::new();
    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| VerifactuError::soap(format!("malformed response XML: {e}")))?;
        match event {
            Event::Eof => break,
            Event::Start(start) => {
                let name = local_name(start.name().as_ref()).to_string();
                if name == "Fault" {
                    in_fault = true;
                }
                if RESPONSE_ELEMENT_NAMES.contains(&name.as_str()) {
                    found_response = true;
                }
                stack.push(name);
            }
            Event::Empty(start) => {
                let name = local_name(start.name().as_ref()).to_string();
                if RESPONSE_ELEMENT_NAMES.contains(&name.as_str()) {
                    found_response = true;
                }
            }
            Event::Text(text) => {
                let value = text.unescape().unwrap_or_default();
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if let Some(leaf) = stack.last().map(String::as_str) {
                    match leaf {
                        "faultcode" if in_fault => fault_code = Some(trimmed.to_string()),
                        "faultstring" if in_fault => fault_string = Some(trimmed.to_string()),
                        "EstadoRegistro" => state = ResponseState::from_wire(trimmed),
                        "CSV" => verification_code = Some(trimmed.to_string()),
                        "CodigoErrorRegistro" => error_code = Some(trimmed.to_string()),
                        "DescripcionErrorRegistro" => {
                            error_description = Some(trimmed.to_string())
                        }
                        "FechaHoraRegistro" => registration_instant = Some(trimmed.to_string()),
                        _ => {}
                    }
                }
            }
            Event::End(end) => {
                let name = local_name(end.name().as_ref());
                if name == "Fault" {
                    in_fault = false;
                }
                stack.pop();
            }
            _ => {}
        }
        buf.clear();
    }

    if let (Some(code), Some(message)) = (fault_code, fault_string) {
        return Err(VerifactuError::soap(format!("{code}: {message}")));
    }

    if !found_response {
        return Err(VerifactuError::soap("invalid response: missing operation response element"));
    }

    let state = state
        .ok_or_else(|| VerifactuError::soap("invalid response: missing EstadoRegistro"))?;

    Ok(ParsedResponse {
        state,
        verification_code,
        error_code,
        error_description,
        registration_instant,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_correcto_with_verification_code() {
        let xml = r#"<?xml version="1.0"?>
<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
  <soapenv:Body>
    <RespuestaRegFactura>
      <EstadoRegistro>Correcto</EstadoRegistro>
      <CSV>ABC123</CSV>
    </RespuestaRegFactura>
  </soapenv:Body>
</soapenv:Envelope>"#;
        let parsed = parse_response(xml).unwrap();
        assert_eq!(parsed.state, ResponseState::Correcto);
        assert!(parsed.state.accepted());
        assert_eq!(parsed.verification_code.as_deref(), Some("ABC123"));
        assert!(parsed.error_code.is_none());
    }

    #[test]
    fn parses_rechazado_with_error_detail() {
        let xml = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
  <soapenv:Body>
    <RespuestaRegFactura>
      <EstadoRegistro>Rechazado</EstadoRegistro>
      <CodigoErrorRegistro>1234</CodigoErrorRegistro>
      <DescripcionErrorRegistro>Bad data</DescripcionErrorRegistro>
    </RespuestaRegFactura>
  </soapenv:Body>
</soapenv:Envelope>"#;
        let parsed = parse_response(xml).unwrap();
        assert_eq!(parsed.state, ResponseState::Rechazado);
        assert!(!parsed.state.accepted());
        assert_eq!(parsed.error_code.as_deref(), Some("1234"));
        assert_eq!(parsed.error_description.as_deref(), Some("Bad data"));
    }

    #[test]
    fn accepts_generic_respuesta_fallback() {
        let xml = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
  <soapenv:Body>
    <Respuesta>
      <EstadoRegistro>Correcto</EstadoRegistro>
    </Respuesta>
  </soapenv:Body>
</soapenv:Envelope>"#;
        assert!(parse_response(xml).is_ok());
    }

    #[test]
    fn soap_fault_is_a_protocol_error_not_a_rejection() {
        let xml = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
  <soapenv:Body>
    <soapenv:Fault>
      <faultcode>soapenv:Server</faultcode>
      <faultstring>internal error</faultstring>
    </soapenv:Fault>
  </soapenv:Body>
</soapenv:Envelope>"#;
        let err = parse_response(xml).unwrap_err();
        assert_eq!(err.kind, verifactu_types::error::ErrorKind::Soap);
        assert!(err.message.contains("internal error"));
    }

    #[test]
    fn missing_response_element_is_a_fatal_parse_error() {
        let xml = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
  <soapenv:Body>
    <SomethingElse/>
  </soapenv:Body>
</soapenv:Envelope>"#;
        let err = parse_response(xml).unwrap_err();
        assert_eq!(err.kind, verifactu_types::error::ErrorKind::Soap);
    }

    #[test]
    fn query_response_carries_registration_instant() {
        let xml = r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
  <soapenv:Body>
    <RespuestaConsultaFactuSistemaFacturacion>
      <EstadoRegistro>Correcto</EstadoRegistro>
      <FechaHoraRegistro>2024-01-15T10:30:00+01:00</FechaHoraRegistro>
    </RespuestaConsultaFactuSistemaFacturacion>
  </soapenv:Body>
</soapenv:Envelope>"#;
        let parsed = parse_response(xml).unwrap();
        assert_eq!(
            parsed.registration_instant.as_deref(),
            Some("2024-01-15T10:30:00+01:00")
        );
    }
}
