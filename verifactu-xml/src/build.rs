//! Builds the three SOAP envelope shapes (§4.3 Building).

use chrono::{DateTime, FixedOffset};
use quick_xml::{
    events::{BytesEnd, BytesStart, BytesText, Event},
    Writer,
};
use rust_decimal::Decimal;
use verifactu_types::{
    environment::SOAPENV_NS, environment::SUM_NS, ChainReference, Cancellation, InvoiceIdentity,
    ProcessedRecord, Record, Registration, SoftwareDescriptor,
};

use crate::escape::escape_text;

/// A thin helper over [`quick_xml::Writer`] that writes pre-escaped leaf
/// elements and tracks no state beyond the underlying byte buffer — the
/// nesting structure below does the bookkeeping via plain Rust scoping.
struct XmlBuilder {
    writer: Writer<Vec<u8>>,
}

impl XmlBuilder {
    fn new() -> Self {
        XmlBuilder {
            writer: Writer::new(Vec::new()),
        }
    }

    fn start(&mut self, tag: &str, attrs: &[(&str, &str)]) {
        let mut start = BytesStart::new(tag);
        for (key, value) in attrs {
            start.push_attribute((*key, *value));
        }
        self.writer
            .write_event(Event::Start(start))
            .expect("writing to an in-memory Vec<u8> never fails");
    }

    fn end(&mut self, tag: &str) {
        self.writer
            .write_event(Event::End(BytesEnd::new(tag)))
            .expect("writing to an in-memory Vec<u8> never fails");
    }

    /// Writes `<tag>escaped(content)</tag>`.
    fn leaf(&mut self, tag: &str, content: &str) {
        self.start(tag, &[]);
        let escaped = escape_text(content);
        self.writer
            .write_event(Event::Text(BytesText::from_escaped(escaped)))
            .expect("writing to an in-memory Vec<u8> never fails");
        self.end(tag);
    }

    fn into_string(self) -> String {
        String::from_utf8(self.writer.into_inner()).expect("we only ever write UTF-8 text")
    }
}

/// Formats a monetary amount identically to the fingerprint canonicalization
/// (two decimals, dot, signed).
fn amount(d: Decimal) -> String {
    verifactu_hash::format_amount(d)
}

/// `IDFactura`: issuer tax-id, concatenated series+number, issue date.
fn write_id_factura(b: &mut XmlBuilder, issuer_tax_id: &str, invoice: &InvoiceIdentity) {
    b.start("sum:IDFactura", &[]);
    b.leaf("sum:IDEmisorFactura", issuer_tax_id);
    b.leaf(
        "sum:NumSerieFactura",
        &invoice.concatenated_series_number(),
    );
    b.leaf(
        "sum:FechaExpedicionFactura",
        &invoice.issue_date.format("%Y-%m-%d").to_string(),
    );
    b.end("sum:IDFactura");
}

fn write_cabecera(b: &mut XmlBuilder, issuer_tax_id: &str, issuer_name: Option<&str>) {
    b.start("sum:Cabecera", &[]);
    b.start("sum:ObligadoEmision", &[]);
    if let Some(name) = issuer_name {
        b.leaf("sum:NombreRazon", name);
    }
    b.leaf("sum:NIF", issuer_tax_id);
    b.end("sum:ObligadoEmision");
    b.end("sum:Cabecera");
}

fn write_software(b: &mut XmlBuilder, software: &SoftwareDescriptor) {
    b.start("sum:SistemaInformatico", &[]);
    b.leaf("sum:NombreRazon", &software.developer_name);
    b.leaf("sum:NIF", &software.developer_nif);
    b.leaf("sum:NombreSistemaInformatico", &software.system_name);
    // Preserved from the source (see Design Notes): the installation number
    // is written into both IdSistemaInformatico and NumeroInstalacion.
    b.leaf("sum:IdSistemaInformatico", &software.installation_number);
    b.leaf("sum:Version", &software.version);
    b.leaf("sum:NumeroInstalacion", &software.installation_number);
    b.leaf("sum:TipoUsoPosibleSoloVerifactu", "N");
    b.leaf("sum:TipoUsoPosibleMultiOT", "N");
    b.leaf("sum:IndicadorMultiplesOT", "N");
    b.end("sum:SistemaInformatico");
}

fn write_encadenamiento(
    b: &mut XmlBuilder,
    issuer_tax_id: &str,
    chain_reference: Option<&ChainReference>,
) {
    b.start("sum:Encadenamiento", &[]);
    match chain_reference {
        None => b.leaf("sum:PrimerRegistro", "S"),
        Some(reference) => {
            b.start("sum:RegistroAnterior", &[]);
            b.leaf("sum:IDEmisorFactura", issuer_tax_id);
            b.leaf(
                "sum:NumSerieFactura",
                &match &reference.previous_series {
                    Some(series) => format!("{series}{}", reference.previous_number),
                    None => reference.previous_number.clone(),
                },
            );
            b.leaf(
                "sum:FechaExpedicionFactura",
                &reference.previous_date.format("%Y-%m-%d").to_string(),
            );
            b.leaf("sum:Huella", reference.previous_fingerprint.as_str());
            b.end("sum:RegistroAnterior");
        }
    }
    b.end("sum:Encadenamiento");
}

fn write_recipients(b: &mut XmlBuilder, recipients: &[verifactu_types::Recipient]) {
    if recipients.is_empty() {
        return;
    }
    b.start("sum:Destinatarios", &[]);
    for recipient in recipients {
        b.start("sum:IDDestinatario", &[]);
        b.leaf("sum:NombreRazon", &recipient.name);
        if recipient.tax_id.kind.eq_ignore_ascii_case("NIF") {
            b.leaf("sum:NIF", &recipient.tax_id.value);
        } else {
            b.start("sum:IDOtro", &[]);
            b.leaf("sum:CodigoPais", &recipient.tax_id.country);
            b.leaf("sum:IDType", &recipient.tax_id.kind);
            b.leaf("sum:ID", &recipient.tax_id.value);
            b.end("sum:IDOtro");
        }
        b.end("sum:IDDestinatario");
    }
    b.end("sum:Destinatarios");
}

fn write_breakdown(b: &mut XmlBuilder, breakdown: &verifactu_types::TaxBreakdown) {
    b.start("sum:Desglose", &[]);
    for line in &breakdown.vat {
        b.start("sum:DetalleDesglose", &[]);
        b.leaf("sum:BaseImponibleOimporteNoSujeto", &amount(line.tax_base));
        b.leaf("sum:TipoImpositivo", &amount(line.rate));
        b.leaf("sum:CuotaRepercutida", &amount(line.vat_amount));
        if let Some(rate) = line.equivalence_surcharge_rate {
            b.leaf("sum:TipoRecargoEquivalencia", &amount(rate));
        }
        if let Some(surcharge) = line.equivalence_surcharge_amount {
            b.leaf("sum:CuotaRecargoEquivalencia", &amount(surcharge));
        }
        b.end("sum:DetalleDesglose");
    }
    for line in &breakdown.exempt {
        b.start("sum:DetalleDesglose", &[]);
        b.leaf("sum:CausaExencion", &line.exemption_cause);
        b.leaf("sum:BaseImponibleOimporteNoSujeto", &amount(line.tax_base));
        b.end("sum:DetalleDesglose");
    }
    for line in &breakdown.non_subject {
        b.start("sum:DetalleDesglose", &[]);
        b.leaf("sum:CausaNoSujecion", &line.non_subject_cause);
        b.leaf("sum:ImporteNoSujeto", &amount(line.amount));
        b.end("sum:DetalleDesglose");
    }
    b.end("sum:Desglose");
}

fn write_registro_alta(
    b: &mut XmlBuilder,
    reg: &Registration,
    chain_reference: Option<&ChainReference>,
    fingerprint: &str,
    generated_at: DateTime<FixedOffset>,
) {
    b.start("sum:RegistroAlta", &[]);
    write_id_factura(b, &reg.issuer_tax_id, &reg.invoice);
    b.leaf("sum:NombreRazonEmisor", &reg.issuer_name);
    b.leaf("sum:TipoFactura", &reg.invoice_type);
    if let Some(rect) = &reg.rectification {
        b.leaf("sum:TipoRectificativa", &rect.kind.to_string());
        b.start("sum:FacturasRectificadas", &[]);
        for prior in &rect.rectified_invoices {
            write_id_factura(b, &reg.issuer_tax_id, prior);
        }
        b.end("sum:FacturasRectificadas");
    }
    if let Some(description) = &reg.description {
        b.leaf("sum:DescripcionOperacion", description);
    }
    write_recipients(b, &reg.recipients);
    for regime in &reg.operation_regimes {
        b.leaf("sum:ClaveRegimen", regime);
    }
    write_breakdown(b, &reg.breakdown);
    b.leaf("sum:CuotaTotal", &amount(reg.breakdown.total_vat()));
    b.leaf("sum:ImporteTotal", &amount(reg.total_amount));
    write_encadenamiento(b, &reg.issuer_tax_id, chain_reference);
    if let Some(software) = &reg.software {
        write_software(b, software);
    }
    b.leaf(
        "sum:FechaHoraHusoGenRegistro",
        &generated_at.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
    );
    b.leaf("sum:Huella", fingerprint);
    b.end("sum:RegistroAlta");
}

fn write_registro_anulacion(
    b: &mut XmlBuilder,
    cancellation: &Cancellation,
    chain_reference: Option<&ChainReference>,
    fingerprint: &str,
    generated_at: DateTime<FixedOffset>,
) {
    b.start("sum:RegistroAnulacion", &[]);
    write_id_factura(b, &cancellation.issuer_tax_id, &cancellation.invoice);
    if let Some(reason) = &cancellation.reason {
        b.leaf("sum:MotivoAnulacion", reason);
    }
    write_encadenamiento(b, &cancellation.issuer_tax_id, chain_reference);
    b.leaf(
        "sum:FechaHoraHusoGenRegistro",
        &generated_at.format("%Y-%m-%dT%H:%M:%S%:z").to_string(),
    );
    b.leaf("sum:Huella", fingerprint);
    b.end("sum:RegistroAnulacion");
}

fn soap_envelope(body: impl FnOnce(&mut XmlBuilder)) -> String {
    let mut b = XmlBuilder::new();
    b.start(
        "soapenv:Envelope",
        &[
            ("xmlns:soapenv", SOAPENV_NS),
            ("xmlns:sum", SUM_NS),
        ],
    );
    b.start("soapenv:Header", &[]);
    b.end("soapenv:Header");
    b.start("soapenv:Body", &[]);
    body(&mut b);
    b.end("soapenv:Body");
    b.end("soapenv:Envelope");
    b.into_string()
}

/// Builds the register envelope for `processed`.
///
/// `processed.record` must be a [`Record::Registration`] — building a
/// register envelope for a cancellation record is a caller bug, not a
/// recoverable runtime condition, so this panics rather than returning a
/// `Result` that would never be `Err` in correct code.
pub fn build_register(processed: &ProcessedRecord, generated_at: DateTime<FixedOffset>) -> String {
    let reg = processed
        .record
        .as_registration()
        .expect("build_register called with a non-registration record");
    soap_envelope(|b| {
        b.start("sum:RegFactuSistemaFacturacion", &[]);
        write_cabecera(b, &reg.issuer_tax_id, Some(&reg.issuer_name));
        b.start("sum:RegistroFactura", &[]);
        write_registro_alta(
            b,
            reg,
            processed.chain_reference.as_ref(),
            processed.fingerprint.as_str(),
            generated_at,
        );
        b.end("sum:RegistroFactura");
        b.end("sum:RegFactuSistemaFacturacion");
    })
}

/// Builds the cancel envelope for `processed`.
pub fn build_cancel(processed: &ProcessedRecord, generated_at: DateTime<FixedOffset>) -> String {
    let cancellation = processed
        .record
        .as_cancellation()
        .expect("build_cancel called with a non-cancellation record");
    soap_envelope(|b| {
        b.start("sum:RegFactuSistemaFacturacion", &[]);
        write_cabecera(b, &cancellation.issuer_tax_id, None);
        b.start("sum:RegistroFactura", &[]);
        write_registro_anulacion(
            b,
            cancellation,
            processed.chain_reference.as_ref(),
            processed.fingerprint.as_str(),
            generated_at,
        );
        b.end("sum:RegistroFactura");
        b.end("sum:RegFactuSistemaFacturacion");
    })
}

/// Builds the query envelope: `{issuer tax-id filter, invoice identity
/// filter}`, read-only — does not need a fingerprint or chain reference.
pub fn build_query(issuer_tax_id: &str, invoice: &InvoiceIdentity) -> String {
    soap_envelope(|b| {
        b.start("sum:ConsultaFactuSistemaFacturacion", &[]);
        write_cabecera(b, issuer_tax_id, None);
        b.start("sum:FiltroConsulta", &[]);
        write_id_factura(b, issuer_tax_id, invoice);
        b.end("sum:FiltroConsulta");
        b.end("sum:ConsultaFactuSistemaFacturacion");
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use verifactu_types::{Record, Registration, TaxBreakdown, VatLine};

    fn instant() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 1, 15, 10, 30, 0)
            .unwrap()
    }

    fn first_record() -> ProcessedRecord {
        let breakdown = TaxBreakdown::new(
            vec![VatLine {
                tax_base: dec!(100.00),
                rate: dec!(21),
                vat_amount: dec!(21.00),
                equivalence_surcharge_rate: None,
                equivalence_surcharge_amount: None,
            }],
            vec![],
            vec![],
        )
        .unwrap();
        let record = Record::Registration(Registration {
            issuer_tax_id: "B12345678".into(),
            issuer_name: "Test Co SL".into(),
            invoice: InvoiceIdentity::new(
                Some("A"),
                "001",
                chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            ),
            invoice_type: "F1".into(),
            recipients: vec![],
            description: None,
            operation_regimes: vec!["01".into()],
            breakdown,
            total_amount: dec!(121.00),
            rectification: None,
            software: None,
        });
        ProcessedRecord {
            record,
            fingerprint: "abc123".to_string().into(),
            chain_reference: None,
        }
    }

    #[test]
    fn register_envelope_contains_primer_registro_for_first_record() {
        let xml = build_register(&first_record(), instant());
        assert!(xml.contains("<sum:PrimerRegistro>S</sum:PrimerRegistro>"));
        assert!(xml.contains("<sum:Huella>abc123</sum:Huella>"));
        assert!(xml.contains("soapenv:Envelope"));
    }

    #[test]
    fn register_envelope_references_previous_record_when_chained() {
        let mut processed = first_record();
        processed.chain_reference = Some(ChainReference {
            previous_fingerprint: "prev-hash".to_string().into(),
            previous_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            previous_series: Some("A".into()),
            previous_number: "001".into(),
        });
        let xml = build_register(&processed, instant());
        assert!(xml.contains("<sum:RegistroAnterior>"));
        assert!(xml.contains("<sum:Huella>prev-hash</sum:Huella>"));
        assert!(!xml.contains("PrimerRegistro"));
    }

    #[test]
    fn register_envelope_escapes_special_characters_in_names() {
        let mut processed = first_record();
        if let Record::Registration(reg) = &mut processed.record {
            reg.issuer_name = "A & B <Corp>".into();
        }
        let xml = build_register(&processed, instant());
        assert!(xml.contains("A &amp; B &lt;Corp&gt;"));
        assert!(!xml.contains("A & B <Corp>"));
    }
}
