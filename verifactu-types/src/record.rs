//! The record data model (§3 Data Model).

use rust_decimal::Decimal;

use crate::error::VerifactuError;

/// An invoice identifier: optional series, mandatory number, issue date.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InvoiceIdentity {
    pub series: Option<String>,
    pub number: String,
    pub issue_date: chrono::NaiveDate,
}

impl InvoiceIdentity {
    pub fn new(
        series: Option<impl Into<String>>,
        number: impl Into<String>,
        issue_date: chrono::NaiveDate,
    ) -> Self {
        InvoiceIdentity {
            series: series.map(Into::into),
            number: number.into(),
            issue_date,
        }
    }

    /// Concatenation of series (if any) and number, no separator — the
    /// `NumSerieFactura` wire value.
    pub fn concatenated_series_number(&self) -> String {
        match &self.series {
            Some(series) => format!("{series}{}", self.number),
            None => self.number.clone(),
        }
    }
}

/// A recipient's tax identifier, with kind and country.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecipientTaxId {
    pub value: String,
    pub kind: String,
    pub country: String,
}

/// An invoice recipient.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Recipient {
    pub tax_id: RecipientTaxId,
    pub name: String,
}

/// A single VAT sub-breakdown line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VatLine {
    pub tax_base: Decimal,
    pub rate: Decimal,
    pub vat_amount: Decimal,
    pub equivalence_surcharge_rate: Option<Decimal>,
    pub equivalence_surcharge_amount: Option<Decimal>,
}

/// An exempt sub-breakdown line: tax-base plus an exemption-cause code.
#[derive(Clone, Debug, PartialEq)]
pub struct ExemptLine {
    pub tax_base: Decimal,
    pub exemption_cause: String,
}

/// A non-subject sub-breakdown line: amount plus a non-subject-cause code.
#[derive(Clone, Debug, PartialEq)]
pub struct NonSubjectLine {
    pub amount: Decimal,
    pub non_subject_cause: String,
}

/// The tax breakdown: up to three ordered sub-lists, any non-empty
/// combination permitted but at least one required.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaxBreakdown {
    pub vat: Vec<VatLine>,
    pub exempt: Vec<ExemptLine>,
    pub non_subject: Vec<NonSubjectLine>,
}

/// 0.01 tolerance used throughout the breakdown arithmetic invariants.
const AMOUNT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

impl TaxBreakdown {
    /// Builds a breakdown, checking the two arithmetic invariants from §3
    /// that are load-bearing for a correct hash/envelope: each VAT line's
    /// `vat_amount = round2(tax_base * rate / 100)` within 0.01 tolerance,
    /// and the overall breakdown is non-empty.
    ///
    /// Does not check the breakdown-total-equals-record-total invariant;
    /// that needs the record's stated total and is checked by
    /// [`Registration::new`].
    pub fn new(
        vat: Vec<VatLine>,
        exempt: Vec<ExemptLine>,
        non_subject: Vec<NonSubjectLine>,
    ) -> Result<Self, VerifactuError> {
        if vat.is_empty() && exempt.is_empty() && non_subject.is_empty() {
            return Err(VerifactuError::validation(
                "tax breakdown must have at least one sub-breakdown",
            )
            .with_field("breakdown"));
        }
        for line in &vat {
            let expected = round2(line.tax_base * line.rate / Decimal::new(100, 0));
            if (expected - line.vat_amount).abs() > AMOUNT_TOLERANCE {
                return Err(VerifactuError::validation(format!(
                    "VAT amount {} doesn't match tax_base*rate/100 = {expected} \
                     within 0.01 tolerance",
                    line.vat_amount
                ))
                .with_field("breakdown.vat"));
            }
        }
        Ok(TaxBreakdown {
            vat,
            exempt,
            non_subject,
        })
    }

    /// Sum of VAT amounts across VAT sub-breakdowns — the `CuotaTotal` wire
    /// value and the fingerprint input field of the same name.
    pub fn total_vat(&self) -> Decimal {
        self.vat.iter().map(|l| l.vat_amount).sum()
    }

    /// Σ(tax-base + VAT + surcharge) + Σexempt + Σnon-subject, the value
    /// checked against the record's stated total.
    pub fn total_breakdown_amount(&self) -> Decimal {
        let vat_total: Decimal = self
            .vat
            .iter()
            .map(|l| l.tax_base + l.vat_amount + l.equivalence_surcharge_amount.unwrap_or_default())
            .sum();
        let exempt_total: Decimal = self.exempt.iter().map(|l| l.tax_base).sum();
        let non_subject_total: Decimal = self.non_subject.iter().map(|l| l.amount).sum();
        vat_total + exempt_total + non_subject_total
    }
}

/// Rounds to 2 decimal places, half-away-from-zero (never banker's rounding),
/// per §3's "All amounts stored to 2 decimal places using banker-free,
/// half-away-from-zero rounding."
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// Rectification kind: incremental (`I`) or substitutive (`S`).
#[derive(Copy, Clone, Debug, Eq, PartialEq, strum::Display, strum::EnumString)]
pub enum RectificationKind {
    #[strum(serialize = "I")]
    Incremental,
    #[strum(serialize = "S")]
    Substitutive,
}

/// Rectification metadata: kind plus an ordered, non-empty list of
/// prior-invoice references.
#[derive(Clone, Debug, PartialEq)]
pub struct RectificationInfo {
    pub kind: RectificationKind,
    pub rectified_invoices: Vec<InvoiceIdentity>,
}

/// The embedded software descriptor.
///
/// Per the Design Notes, the installation number is (deliberately, matching
/// the source) written into both `IdSistemaInformatico` and
/// `NumeroInstalacion` in the envelope, and `IndicadorMultiplesOT` is always
/// emitted as `N`.
#[derive(Clone, Debug, PartialEq)]
pub struct SoftwareDescriptor {
    pub developer_name: String,
    pub developer_nif: String,
    pub system_name: String,
    pub version: String,
    pub installation_number: String,
}

/// A registration record (operation `A`).
#[derive(Clone, Debug, PartialEq)]
pub struct Registration {
    pub issuer_tax_id: String,
    pub issuer_name: String,
    pub invoice: InvoiceIdentity,
    pub invoice_type: String,
    pub recipients: Vec<Recipient>,
    pub description: Option<String>,
    pub operation_regimes: Vec<String>,
    pub breakdown: TaxBreakdown,
    pub total_amount: Decimal,
    pub rectification: Option<RectificationInfo>,
    pub software: Option<SoftwareDescriptor>,
}

impl Registration {
    /// Checks the record-level invariant: breakdown total equals the
    /// record's stated total within 0.01 tolerance. One or more
    /// operation-regime codes are required.
    pub fn validate(&self) -> Result<(), VerifactuError> {
        if self.operation_regimes.is_empty() {
            return Err(VerifactuError::validation(
                "at least one operation-regime code is required",
            )
            .with_field("operation_regimes"));
        }
        let breakdown_total = self.breakdown.total_breakdown_amount();
        if (breakdown_total - self.total_amount).abs() > AMOUNT_TOLERANCE {
            return Err(VerifactuError::validation(format!(
                "breakdown total {breakdown_total} doesn't match stated total \
                 {} within 0.01 tolerance",
                self.total_amount
            ))
            .with_field("total_amount"));
        }
        Ok(())
    }
}

/// A cancellation record (operation `AN`).
#[derive(Clone, Debug, PartialEq)]
pub struct Cancellation {
    pub invoice: InvoiceIdentity,
    pub issuer_tax_id: String,
    pub reason: Option<String>,
}

/// A tagged union of the two record variants, distinguished by an operation
/// discriminator (`A` for registration, `AN` for cancellation).
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    Registration(Registration),
    Cancellation(Cancellation),
}

impl Record {
    pub fn issuer_tax_id(&self) -> &str {
        match self {
            Record::Registration(r) => &r.issuer_tax_id,
            Record::Cancellation(c) => &c.issuer_tax_id,
        }
    }

    pub fn invoice(&self) -> &InvoiceIdentity {
        match self {
            Record::Registration(r) => &r.invoice,
            Record::Cancellation(c) => &c.invoice,
        }
    }

    /// The `A`/`AN` operation discriminator.
    pub fn operation_code(&self) -> &'static str {
        match self {
            Record::Registration(_) => "A",
            Record::Cancellation(_) => "AN",
        }
    }

    pub fn as_registration(&self) -> Option<&Registration> {
        match self {
            Record::Registration(r) => Some(r),
            Record::Cancellation(_) => None,
        }
    }

    pub fn as_cancellation(&self) -> Option<&Cancellation> {
        match self {
            Record::Cancellation(c) => Some(c),
            Record::Registration(_) => None,
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use super::*;

    fn invoice() -> InvoiceIdentity {
        InvoiceIdentity::new(
            Some("A"),
            "001",
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        )
    }

    #[test]
    fn concatenated_series_number_no_separator() {
        assert_eq!(invoice().concatenated_series_number(), "A001");
    }

    #[test]
    fn concatenated_series_number_no_series() {
        let inv = InvoiceIdentity::new(
            None::<String>,
            "001",
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
        );
        assert_eq!(inv.concatenated_series_number(), "001");
    }

    #[test]
    fn vat_line_amount_mismatch_is_rejected() {
        let err = TaxBreakdown::new(
            vec![VatLine {
                tax_base: dec!(100.00),
                rate: dec!(21),
                vat_amount: dec!(20.00), // should be 21.00
                equivalence_surcharge_rate: None,
                equivalence_surcharge_amount: None,
            }],
            vec![],
            vec![],
        )
        .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Validation);
    }

    #[test]
    fn vat_line_within_tolerance_accepted() {
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
        assert_eq!(breakdown.total_vat(), dec!(21.00));
    }

    #[test]
    fn empty_breakdown_rejected() {
        let err = TaxBreakdown::new(vec![], vec![], vec![]).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Validation);
    }

    #[test]
    fn round2_half_away_from_zero() {
        assert_eq!(round2(dec!(1.005)), dec!(1.01));
        assert_eq!(round2(dec!(-1.005)), dec!(-1.01));
        assert_eq!(round2(dec!(2.675)), dec!(2.68));
    }

    #[test]
    fn registration_total_mismatch_rejected() {
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
        let reg = Registration {
            issuer_tax_id: "B12345678".into(),
            issuer_name: "Test Co SL".into(),
            invoice: invoice(),
            invoice_type: "F1".into(),
            recipients: vec![],
            description: None,
            operation_regimes: vec!["01".into()],
            breakdown,
            total_amount: dec!(999.00), // should be 121.00
            rectification: None,
            software: None,
        };
        assert!(reg.validate().is_err());
    }
}
