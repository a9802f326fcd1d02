//! Environment-indexed endpoint and QR-base lookups.
//!
//! Per the Design Notes, these tables are compile-time constants, not global
//! mutable state — `Environment` is a fieldless enum and all lookups are
//! `const fn`s or `match`es over it.

/// Either `production` or `sandbox`; selects the endpoint set and the QR
/// verification base URL.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum Environment {
    Production,
    Sandbox,
}

/// A logical SOAP operation: register, cancel, or query.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Operation {
    Register,
    Cancel,
    Query,
}

impl Environment {
    const fn host(self) -> &'static str {
        match self {
            Environment::Production => "www1.agenciatributaria.gob.es",
            Environment::Sandbox => "prewww1.aeat.es",
        }
    }

    /// The endpoint path for the given operation. Register and cancel share
    /// the `SuministroLR` endpoint; query uses `ConsultaLR`.
    const fn path(self, operation: Operation) -> &'static str {
        match operation {
            Operation::Register | Operation::Cancel => {
                "/wlpl/TIKE-CONT/ws/SistemaFacturacion/SuministroLR"
            }
            Operation::Query => "/wlpl/TIKE-CONT/ws/SistemaFacturacion/ConsultaLR",
        }
    }

    /// The full `https://` endpoint URL for the given operation.
    pub fn endpoint_url(self, operation: Operation) -> String {
        format!("https://{}{}", self.host(), self.path(operation))
    }

    /// The `SOAPAction` header value (unquoted) for the given operation.
    pub const fn soap_action(operation: Operation) -> &'static str {
        match operation {
            Operation::Register => "SuministroLRFacturasEmitidas",
            Operation::Cancel => "BajaLRFacturasEmitidas",
            Operation::Query => "ConsultaLRFacturasEmitidas",
        }
    }

    /// The base URL for customer-facing QR verification.
    pub const fn qr_base_url(self) -> &'static str {
        match self {
            Environment::Production => {
                "https://www2.agenciatributaria.gob.es/wlpl/TIKE-CONT/ValidarQR"
            }
            Environment::Sandbox => "https://prewww2.aeat.es/wlpl/TIKE-CONT/ValidarQR",
        }
    }
}

/// `soapenv` namespace URI.
pub const SOAPENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
/// `sum` namespace URI (the Verifactu schema).
pub const SUM_NS: &str = "https://www2.agenciatributaria.gob.es/static_files/common/internet/dep/aplicaciones/es/aeat/tike/cont/ws/SuministroLR.xsd";

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn register_and_cancel_share_endpoint() {
        assert_eq!(
            Environment::Production.endpoint_url(Operation::Register),
            Environment::Production.endpoint_url(Operation::Cancel),
        );
    }

    #[test]
    fn endpoints_differ_by_environment() {
        assert_ne!(
            Environment::Production.endpoint_url(Operation::Register),
            Environment::Sandbox.endpoint_url(Operation::Register),
        );
    }

    #[test]
    fn soap_actions_are_distinct() {
        let actions = [
            Environment::soap_action(Operation::Register),
            Environment::soap_action(Operation::Cancel),
            Environment::soap_action(Operation::Query),
        ];
        assert_ne!(actions[0], actions[1]);
        assert_ne!(actions[1], actions[2]);
    }
}
