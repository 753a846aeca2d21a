//! Characterized passive standards
//!
//! A resistance standard such as a 5156A box has no bus. The operator connects one of its
//! resistors by hand, and its certificate gives the resistor's actual value. Selecting a nominal
//! reports the certified value as the setpoint readback, which moves the row's limits onto the
//! resistance actually in the circuit. A resistor with no certified value is still selected, but
//! its readback fails so the point is flagged as estimated.

use async_trait::async_trait;
use log::warn;
use crate::{
    config::ConnectionParams,
    error::{ CommunicationError, ConfigurationError },
    instrument::{ Instrument, Role },
    units::{ Quantity, QuantityKind },
};

/// Relative difference within which a requested nominal matches a characterized one
const NOMINAL_MATCH: f64 = 1e-6;

/// Parses a nominal key such as `100M`, `1G` or `19k` into ohms
pub fn parse_nominal(key: &str) -> Option<f64>
{
    let key = key.trim().trim_end_matches('Ω');
    let (number, multiplier) = match key.chars().last()? {
        'k' => (&key[..key.len() - 1], 1e3),
        'M' => (&key[..key.len() - 1], 1e6),
        'G' => (&key[..key.len() - 1], 1e9),
        'T' => (&key[..key.len() - 1], 1e12),
        _ => (key, 1.0),
    };

    number.parse::<f64>().ok().map(|value| value * multiplier)
}

pub struct CharacterizedStandard
{
    role: Role,
    name: String,
    /// `(nominal, actual)` pairs in ohms
    values: Vec<(f64, f64)>,
    selected: Option<Selection>,
}

/// The resistor currently connected
#[derive(Debug, Clone, Copy)]
enum Selection
{
    Certified(f64),
    /// Connected by nominal only, nothing on the certificate for it
    Uncertified(f64),
}

impl CharacterizedStandard
{
    pub fn new(role: Role, name: impl Into<String>) -> Self
    {
        Self {
            role: role,
            name: name.into(),
            values: Vec::new(),
            selected: None,
        }
    }

    /// Records the certified value of the resistor with the given nominal
    pub fn characterized(mut self, nominal: f64, actual: f64) -> Self
    {
        self.values.push((nominal, actual));
        self
    }

    /// Builds a standard from connection parameters whose numeric entries are keyed by nominal
    ///
    /// e.g. `"1G" = 1.00012e9`. Entries whose key is not a nominal are left alone.
    pub fn from_params(role: Role, params: &ConnectionParams) -> Result<Self, ConfigurationError>
    {
        let mut standard = Self::new(role, params.resource.clone());

        for name in params.parameters.keys() {
            let nominal = match parse_nominal(name) {
                Some(nominal) => nominal,
                None => continue,
            };

            let actual = params.number(name).ok_or_else(|| ConfigurationError::InvalidConnection {
                role: role,
                reason: format!("characterized value for `{}` is not a number", name),
            })?;

            if !(actual > 0.0) {
                return Err(ConfigurationError::InvalidConnection {
                    role: role,
                    reason: format!("characterized value for `{}` must be a positive resistance", name),
                });
            }

            standard = standard.characterized(nominal, actual);
        }

        Ok(standard)
    }

    /// The certified value for a nominal, if there is one
    pub fn actual_for(&self, nominal: f64) -> Option<f64>
    {
        self.values
            .iter()
            .find(|(candidate, _)| (candidate - nominal).abs() <= NOMINAL_MATCH * nominal.abs())
            .map(|(_, actual)| *actual)
    }
}

#[async_trait]
impl Instrument for CharacterizedStandard
{
    async fn identify(&mut self) -> Result<String, CommunicationError>
    {
        Ok(self.name.clone())
    }

    async fn set_value(&mut self, value: Quantity) -> Result<Option<Quantity>, CommunicationError>
    {
        if value.kind() != QuantityKind::Ohm {
            return Err(CommunicationError::Unsupported {
                role: self.role,
                operation: "sourcing",
                kind: value.kind(),
            });
        }

        match self.actual_for(value.value()) {
            Some(actual) => {
                self.selected = Some(Selection::Certified(actual));
                Ok(Some(value.with_value(actual)))
            }
            None => {
                warn!("{}: no characterized value for {:.4}; its actual value is unknown", self.role, value);
                self.selected = Some(Selection::Uncertified(value.value()));
                Ok(None)
            }
        }
    }

    async fn read_value(&mut self, kind: QuantityKind) -> Result<Quantity, CommunicationError>
    {
        Err(CommunicationError::Unsupported {
            role: self.role,
            operation: "measuring",
            kind: kind,
        })
    }

    async fn read_setpoint(&mut self, kind: QuantityKind) -> Result<Quantity, CommunicationError>
    {
        match (kind, self.selected) {
            (QuantityKind::Ohm, Some(Selection::Certified(actual))) => Ok(Quantity::ohms(actual)),
            (QuantityKind::Ohm, Some(Selection::Uncertified(nominal))) => Err(CommunicationError::Rejected {
                role: self.role,
                reason: format!("the {:.4} resistor has no certified value", Quantity::ohms(nominal)),
            }),
            (QuantityKind::Ohm, None) => Err(CommunicationError::Rejected {
                role: self.role,
                reason: String::from("no resistor has been selected"),
            }),
            (kind, _) => Err(CommunicationError::Unsupported {
                role: self.role,
                operation: "sourcing",
                kind: kind,
            }),
        }
    }

    async fn safe_state(&mut self) -> Result<(), CommunicationError>
    {
        self.selected = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use super::{ parse_nominal, CharacterizedStandard };
    use crate::{
        config::{ ConnectionParams, ParamValue },
        instrument::{ Instrument, Role },
        units::{ Quantity, QuantityKind },
    };

    #[test]
    fn nominal_keys()
    {
        assert_eq!(parse_nominal("100M"), Some(100e6));
        assert_eq!(parse_nominal("1G"), Some(1e9));
        assert_eq!(parse_nominal("19k"), Some(19e3));
        assert_eq!(parse_nominal("2TΩ"), Some(2e12));
        assert_eq!(parse_nominal("190"), Some(190.0));
        assert_eq!(parse_nominal("note"), None);
        assert_eq!(parse_nominal(""), None);
    }

    #[test]
    fn params_build_characterized_values()
    {
        let params = ConnectionParams::new("5156A S/N 1234")
            .parameter("1G", ParamValue::Number(1.00021e9))
            .parameter("100G", ParamValue::Number(99.987e9))
            .parameter("note", ParamValue::Text(String::from("recal due 2027")));

        let standard = CharacterizedStandard::from_params(Role::ResistanceStandard, &params).unwrap();
        assert_eq!(standard.actual_for(1e9), Some(1.00021e9));
        assert_eq!(standard.actual_for(100e9), Some(99.987e9));
        assert_eq!(standard.actual_for(10e9), None);
    }

    #[test]
    fn non_numeric_characterized_value_is_rejected()
    {
        let params = ConnectionParams::new("5156A").parameter("1G", ParamValue::Text(String::from("1.0002e9")));
        assert!(CharacterizedStandard::from_params(Role::ResistanceStandard, &params).is_err());
    }

    #[tokio::test]
    async fn selecting_reports_certified_value()
    {
        let mut standard = CharacterizedStandard::new(Role::ResistanceStandard, "5156A")
            .characterized(100e6, 100.013e6);

        assert!(standard.read_setpoint(QuantityKind::Ohm).await.is_err());

        let applied = standard.set_value(Quantity::ohms(100e6)).await.unwrap();
        assert_eq!(applied.map(|applied| applied.value()), Some(100.013e6));
        assert_eq!(standard.read_setpoint(QuantityKind::Ohm).await.unwrap().value(), 100.013e6);

        // a resistor off the certificate is connected but never confirmed
        let uncharacterized = standard.set_value(Quantity::ohms(19.0)).await.unwrap();
        assert!(uncharacterized.is_none());
        assert!(standard.read_setpoint(QuantityKind::Ohm).await.is_err());

        standard.set_value(Quantity::ohms(100e6)).await.unwrap();
        assert!(standard.read_setpoint(QuantityKind::Ohm).await.is_ok());
        standard.safe_state().await.unwrap();
        assert!(standard.read_setpoint(QuantityKind::Ohm).await.is_err());

        assert!(standard.set_value(Quantity::volts(1.0)).await.is_err());
        assert!(standard.read_value(QuantityKind::Ohm).await.is_err());
    }
}
