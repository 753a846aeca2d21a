//! Run configuration
//!
//! These structures are what a configuration loader hands the engine. They deserialize with
//! `serde` from whatever format the caller prefers; reading files is not done here. Everything is
//! checked once by [`InstrumentConfig::validate`] and [`ProcedureConfig::validate`] before the
//! first instrument is touched.

use std::{
    collections::BTreeMap,
    time::Duration,
};
use serde::{ Deserialize, Serialize };
use crate::{
    error::ConfigurationError,
    instrument::Role,
};

fn default_timeout_ms() -> u32
{
    15_000
}

fn default_settle_s() -> f64
{
    1.0
}

fn default_samples_per_point() -> u32
{
    5
}

fn default_sample_delay_s() -> f64
{
    0.2
}

/// A free-form per-instrument setting, e.g. an integration time or a characterized value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue
{
    Flag(bool),
    Number(f64),
    Text(String),
}

/// How to reach one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionParams
{
    /// Bus resource name, e.g. `GPIB0::23::INSTR`
    pub resource: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u32,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParamValue>,
}

impl ConnectionParams
{
    pub fn new(resource: impl Into<String>) -> Self
    {
        Self {
            resource: resource.into(),
            timeout_ms: default_timeout_ms(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn timeout_ms(mut self, timeout_ms: u32) -> Self
    {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn parameter(mut self, name: impl Into<String>, value: ParamValue) -> Self
    {
        self.parameters.insert(name.into(), value);
        self
    }

    /// A numeric parameter, if present and numeric
    pub fn number(&self, name: &str) -> Option<f64>
    {
        match self.parameters.get(name) {
            Some(ParamValue::Number(value)) => Some(*value),
            _ => None,
        }
    }
}

/// Static map of bench roles to connection parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig
{
    pub instruments: BTreeMap<Role, ConnectionParams>,
}

impl InstrumentConfig
{
    pub fn new() -> Self
    {
        Self::default()
    }

    pub fn instrument(mut self, role: Role, params: ConnectionParams) -> Self
    {
        self.instruments.insert(role, params);
        self
    }

    pub fn get(&self, role: Role) -> Option<&ConnectionParams>
    {
        self.instruments.get(&role)
    }

    pub fn require(&self, role: Role) -> Result<&ConnectionParams, ConfigurationError>
    {
        self.get(role).ok_or(ConfigurationError::MissingInstrument(role))
    }

    pub fn roles(&self) -> impl Iterator<Item = Role> + '_
    {
        self.instruments.keys().copied()
    }

    /// A DUT must be configured and every entry must name a resource and a usable timeout
    pub fn validate(&self) -> Result<(), ConfigurationError>
    {
        self.require(Role::Dut)?;

        for (role, params) in self.instruments.iter() {
            if params.resource.trim().is_empty() {
                return Err(ConfigurationError::InvalidConnection {
                    role: *role,
                    reason: String::from("resource name is empty"),
                });
            }

            if params.timeout_ms == 0 {
                return Err(ConfigurationError::InvalidConnection {
                    role: *role,
                    reason: String::from("timeout must be greater than zero"),
                });
            }

            for (name, value) in params.parameters.iter() {
                if let ParamValue::Number(number) = value {
                    if !number.is_finite() {
                        return Err(ConfigurationError::InvalidConnection {
                            role: *role,
                            reason: format!("parameter `{}` is not a finite number", name),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

/// What the table runner does after a row ends in `ERROR`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowErrorPolicy
{
    /// Record the error and go on to the next row
    #[default]
    Continue,
    /// Mark every remaining row of the table `ERROR` without running it
    HaltTable,
}

/// What the session does after a table ends in `ERROR`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableErrorPolicy
{
    /// Record the table and go on to the next one
    #[default]
    Continue,
    /// Stop the run; no further tables are started
    AbortSession,
}

/// Measurement timing and failure policies for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureConfig
{
    /// Default wait between applying a setpoint and measuring, for rows without their own hint
    #[serde(default = "default_settle_s")]
    pub settle_s: f64,
    /// Readings averaged into each measured value
    #[serde(default = "default_samples_per_point")]
    pub samples_per_point: u32,
    /// Wait between consecutive readings
    #[serde(default = "default_sample_delay_s")]
    pub sample_delay_s: f64,
    #[serde(default)]
    pub row_errors: RowErrorPolicy,
    #[serde(default)]
    pub table_errors: TableErrorPolicy,
}

impl Default for ProcedureConfig
{
    fn default() -> Self
    {
        Self {
            settle_s: default_settle_s(),
            samples_per_point: default_samples_per_point(),
            sample_delay_s: default_sample_delay_s(),
            row_errors: RowErrorPolicy::default(),
            table_errors: TableErrorPolicy::default(),
        }
    }
}

impl ProcedureConfig
{
    pub fn row_errors(mut self, policy: RowErrorPolicy) -> Self
    {
        self.row_errors = policy;
        self
    }

    pub fn table_errors(mut self, policy: TableErrorPolicy) -> Self
    {
        self.table_errors = policy;
        self
    }

    pub fn settle_s(mut self, seconds: f64) -> Self
    {
        self.settle_s = seconds;
        self
    }

    pub fn sampling(mut self, samples_per_point: u32, sample_delay_s: f64) -> Self
    {
        self.samples_per_point = samples_per_point;
        self.sample_delay_s = sample_delay_s;
        self
    }

    pub fn settle(&self) -> Duration
    {
        Duration::try_from_secs_f64(self.settle_s).unwrap_or(Duration::ZERO)
    }

    pub fn sample_delay(&self) -> Duration
    {
        Duration::try_from_secs_f64(self.sample_delay_s).unwrap_or(Duration::ZERO)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError>
    {
        if !(self.settle_s.is_finite() && self.settle_s >= 0.0) {
            return Err(ConfigurationError::InvalidProcedure {
                field: "settle_s",
                reason: format!("{} is not a non-negative number of seconds", self.settle_s),
            });
        }

        if !(self.sample_delay_s.is_finite() && self.sample_delay_s >= 0.0) {
            return Err(ConfigurationError::InvalidProcedure {
                field: "sample_delay_s",
                reason: format!("{} is not a non-negative number of seconds", self.sample_delay_s),
            });
        }

        if self.samples_per_point == 0 {
            return Err(ConfigurationError::InvalidProcedure {
                field: "samples_per_point",
                reason: String::from("at least one reading is needed per point"),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use super::{ ConnectionParams, InstrumentConfig, ParamValue, ProcedureConfig };
    use crate::{
        error::ConfigurationError,
        instrument::Role,
    };

    #[test]
    fn dut_is_required()
    {
        let config = InstrumentConfig::new()
            .instrument(Role::ReferenceMeter, ConnectionParams::new("GPIB0::22::INSTR"));

        assert_eq!(config.validate(), Err(ConfigurationError::MissingInstrument(Role::Dut)));
    }

    #[test]
    fn empty_resource_is_rejected()
    {
        let config = InstrumentConfig::new().instrument(Role::Dut, ConnectionParams::new(" "));
        assert!(matches!(config.validate(), Err(ConfigurationError::InvalidConnection { role: Role::Dut, .. })));
    }

    #[test]
    fn zero_timeout_is_rejected()
    {
        let config = InstrumentConfig::new()
            .instrument(Role::Dut, ConnectionParams::new("GPIB0::24::INSTR").timeout_ms(0));

        assert!(config.validate().is_err());
    }

    #[test]
    fn numeric_parameters_are_readable()
    {
        let params = ConnectionParams::new("manual")
            .parameter("100G", ParamValue::Number(100.12e9))
            .parameter("note", ParamValue::Text(String::from("box 2")));

        assert_eq!(params.number("100G"), Some(100.12e9));
        assert_eq!(params.number("note"), None);
        assert_eq!(params.number("1G"), None);
    }

    #[test]
    fn procedure_defaults_match_bench_practice()
    {
        let config = ProcedureConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.samples_per_point, 5);
        assert_eq!(config.settle().as_millis(), 1000);
        assert_eq!(config.sample_delay().as_millis(), 200);
    }

    #[test]
    fn procedure_rejects_bad_timing()
    {
        assert!(ProcedureConfig::default().settle_s(-1.0).validate().is_err());
        assert!(ProcedureConfig::default().sampling(0, 0.1).validate().is_err());
        assert!(ProcedureConfig::default().sampling(3, f64::NAN).validate().is_err());
    }
}
