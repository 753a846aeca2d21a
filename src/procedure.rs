//! Verification table and row definitions
//!
//! Tables are plain data consumed by one uniform executor. A row never carries logic of its own:
//! everything that differs between the manual's tables is a field here.

use std::time::Duration;
use serde::{ Deserialize, Serialize };
use crate::{
    error::ConfigurationError,
    instrument::Role,
    tolerance::ToleranceSpec,
    units::{ Quantity, QuantityKind },
};

/// One verification point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowSpec
{
    label: String,
    nominal: Quantity,
    tolerance: ToleranceSpec,
    step: Option<Quantity>,
    source: Role,
    meter: Role,
    manual_connection: Option<String>,
    settle: Option<Duration>,
    /// Nominal of the standard resistor the current is made through
    standard: Option<Quantity>,
}

impl RowSpec
{
    /// A row sourced by the DUT and measured by the reference meter, with no quantization
    ///
    /// `label` is the range name from the manual, e.g. "200mV".
    pub fn new(label: impl Into<String>, nominal: Quantity, tolerance: ToleranceSpec) -> Self
    {
        Self {
            label: label.into(),
            nominal: nominal,
            tolerance: tolerance,
            step: None,
            source: Role::Dut,
            meter: Role::ReferenceMeter,
            manual_connection: None,
            settle: None,
            standard: None,
        }
    }

    /// Smallest increment the source can be set in
    pub fn step(mut self, granularity: Quantity) -> Self
    {
        self.step = Some(granularity);
        self
    }

    /// Which instrument applies the value
    pub fn source(mut self, role: Role) -> Self
    {
        self.source = role;
        self
    }

    /// Which instrument takes the reading that is judged
    pub fn meter(mut self, role: Role) -> Self
    {
        self.meter = role;
        self
    }

    /// Require the operator to change the wiring before this row runs
    pub fn manual_connection(mut self, instruction: impl Into<String>) -> Self
    {
        self.manual_connection = Some(instruction.into());
        self
    }

    /// Overrides the configured settle time for this row
    pub fn settle_time(mut self, settle: Duration) -> Self
    {
        self.settle = Some(settle);
        self
    }

    /// The current flows through the standard resistor with this nominal, and the reference meter
    /// reads the voltage across it
    ///
    /// The reference current is that voltage divided by the resistor's certified value. When the
    /// reference meter is the row's meter, the converted readings are what is judged. Otherwise the
    /// reference current stands in for the source's setpoint readback.
    pub fn through_standard(mut self, nominal: Quantity) -> Self
    {
        self.standard = Some(nominal);
        self
    }

    pub fn label(&self) -> &str
    {
        &self.label
    }

    pub fn nominal(&self) -> Quantity
    {
        self.nominal
    }

    pub fn tolerance(&self) -> &ToleranceSpec
    {
        &self.tolerance
    }

    /// The source's step granularity, or a zero step when the source is not quantized
    pub fn granularity(&self) -> Quantity
    {
        self.step.unwrap_or(self.nominal.with_value(0.0))
    }

    pub fn source_role(&self) -> Role
    {
        self.source
    }

    pub fn meter_role(&self) -> Role
    {
        self.meter
    }

    pub fn manual_instruction(&self) -> Option<&str>
    {
        self.manual_connection.as_deref()
    }

    pub fn manual_connection_required(&self) -> bool
    {
        self.manual_connection.is_some()
    }

    pub fn settle_hint(&self) -> Option<Duration>
    {
        self.settle
    }

    pub fn standard_resistor(&self) -> Option<Quantity>
    {
        self.standard
    }

    /// Every role this row talks to
    pub fn roles(&self) -> Vec<Role>
    {
        let mut roles = vec![self.source, self.meter];

        if self.standard.is_some() {
            roles.extend([Role::ResistanceStandard, Role::ReferenceMeter]);
        }

        roles
    }

    fn check(&self) -> Result<(), String>
    {
        if !self.nominal.is_finite() {
            return Err(format!("nominal {} is not finite", self.nominal.value()));
        }

        self.tolerance.check(self.nominal.kind())?;

        if let Some(step) = self.step {
            if step.kind() != self.nominal.kind() {
                return Err(format!("step is in {} but the nominal is in {}", step.kind(), self.nominal.kind()));
            }
            if !(step.is_finite() && step.value() > 0.0) {
                return Err(format!("step {} is not a positive amount", step.value()));
            }
        }

        if let Some(standard) = self.standard {
            if self.nominal.kind() != QuantityKind::Ampere {
                return Err(format!("only currents can be made through a standard, not {}", self.nominal.kind()));
            }
            if standard.kind() != QuantityKind::Ohm || !(standard.is_finite() && standard.value() > 0.0) {
                return Err(format!("standard {:?} is not a positive resistance", standard));
            }
            if self.source == Role::ResistanceStandard {
                return Err(String::from("the standard cannot also be the source"));
            }
        }

        if let Some(instruction) = &self.manual_connection {
            if instruction.trim().is_empty() {
                return Err(String::from("manual connection step has no instruction for the operator"));
            }
        }

        Ok(())
    }
}

/// An ordered procedure table from the manual
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSpec
{
    number: u8,
    title: String,
    rows: Vec<RowSpec>,
}

impl TableSpec
{
    pub fn new(number: u8, title: impl Into<String>) -> Self
    {
        Self {
            number: number,
            title: title.into(),
            rows: Vec::new(),
        }
    }

    /// Appends a row. Rows run in the order they are added.
    pub fn row(mut self, row: RowSpec) -> Self
    {
        self.rows.push(row);
        self
    }

    pub fn rows(&self) -> &[RowSpec]
    {
        &self.rows
    }

    pub fn number(&self) -> u8
    {
        self.number
    }

    pub fn title(&self) -> &str
    {
        &self.title
    }

    /// Every role any row of this table uses
    pub fn roles(&self) -> impl Iterator<Item = Role> + '_
    {
        self.rows
            .iter()
            .flat_map(RowSpec::roles)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError>
    {
        if !(1..=16).contains(&self.number) {
            return Err(ConfigurationError::TableNumber(self.number));
        }

        for (index, row) in self.rows.iter().enumerate() {
            row.check().map_err(|reason| ConfigurationError::InvalidRow {
                table: self.number,
                row: index,
                reason: reason,
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests
{
    use super::{ RowSpec, TableSpec };
    use crate::{
        error::ConfigurationError,
        instrument::Role,
        tolerance::ToleranceSpec,
        units::Quantity,
    };

    fn volt_row() -> RowSpec
    {
        RowSpec::new("2V", Quantity::volts(2.0), ToleranceSpec::Percent(0.05))
    }

    #[test]
    fn builder_defaults_to_dut_source_and_reference_meter()
    {
        let row = volt_row();
        assert_eq!(row.source_role(), Role::Dut);
        assert_eq!(row.meter_role(), Role::ReferenceMeter);
        assert!(!row.manual_connection_required());
        assert_eq!(row.granularity().value(), 0.0);
    }

    #[test]
    fn table_keeps_row_order()
    {
        let table = TableSpec::new(3, "Output voltage")
            .row(RowSpec::new("a", Quantity::volts(1.0), ToleranceSpec::Percent(0.1)))
            .row(RowSpec::new("b", Quantity::volts(2.0), ToleranceSpec::Percent(0.1)))
            .row(RowSpec::new("c", Quantity::volts(3.0), ToleranceSpec::Percent(0.1)));

        let labels: Vec<&str> = table.rows().iter().map(|row| row.label()).collect();
        assert_eq!(labels, ["a", "b", "c"]);
    }

    #[test]
    fn table_number_out_of_range_is_rejected()
    {
        assert_eq!(TableSpec::new(0, "x").validate(), Err(ConfigurationError::TableNumber(0)));
        assert_eq!(TableSpec::new(17, "x").validate(), Err(ConfigurationError::TableNumber(17)));
        assert!(TableSpec::new(16, "x").validate().is_ok());
    }

    #[test]
    fn mismatched_tolerance_kind_is_rejected()
    {
        let table = TableSpec::new(4, "Measure voltage")
            .row(volt_row())
            .row(RowSpec::new("bad", Quantity::volts(2.0), ToleranceSpec::Absolute(Quantity::ohms(1.0))));

        match table.validate() {
            Err(ConfigurationError::InvalidRow { table, row, .. }) => {
                assert_eq!(table, 4);
                assert_eq!(row, 1);
            }
            other => panic!("unexpected validation outcome {:?}", other),
        }
    }

    #[test]
    fn step_must_be_positive_and_same_kind()
    {
        let zero_step = TableSpec::new(3, "x").row(volt_row().step(Quantity::volts(0.0)));
        let wrong_kind = TableSpec::new(3, "x").row(volt_row().step(Quantity::amperes(1e-6)));

        assert!(zero_step.validate().is_err());
        assert!(wrong_kind.validate().is_err());
        assert!(TableSpec::new(3, "x").row(volt_row().step(Quantity::volts(50e-6))).validate().is_ok());
    }

    #[test]
    fn manual_step_needs_an_instruction()
    {
        let table = TableSpec::new(11, "x").row(volt_row().manual_connection("   "));
        assert!(table.validate().is_err());
    }

    #[test]
    fn roles_lists_sources_and_meters()
    {
        let table = TableSpec::new(14, "x")
            .row(volt_row())
            .row(volt_row().source(Role::ResistanceStandard).meter(Role::Dut));

        let roles: Vec<Role> = table.roles().collect();
        assert_eq!(roles, [Role::Dut, Role::ReferenceMeter, Role::ResistanceStandard, Role::Dut]);
    }

    #[test]
    fn current_through_a_standard_needs_the_standard_and_the_reference_meter()
    {
        let row = RowSpec::new("1nA", Quantity::amperes(1e-9), ToleranceSpec::Percent(0.1))
            .source(Role::ReferenceSource)
            .meter(Role::Dut)
            .through_standard(Quantity::ohms(1e9));

        assert_eq!(row.standard_resistor(), Some(Quantity::ohms(1e9)));
        assert_eq!(
            row.roles(),
            [Role::ReferenceSource, Role::Dut, Role::ResistanceStandard, Role::ReferenceMeter],
        );
        assert!(TableSpec::new(13, "x").row(row).validate().is_ok());
    }

    #[test]
    fn only_currents_go_through_a_standard()
    {
        let voltage = TableSpec::new(11, "x").row(volt_row().through_standard(Quantity::ohms(1e9)));
        let not_ohms = TableSpec::new(11, "x").row(
            RowSpec::new("1nA", Quantity::amperes(1e-9), ToleranceSpec::Percent(0.1))
                .through_standard(Quantity::volts(1.0)),
        );

        assert!(voltage.validate().is_err());
        assert!(not_ohms.validate().is_err());
    }
}
