//! Performance verification tables of the 6430 reference manual, section 18
//!
//! Each table is plain [`TableSpec`] data. The manual publishes every point as a nominal with low
//! and high limits already evaluated at that nominal; those become a fixed half-width with
//! [`ToleranceSpec::from_limits`] so the window can follow the value actually achieved.
//!
//! Roles follow the usual bench: the unit under test sources and the reference meter measures for
//! the output accuracy tables, the calibrator sources and the unit under test measures for the
//! measurement accuracy tables, and the resistance tables use a characterized resistance standard.
//! Picoamp to nanoamp currents are made through a standard resistor: the reference meter reads the
//! voltage across it and the current is that voltage over the resistor's certified value.
//!
//! The 2GΩ to 20TΩ ranges are checked with a resistor of half the range. Their published limits
//! are scaled to a percentage of reading so they apply to the resistor actually connected.

use std::time::Duration;
use crate::{
    instrument::Role,
    procedure::{ RowSpec, TableSpec },
    tolerance::ToleranceSpec,
    units::{ Quantity, QuantityKind },
};

/// Source resolution of the unit under test as a fraction of range
const SOURCE_RESOLUTION: f64 = 5e-5;

/// Wait used on the picoamp and teraohm points, where the input takes seconds to settle
const SLOW_SETTLE: Duration = Duration::from_secs(5);

/// Table 18-2: maximum compliance for each measurement range
pub const COMPLIANCE: [(&str, QuantityKind, f64); 16] = [
    ("200mV", QuantityKind::Volt, 0.210),
    ("2V", QuantityKind::Volt, 2.1),
    ("20V", QuantityKind::Volt, 21.0),
    ("200V", QuantityKind::Volt, 210.0),
    ("1pA", QuantityKind::Ampere, 1.05e-12),
    ("10pA", QuantityKind::Ampere, 10.5e-12),
    ("100pA", QuantityKind::Ampere, 105e-12),
    ("1nA", QuantityKind::Ampere, 1.05e-9),
    ("10nA", QuantityKind::Ampere, 10.5e-9),
    ("100nA", QuantityKind::Ampere, 105e-9),
    ("1uA", QuantityKind::Ampere, 1.05e-6),
    ("10uA", QuantityKind::Ampere, 10.5e-6),
    ("100uA", QuantityKind::Ampere, 105e-6),
    ("1mA", QuantityKind::Ampere, 1.05e-3),
    ("10mA", QuantityKind::Ampere, 10.5e-3),
    ("100mA", QuantityKind::Ampere, 0.105),
];

/// Maximum compliance of a measurement range, by the manual's range name
pub fn compliance(range: &str) -> Option<Quantity>
{
    COMPLIANCE
        .iter()
        .find(|(name, _, _)| *name == range)
        .map(|(_, kind, value)| Quantity::new(*kind, *value))
}

/// `(range, nominal, low, high)` in base units
type Limits = (&'static str, f64, f64, f64);

/// `(range, standard, nominal, low, high)` in base units, for points made with a standard resistor
///
/// `low` and `high` are published against `nominal`.
type StandardLimits = (&'static str, f64, f64, f64, f64);

const OUTPUT_VOLTAGE: [Limits; 4] = [
    ("200mV", 0.200000, 0.199360, 0.200640),
    ("2V", 2.00000, 1.99900, 2.00100),
    ("20V", 20.0000, 19.9936, 20.0064),
    ("200V", 200.000, 199.936, 200.064),
];

const MEASURE_VOLTAGE: [Limits; 4] = [
    ("200mV", 0.200000, 0.199626, 0.200374),
    ("2V", 2.00000, 1.99941, 2.00059),
    ("20V", 20.0000, 19.9955, 20.0045),
    ("200V", 200.000, 199.960, 200.040),
];

const MAINFRAME_OUTPUT_CURRENT: [Limits; 6] = [
    ("1uA", 1.00000e-6, 0.99905e-6, 1.00095e-6),
    ("10uA", 10.0000e-6, 9.9947e-6, 10.0053e-6),
    ("100uA", 100.000e-6, 99.949e-6, 100.051e-6),
    ("1mA", 1.00000e-3, 0.99946e-3, 1.00054e-3),
    ("10mA", 10.0000e-3, 9.9935e-3, 10.0065e-3),
    ("100mA", 0.100000, 0.099914, 0.100086),
];

const MEASURE_CURRENT: [Limits; 6] = [
    ("1uA", 1.000000e-6, 0.99920e-6, 1.00080e-6),
    ("10uA", 10.00000e-6, 9.9930e-6, 10.0070e-6),
    ("100uA", 100.000e-6, 99.969e-6, 100.031e-6),
    ("1mA", 1.00000e-3, 0.99967e-3, 1.00033e-3),
    ("10mA", 10.0000e-3, 9.9959e-3, 10.0041e-3),
    ("100mA", 0.100000, 0.099939, 0.100061),
];

const PREAMP_OUTPUT_CURRENT: [Limits; 6] = [
    ("1uA", 1.00000e-6, 0.99920e-6, 1.00080e-6),
    ("10uA", 10.0000e-6, 9.9930e-6, 10.0070e-6),
    ("100uA", 100.000e-6, 99.949e-6, 100.051e-6),
    ("1mA", 1.00000e-3, 0.99946e-3, 1.00054e-3),
    ("10mA", 10.0000e-3, 9.9935e-3, 10.0065e-3),
    ("100mA", 0.100000, 0.099914, 0.100086),
];

const PREAMP_OUTPUT_LOW_CURRENT: [StandardLimits; 6] = [
    ("1pA", 100e9, 1.00000e-12, 0.97950e-12, 1.02050e-12),
    ("10pA", 100e9, 10.0000e-12, 9.9150e-12, 10.0085e-12),
    ("100pA", 10e9, 100.000e-12, 99.770e-12, 100.230e-12),
    ("1nA", 1e9, 1.00000e-9, 0.99900e-9, 1.00100e-9),
    ("10nA", 1e9, 10.0000e-9, 9.9990e-9, 10.0100e-9),
    ("100nA", 100e6, 100.000e-9, 99.910e-9, 100.090e-9),
];

const PREAMP_MEASURE_LOW_CURRENT: [StandardLimits; 6] = [
    ("1pA", 100e9, 1.000000e-12, 0.98300e-12, 1.01700e-12),
    ("10pA", 100e9, 10.00000e-12, 9.9430e-12, 10.0570e-12),
    ("100pA", 10e9, 100.000e-12, 99.820e-12, 100.180e-12),
    ("1nA", 1e9, 1.00000e-9, 0.99930e-9, 1.00070e-9),
    ("10nA", 1e9, 10.0000e-9, 9.9930e-9, 10.0070e-9),
    ("100nA", 100e6, 100.000e-9, 99.930e-9, 100.070e-9),
];

const MEASURE_RESISTANCE: [Limits; 8] = [
    ("20Ω", 19.0, 18.920, 19.080),
    ("200Ω", 190.0, 189.950, 190.050),
    ("2kΩ", 1900.0, 1899.70, 1900.30),
    ("20kΩ", 19000.0, 18997.0, 19003.0),
    ("200kΩ", 190000.0, 189960.0, 190040.0),
    ("2MΩ", 1.9e6, 1.89950e6, 1.90050e6),
    ("20MΩ", 19e6, 18.9950e6, 19.0050e6),
    ("200MΩ", 190e6, 189.916e6, 190.084e6),
];

const MEASURE_HIGH_RESISTANCE: [StandardLimits; 3] = [
    ("2GΩ", 1e9, 2.00000e9, 1.9200e9, 2.0800e9),
    ("20GΩ", 10e9, 20.0000e9, 19.503e9, 20.497e9),
    ("200GΩ", 100e9, 200.000e9, 195.03e9, 204.97e9),
];

const MEASURE_TERAOHM: [StandardLimits; 2] = [
    ("2TΩ", 1e12, 2.00000e12, 1.9110e12, 2.0890e12),
    ("20TΩ", 10e12, 20.0000e12, 18.890e12, 21.110e12),
];

fn limit_row(kind: QuantityKind, (label, nominal, low, high): Limits) -> RowSpec
{
    RowSpec::new(
        label,
        Quantity::new(kind, nominal),
        ToleranceSpec::from_limits(Quantity::new(kind, nominal), Quantity::new(kind, low), Quantity::new(kind, high)),
    )
}

/// A row sourced by the unit under test in steps of its source resolution
fn sourced(kind: QuantityKind, limits: Limits) -> RowSpec
{
    let step = Quantity::new(kind, limits.1 * SOURCE_RESOLUTION);
    limit_row(kind, limits).step(step)
}

/// A row the unit under test measures from the calibrator
fn measured(kind: QuantityKind, limits: Limits) -> RowSpec
{
    limit_row(kind, limits)
        .source(Role::ReferenceSource)
        .meter(Role::Dut)
}

/// Attaches the table's wiring instruction to its first row
fn first_connection(mut rows: Vec<RowSpec>, instruction: &str) -> Vec<RowSpec>
{
    if let Some(first) = rows.first_mut() {
        *first = first.clone().manual_connection(instruction);
    }
    rows
}

fn table(number: u8, title: &str, rows: Vec<RowSpec>) -> TableSpec
{
    rows.into_iter().fold(TableSpec::new(number, title), TableSpec::row)
}

fn standard_name(ohms: f64) -> String
{
    format!("{}", Quantity::ohms(ohms))
}

fn slow(label: &str) -> bool
{
    matches!(label, "1pA" | "10pA" | "2TΩ" | "20TΩ")
}

pub fn mainframe_output_voltage() -> TableSpec
{
    let rows = OUTPUT_VOLTAGE.iter().map(|limits| sourced(QuantityKind::Volt, *limits)).collect();
    table(3, "Mainframe output voltage accuracy", first_connection(
        rows,
        "Connect the reference meter to the mainframe INPUT/OUTPUT HI and LO. Reference meter on DCV.",
    ))
}

pub fn mainframe_measure_voltage() -> TableSpec
{
    let rows = MEASURE_VOLTAGE.iter().map(|limits| measured(QuantityKind::Volt, *limits)).collect();
    table(4, "Mainframe voltage measurement accuracy", first_connection(
        rows,
        "Connect the calibrator output to the mainframe INPUT/OUTPUT HI and LO. Unit under test on MEAS V.",
    ))
}

pub fn mainframe_output_current() -> TableSpec
{
    let rows = MAINFRAME_OUTPUT_CURRENT.iter().map(|limits| sourced(QuantityKind::Ampere, *limits)).collect();
    table(5, "Mainframe output current accuracy", first_connection(
        rows,
        "Connect the reference meter AMPS and INPUT LO to the mainframe INPUT/OUTPUT HI and LO. Reference meter on DCI.",
    ))
}

pub fn mainframe_measure_current() -> TableSpec
{
    let rows = MEASURE_CURRENT.iter().map(|limits| measured(QuantityKind::Ampere, *limits)).collect();
    table(6, "Mainframe current measurement accuracy", first_connection(
        rows,
        "Connect the calibrator current output to the mainframe INPUT/OUTPUT HI and LO. Unit under test on MEAS I.",
    ))
}

pub fn mainframe_measure_resistance() -> TableSpec
{
    let rows = MEASURE_RESISTANCE[..7].iter().map(|limits| resistance(*limits, "mainframe")).collect();
    table(7, "Mainframe resistance measurement accuracy", rows)
}

pub fn preamp_output_voltage() -> TableSpec
{
    let rows = OUTPUT_VOLTAGE.iter().map(|limits| sourced(QuantityKind::Volt, *limits)).collect();
    table(8, "Remote PreAmp output voltage accuracy", first_connection(
        rows,
        "Connect the Remote PreAmp. Connect the reference meter to the PreAmp triax output. Reference meter on DCV.",
    ))
}

pub fn preamp_measure_voltage() -> TableSpec
{
    let rows = MEASURE_VOLTAGE.iter().map(|limits| measured(QuantityKind::Volt, *limits)).collect();
    table(9, "Remote PreAmp voltage measurement accuracy", first_connection(
        rows,
        "Connect the calibrator output to the PreAmp triax input. Unit under test on MEAS V.",
    ))
}

pub fn preamp_output_current() -> TableSpec
{
    let rows = PREAMP_OUTPUT_CURRENT.iter().map(|limits| sourced(QuantityKind::Ampere, *limits)).collect();
    table(10, "Remote PreAmp 1uA-100mA range output current accuracy", first_connection(
        rows,
        "Connect the reference meter AMPS and INPUT LO to the PreAmp triax output. Reference meter on DCI.",
    ))
}

/// Low currents are sourced into a standard resistor whose voltage the reference meter reads
pub fn preamp_output_low_current() -> TableSpec
{
    let rows = PREAMP_OUTPUT_LOW_CURRENT
        .iter()
        .map(|&(label, standard, nominal, low, high)| {
            let row = sourced(QuantityKind::Ampere, (label, nominal, low, high))
                .through_standard(Quantity::ohms(standard))
                .manual_connection(format!(
                    "Connect the {} standard to the PreAmp output. Reference meter on DCV across the standard.",
                    standard_name(standard),
                ));
            if slow(label) { row.settle_time(SLOW_SETTLE) } else { row }
        })
        .collect();

    table(11, "Remote PreAmp 1pA-100nA range output current accuracy", rows)
}

pub fn preamp_measure_current() -> TableSpec
{
    let rows = MEASURE_CURRENT.iter().map(|limits| measured(QuantityKind::Ampere, *limits)).collect();
    table(12, "Remote PreAmp 1uA-100mA range current measurement accuracy", first_connection(
        rows,
        "Connect the calibrator current output to the PreAmp triax input. Unit under test on MEAS I.",
    ))
}

/// Low currents are made by the calibrator driving a standard resistor into the PreAmp input
pub fn preamp_measure_low_current() -> TableSpec
{
    let rows = PREAMP_MEASURE_LOW_CURRENT
        .iter()
        .map(|&(label, standard, nominal, low, high)| {
            let row = measured(QuantityKind::Ampere, (label, nominal, low, high))
                .through_standard(Quantity::ohms(standard))
                .manual_connection(format!(
                    "Connect the calibrator through the {} standard to the PreAmp triax input. Reference meter on DCV across the standard.",
                    standard_name(standard),
                ));
            if slow(label) { row.settle_time(SLOW_SETTLE) } else { row }
        })
        .collect();

    table(13, "Remote PreAmp 1pA-100nA range current measurement accuracy", rows)
}

pub fn preamp_measure_low_resistance() -> TableSpec
{
    let rows = MEASURE_RESISTANCE.iter().map(|limits| resistance(*limits, "PreAmp")).collect();
    table(14, "Remote PreAmp 20Ω-200MΩ range resistance measurement accuracy", rows)
}

pub fn preamp_measure_high_resistance() -> TableSpec
{
    table(15, "Remote PreAmp 2GΩ-200GΩ range resistance measurement accuracy", high_resistance(&MEASURE_HIGH_RESISTANCE))
}

pub fn preamp_measure_teraohm() -> TableSpec
{
    table(16, "Remote PreAmp 2TΩ and 20TΩ range resistance measurement accuracy", high_resistance(&MEASURE_TERAOHM))
}

fn resistance(limits: Limits, input: &str) -> RowSpec
{
    limit_row(QuantityKind::Ohm, limits)
        .source(Role::ResistanceStandard)
        .meter(Role::Dut)
        .manual_connection(format!(
            "Connect the {} standard resistor to the {} input (4-wire).",
            standard_name(limits.1),
            input,
        ))
}

fn high_resistance(points: &[StandardLimits]) -> Vec<RowSpec>
{
    points
        .iter()
        .map(|&(label, standard, nominal, low, high)| {
            let half_width = (nominal - low).min(high - nominal);
            let tolerance = ToleranceSpec::Percent(100.0 * half_width / nominal);

            let row = RowSpec::new(label, Quantity::ohms(standard), tolerance)
                .source(Role::ResistanceStandard)
                .meter(Role::Dut)
                .manual_connection(format!(
                    "Connect the {} standard to the PreAmp triax input through the guarded fixture.",
                    standard_name(standard),
                ));
            if slow(label) { row.settle_time(SLOW_SETTLE) } else { row }
        })
        .collect()
}

/// Every verification table of the section, in manual order
pub fn tables() -> Vec<TableSpec>
{
    vec![
        mainframe_output_voltage(),
        mainframe_measure_voltage(),
        mainframe_output_current(),
        mainframe_measure_current(),
        mainframe_measure_resistance(),
        preamp_output_voltage(),
        preamp_measure_voltage(),
        preamp_output_current(),
        preamp_output_low_current(),
        preamp_measure_current(),
        preamp_measure_low_current(),
        preamp_measure_low_resistance(),
        preamp_measure_high_resistance(),
        preamp_measure_teraohm(),
    ]
}

/// One table by its number in the manual
pub fn table_by_number(number: u8) -> Option<TableSpec>
{
    tables().into_iter().find(|table| table.number() == number)
}
