//! Verification results
//!
//! Results are append-only: a [`RowResult`] is never changed once made, a [`TableResult`] only
//! grows, and the [`SessionReport`] is handed off as a plain value when the run ends. Rendering and
//! storing reports is left to the caller; everything here serializes with `serde`.

use std::fmt;
use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };
use crate::{
    config::{ InstrumentConfig, ProcedureConfig },
    tolerance::ResolvedPoint,
    units::{ Quantity, QuantityKind },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict
{
    /// The reading fell inside the limits
    Pass,
    /// The reading fell outside the limits
    Fail,
    /// The row was not executed, by operator choice or because the run was aborted
    Skipped,
    /// An instrument fault kept the row from completing
    Error,
}

impl Verdict
{
    pub fn passed(&self) -> bool
    {
        match self {
            Self::Pass => true,
            _ => false,
        }
    }

    /// `PASS` iff every verdict is `PASS`, `ERROR` if any is `ERROR`, otherwise `FAIL`
    ///
    /// An empty collection passes.
    pub fn aggregate<I>(verdicts: I) -> Self
        where I: IntoIterator<Item = Verdict>
    {
        let mut combined = Self::Pass;

        for verdict in verdicts {
            match verdict {
                Self::Error => return Self::Error,
                Self::Pass => {}
                _ => combined = Self::Fail,
            }
        }

        combined
    }
}

impl fmt::Display for Verdict
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Skipped => "SKIPPED",
            Self::Error => "ERROR",
        })
    }
}

/// A series of readings reduced to one measured value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement
{
    /// Arithmetic mean of the readings
    pub mean: Quantity,
    /// Sample standard deviation (N - 1) in base units, zero for fewer than two readings
    ///
    /// This is the scatter of the series, not an uncertainty budget.
    pub stdev: f64,
    pub samples: usize,
}

impl Measurement
{
    /// Returns `None` for an empty series
    pub fn from_samples(kind: QuantityKind, readings: &[f64]) -> Option<Self>
    {
        if readings.is_empty() {
            return None;
        }

        let count = readings.len() as f64;
        let mean = readings.iter().sum::<f64>() / count;

        let stdev = if readings.len() < 2 {
            0.0
        }
        else {
            let squares: f64 = readings.iter().map(|reading| (reading - mean).powi(2)).sum();
            (squares / (count - 1.0)).sqrt()
        };

        Some(Self {
            mean: Quantity::new(kind, mean),
            stdev: stdev,
            samples: readings.len(),
        })
    }
}

/// The standard resistor a current was converted through
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StandardResistor
{
    pub nominal: Quantity,
    /// The value the current was worked out with
    pub actual: Quantity,
    /// `actual` came from the standard's certificate rather than its nominal
    pub certified: bool,
}

impl StandardResistor
{
    /// Converts a voltage across the resistor into the current through it
    pub fn current(&self, volts: f64) -> f64
    {
        volts / self.actual.value()
    }
}

/// The outcome of one executed (or skipped) row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowResult
{
    pub table: u8,
    /// Zero-based position of the row in its table
    pub row: usize,
    /// The manual's range name for the row
    pub label: String,
    /// Setpoint and limits, absent when the row never reached the instruments
    pub point: Option<ResolvedPoint>,
    pub measured: Option<Measurement>,
    pub verdict: Verdict,
    /// Why the row did not produce a normal judgement, e.g. the raw bus error
    pub detail: Option<String>,
    /// Set on rows whose current was made through a standard resistor
    pub standard: Option<StandardResistor>,
    pub timestamp: DateTime<Utc>,
}

impl RowResult
{
    /// Judges a measurement against the point's limits
    pub fn judged(table: u8, row: usize, label: &str, point: ResolvedPoint, measured: Measurement) -> Self
    {
        let verdict = if point.contains(measured.mean.value()) { Verdict::Pass } else { Verdict::Fail };

        Self {
            table: table,
            row: row,
            label: String::from(label),
            point: Some(point),
            measured: Some(measured),
            verdict: verdict,
            detail: None,
            standard: None,
            timestamp: Utc::now(),
        }
    }

    pub fn skipped(table: u8, row: usize, label: &str, point: Option<ResolvedPoint>, detail: impl Into<String>) -> Self
    {
        Self {
            table: table,
            row: row,
            label: String::from(label),
            point: point,
            measured: None,
            verdict: Verdict::Skipped,
            detail: Some(detail.into()),
            standard: None,
            timestamp: Utc::now(),
        }
    }

    pub fn through(mut self, standard: Option<StandardResistor>) -> Self
    {
        self.standard = standard;
        self
    }

    pub fn error(table: u8, row: usize, label: &str, point: Option<ResolvedPoint>, detail: impl Into<String>) -> Self
    {
        Self {
            table: table,
            row: row,
            label: String::from(label),
            point: point,
            measured: None,
            verdict: Verdict::Error,
            detail: Some(detail.into()),
            standard: None,
            timestamp: Utc::now(),
        }
    }
}

/// Results of one table, in row order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableResult
{
    pub number: u8,
    pub title: String,
    rows: Vec<RowResult>,
    verdict: Verdict,
    /// The row-error policy stopped the table early
    pub halted: bool,
    /// The run was aborted while this table was running
    pub aborted: bool,
}

impl TableResult
{
    pub fn new(number: u8, title: impl Into<String>) -> Self
    {
        Self {
            number: number,
            title: title.into(),
            rows: Vec::new(),
            verdict: Verdict::Pass,
            halted: false,
            aborted: false,
        }
    }

    pub(crate) fn push(&mut self, row: RowResult)
    {
        self.rows.push(row);
        self.verdict = Verdict::aggregate(self.rows.iter().map(|row| row.verdict));
    }

    pub fn rows(&self) -> &[RowResult]
    {
        &self.rows
    }

    pub fn verdict(&self) -> Verdict
    {
        self.verdict
    }
}

/// How a run came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion
{
    /// Every table was run
    Completed,
    /// The table-error policy stopped the run after the given table
    Halted
    {
        table: u8,
    },
    /// The operator aborted the run
    Aborted,
}

/// Everything recorded during one verification run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport
{
    tables: Vec<TableResult>,
    verdict: Verdict,
    completion: Completion,
    pub started: DateTime<Utc>,
    pub finished: Option<DateTime<Utc>>,
    /// The instrument configuration the run was made with
    pub instruments: InstrumentConfig,
    pub procedure: ProcedureConfig,
}

impl SessionReport
{
    pub fn begin(instruments: InstrumentConfig, procedure: ProcedureConfig) -> Self
    {
        Self {
            tables: Vec::new(),
            verdict: Verdict::Pass,
            completion: Completion::Completed,
            started: Utc::now(),
            finished: None,
            instruments: instruments,
            procedure: procedure,
        }
    }

    pub(crate) fn push(&mut self, table: TableResult)
    {
        self.tables.push(table);
    }

    /// Stamps the end time and settles the overall verdict
    ///
    /// The overall verdict is the conjunction of the table verdicts, except that a run which did not
    /// complete is never `PASS`.
    pub(crate) fn finish(&mut self, completion: Completion)
    {
        self.completion = completion;
        self.finished = Some(Utc::now());

        let combined = Verdict::aggregate(self.tables.iter().map(|table| table.verdict()));
        self.verdict = match (combined, completion) {
            (Verdict::Pass, Completion::Completed) => Verdict::Pass,
            (Verdict::Pass, _) => Verdict::Fail,
            (other, _) => other,
        };
    }

    pub fn tables(&self) -> &[TableResult]
    {
        &self.tables
    }

    pub fn table(&self, number: u8) -> Option<&TableResult>
    {
        self.tables.iter().find(|table| table.number == number)
    }

    pub fn verdict(&self) -> Verdict
    {
        self.verdict
    }

    pub fn completion(&self) -> Completion
    {
        self.completion
    }

    /// Every row of every table, in execution order
    pub fn rows(&self) -> impl Iterator<Item = &RowResult>
    {
        self.tables.iter().flat_map(|table| table.rows().iter())
    }

    /// Rows that did not pass
    pub fn exceptions(&self) -> impl Iterator<Item = &RowResult>
    {
        self.rows().filter(|row| !row.verdict.passed())
    }
}

#[cfg(test)]
mod tests
{
    use super::{ Completion, Measurement, RowResult, SessionReport, TableResult, Verdict };
    use crate::{
        config::{ InstrumentConfig, ProcedureConfig },
        tolerance::{ resolve, ToleranceSpec },
        units::{ Quantity, QuantityKind },
    };

    fn row(verdict: Verdict) -> RowResult
    {
        match verdict {
            Verdict::Skipped => RowResult::skipped(3, 0, "2V", None, "declined"),
            Verdict::Error => RowResult::error(3, 0, "2V", None, "timeout"),
            _ => {
                let point = resolve(Quantity::volts(2.0), &ToleranceSpec::Percent(0.05), Quantity::volts(0.001), || None);
                let reading = if verdict.passed() { 2.0 } else { 2.5 };
                let measured = Measurement::from_samples(QuantityKind::Volt, &[reading]).unwrap();
                RowResult::judged(3, 0, "2V", point, measured)
            }
        }
    }

    #[test]
    fn aggregate_rules()
    {
        use Verdict::*;

        assert_eq!(Verdict::aggregate(std::iter::empty()), Pass);
        assert_eq!(Verdict::aggregate([Pass, Pass]), Pass);
        assert_eq!(Verdict::aggregate([Pass, Fail, Pass]), Fail);
        assert_eq!(Verdict::aggregate([Pass, Skipped]), Fail);
        assert_eq!(Verdict::aggregate([Fail, Error, Skipped]), Error);
    }

    #[test]
    fn judged_row_is_inclusive()
    {
        let point = resolve(Quantity::volts(10.0), &ToleranceSpec::Absolute(Quantity::volts(0.5)), Quantity::volts(0.5), || None);
        let on_edge = Measurement::from_samples(QuantityKind::Volt, &[10.5]).unwrap();
        let outside = Measurement::from_samples(QuantityKind::Volt, &[10.6]).unwrap();

        assert_eq!(RowResult::judged(3, 0, "x", point.clone(), on_edge).verdict, Verdict::Pass);
        assert_eq!(RowResult::judged(3, 0, "x", point, outside).verdict, Verdict::Fail);
    }

    #[test]
    fn measurement_statistics()
    {
        let measured = Measurement::from_samples(QuantityKind::Volt, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(measured.mean.value(), 2.5);
        assert!((measured.stdev - 1.2909944487358056).abs() < 1e-12);
        assert_eq!(measured.samples, 4);

        let single = Measurement::from_samples(QuantityKind::Volt, &[1.0]).unwrap();
        assert_eq!(single.stdev, 0.0);

        assert!(Measurement::from_samples(QuantityKind::Volt, &[]).is_none());
    }

    #[test]
    fn table_verdict_follows_rows()
    {
        let mut table = TableResult::new(3, "Output voltage");
        table.push(row(Verdict::Pass));
        assert_eq!(table.verdict(), Verdict::Pass);
        table.push(row(Verdict::Fail));
        assert_eq!(table.verdict(), Verdict::Fail);
        table.push(row(Verdict::Error));
        assert_eq!(table.verdict(), Verdict::Error);
        table.push(row(Verdict::Pass));
        assert_eq!(table.verdict(), Verdict::Error);
    }

    #[test]
    fn incomplete_run_never_passes()
    {
        let mut table = TableResult::new(3, "Output voltage");
        table.push(row(Verdict::Pass));

        let mut report = SessionReport::begin(InstrumentConfig::new(), ProcedureConfig::default());
        report.push(table);
        report.finish(Completion::Aborted);

        assert_eq!(report.verdict(), Verdict::Fail);
        assert!(report.finished.is_some());
    }

    #[test]
    fn exceptions_lists_non_passing_rows()
    {
        let mut table = TableResult::new(5, "Output current");
        table.push(row(Verdict::Pass));
        table.push(row(Verdict::Skipped));
        table.push(row(Verdict::Fail));

        let mut report = SessionReport::begin(InstrumentConfig::new(), ProcedureConfig::default());
        report.push(table);
        report.finish(Completion::Completed);

        let verdicts: Vec<Verdict> = report.exceptions().map(|row| row.verdict).collect();
        assert_eq!(verdicts, [Verdict::Skipped, Verdict::Fail]);
        assert_eq!(report.verdict(), Verdict::Fail);
        assert!(report.table(5).is_some());
        assert!(report.table(6).is_none());
    }
}
