//! Execution of a single verification row
//!
//! One row runs as: operator prompt (if the row needs rewiring), set, read back, settle, sample,
//! judge. The only waits are the operator prompt, the settle time and the gaps between samples;
//! each of them gives way to the abort signal. Bus operations are never interrupted because a
//! request cancelled after its write would leave the instrument's reply queued for the next one.
//!
//! Rows made through a standard resistor select the resistor right after the prompt. The
//! reference meter then reads the voltage across it, and currents are worked out from the
//! resistor's certified value.

use log::{ debug, warn };
use crate::{
    abort::AbortSignal,
    config::ProcedureConfig,
    error::CommunicationError,
    events::{ Event, EventSink },
    instrument::{ InstrumentInterface, ManualPrompt, ManualResponse, Role },
    procedure::RowSpec,
    report::{ Measurement, RowResult, StandardResistor },
    tolerance::{ closest_setpoint, resolve },
    units::{ Quantity, QuantityKind },
};

/// Why a series of readings was cut short
enum Interrupted
{
    Aborted,
    Failed(String),
}

pub struct StepExecutor<'a>
{
    procedure: &'a ProcedureConfig,
    events: &'a dyn EventSink,
    abort: &'a AbortSignal,
}

impl <'a> StepExecutor<'a>
{
    pub fn new(procedure: &'a ProcedureConfig, events: &'a dyn EventSink, abort: &'a AbortSignal) -> Self
    {
        Self {
            procedure: procedure,
            events: events,
            abort: abort,
        }
    }

    /// Executes one row and reports the outcome
    ///
    /// Never fails: instrument faults become an `ERROR` row, declined or aborted rows become
    /// `SKIPPED`. Emits `RowStarted` before touching anything and `RowCompleted` with the result.
    pub async fn execute<I>(&self, table: u8, index: usize, row: &RowSpec, bench: &mut I) -> RowResult
        where I: InstrumentInterface + ?Sized
    {
        self.events.emit(&Event::RowStarted {
            table: table,
            row: index,
            label: String::from(row.label()),
            nominal: row.nominal(),
        });

        let result = self.run_row(table, index, row, bench).await;
        self.events.emit(&Event::RowCompleted(result.clone()));

        result
    }

    async fn run_row<I>(&self, table: u8, index: usize, row: &RowSpec, bench: &mut I) -> RowResult
        where I: InstrumentInterface + ?Sized
    {
        if self.abort.is_raised() {
            return RowResult::skipped(table, index, row.label(), None, "run aborted before the row started");
        }

        if let Some(instruction) = row.manual_instruction() {
            let prompt = ManualPrompt {
                table: table,
                row: index,
                instruction: String::from(instruction),
            };
            self.events.emit(&Event::ManualStepRequired(prompt.clone()));

            let response = tokio::select! {
                biased;
                _ = self.abort.raised() => ManualResponse::Abort,
                response = bench.prompt_manual_step(&prompt) => response,
            };

            match response {
                ManualResponse::Proceed => {
                    debug!("table {} row {}: operator confirmed the connection", table, index + 1);
                }
                ManualResponse::Decline => {
                    return RowResult::skipped(table, index, row.label(), None, "operator declined the manual connection");
                }
                ManualResponse::Abort => {
                    self.abort.raise();
                    return RowResult::skipped(table, index, row.label(), None, "run aborted at the manual connection");
                }
            }
        }

        let standard = match row.standard_resistor() {
            Some(nominal) => match self.select_standard(nominal, bench).await {
                Ok(standard) => Some(standard),
                Err(err) => {
                    warn!("table {} row {}: selecting the {:.4} standard failed: {}", table, index + 1, nominal, err);
                    let detail = format!("set on {}: {}", Role::ResistanceStandard, err);
                    return RowResult::error(table, index, row.label(), None, detail);
                }
            },
            None => None,
        };

        self.measure(table, index, row, standard, bench).await.through(standard)
    }

    /// Connects the row's standard resistor and finds out what it actually is
    async fn select_standard<I>(&self, nominal: Quantity, bench: &mut I) -> Result<StandardResistor, CommunicationError>
        where I: InstrumentInterface + ?Sized
    {
        let role = Role::ResistanceStandard;
        let applied = bench.set_value(role, nominal).await?;

        let confirmed = match bench.read_setpoint(role, QuantityKind::Ohm).await {
            Ok(actual) => Some(actual),
            Err(err) => {
                debug!("no readback from {}: {}", role, err);
                applied
            }
        };

        let confirmed = confirmed
            .filter(|actual| actual.kind() == QuantityKind::Ohm && actual.is_finite() && actual.value() > 0.0);

        Ok(match confirmed {
            Some(actual) => StandardResistor {
                nominal: nominal,
                actual: actual,
                certified: true,
            },
            None => {
                warn!("{:.4} standard has no certified value; converting with its nominal", nominal);
                StandardResistor {
                    nominal: nominal,
                    actual: nominal,
                    certified: false,
                }
            }
        })
    }

    async fn measure<I>(
        &self,
        table: u8,
        index: usize,
        row: &RowSpec,
        standard: Option<StandardResistor>,
        bench: &mut I,
    ) -> RowResult
        where I: InstrumentInterface + ?Sized
    {
        let nominal = row.nominal();
        let step = row.granularity();
        let source = row.source_role();
        let meter = row.meter_role();
        let target = nominal.with_value(closest_setpoint(nominal.value(), step.value()));

        let applied = match bench.set_value(source, target).await {
            Ok(applied) => {
                debug!("{} applied {:?} for target {:.7}", source, applied, target);
                applied
            }
            Err(err) => {
                warn!("table {} row {}: setting {} failed: {}", table, index + 1, source, err);
                let point = resolve(nominal, row.tolerance(), step, || None);
                return RowResult::error(table, index, row.label(), Some(point), format!("set on {}: {}", source, err));
            }
        };

        // the reference meter watches the standard instead of being judged, so it supplies the setpoint
        let reference = standard.filter(|_| meter != Role::ReferenceMeter);

        let point = match reference {
            Some(_) => None,
            None => {
                let readback = match bench.read_setpoint(source, nominal.kind()).await {
                    Ok(value) => Some(value),
                    Err(err) => {
                        warn!("table {} row {}: no setpoint readback from {}: {}", table, index + 1, source, err);
                        applied
                    }
                };

                let point = resolve(nominal, row.tolerance(), step, move || readback);
                self.flag_estimate(table, index, source, point.setpoint_estimated, point.achieved);
                Some(point)
            }
        };

        let settle = row.settle_hint().unwrap_or(self.procedure.settle());
        debug!("settling {:?}", settle);

        if !self.abort.sleep(settle).await {
            return RowResult::skipped(table, index, row.label(), point, "run aborted while settling");
        }

        let point = match (point, reference) {
            (Some(point), _) => point,
            (None, Some(standard)) => {
                let volts = match self.sample(table, index, Role::ReferenceMeter, QuantityKind::Volt, bench).await {
                    Ok(volts) => volts,
                    Err(Interrupted::Aborted) => {
                        return RowResult::skipped(table, index, row.label(), None, "run aborted while sampling");
                    }
                    Err(Interrupted::Failed(detail)) => {
                        return RowResult::error(table, index, row.label(), None, detail);
                    }
                };

                let drop = volts.iter().sum::<f64>() / volts.len() as f64;
                let current = nominal.with_value(standard.current(drop));
                debug!("reference current {:.7} through {:.7}", current, standard.actual);

                let point = resolve(nominal, row.tolerance(), step, move || Some(current));
                self.flag_estimate(table, index, Role::ReferenceMeter, point.setpoint_estimated, point.achieved);
                point
            }
            (None, None) => resolve(nominal, row.tolerance(), step, || None),
        };

        let kind = nominal.kind();
        let converted = standard.filter(|_| meter == Role::ReferenceMeter);
        let reading_kind = if converted.is_some() { QuantityKind::Volt } else { kind };

        let readings = match self.sample(table, index, meter, reading_kind, bench).await {
            Ok(readings) => readings,
            Err(Interrupted::Aborted) => {
                return RowResult::skipped(table, index, row.label(), Some(point), "run aborted while sampling");
            }
            Err(Interrupted::Failed(detail)) => {
                return RowResult::error(table, index, row.label(), Some(point), detail);
            }
        };

        let readings: Vec<f64> = match converted {
            Some(standard) => readings.into_iter().map(|volts| standard.current(volts)).collect(),
            None => readings,
        };

        match Measurement::from_samples(kind, &readings) {
            Some(measured) => RowResult::judged(table, index, row.label(), point, measured),
            None => RowResult::error(table, index, row.label(), Some(point), "no readings were taken"),
        }
    }

    fn flag_estimate(&self, table: u8, index: usize, source: Role, estimated: bool, achieved: Quantity)
    {
        if estimated {
            warn!(
                "table {} row {}: achieved value of {} is estimated as {:.7}; limits are unconfirmed",
                table,
                index + 1,
                source,
                achieved,
            );
        }
    }

    /// Takes the configured number of readings of `kind` from `meter`
    async fn sample<I>(
        &self,
        table: u8,
        index: usize,
        meter: Role,
        kind: QuantityKind,
        bench: &mut I,
    ) -> Result<Vec<f64>, Interrupted>
        where I: InstrumentInterface + ?Sized
    {
        let sample_count = self.procedure.samples_per_point.max(1) as usize;
        let mut readings = Vec::with_capacity(sample_count);

        for sample in 0..sample_count {
            if sample > 0 && !self.abort.sleep(self.procedure.sample_delay()).await {
                return Err(Interrupted::Aborted);
            }

            match bench.read_value(meter, kind).await {
                Ok(reading) if reading.kind() == kind && reading.is_finite() => readings.push(reading.value()),
                Ok(reading) => {
                    return Err(Interrupted::Failed(format!(
                        "read on {}: expected a finite {} reading, got {:?}",
                        meter,
                        kind,
                        reading,
                    )));
                }
                Err(err) => {
                    warn!("table {} row {}: reading {} failed: {}", table, index + 1, meter, err);
                    return Err(Interrupted::Failed(format!("read on {}: {}", meter, err)));
                }
            }
        }

        Ok(readings)
    }
}
