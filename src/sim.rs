//! Simulated bench
//!
//! A [`SimulatedBench`] stands in for the whole rack: whatever a source applies is what every meter
//! sees, scaled by that meter's own gain error. A current applied while a resistance is connected
//! is seen by voltmeters as the drop across it. Sources can be quantized, miscalibrated, deaf to
//! setpoint queries or made to fail on a given value, which is enough to dry-run a procedure and
//! to exercise every path of the executor without hardware. Every call is recorded in a
//! [`Journal`] that stays readable after the bench has been handed to a session.

use std::{
    collections::{ BTreeMap, BTreeSet, VecDeque },
    sync::{ Arc, Mutex },
};
use async_trait::async_trait;
use log::debug;
use crate::{
    error::CommunicationError,
    instrument::{ InstrumentInterface, ManualPrompt, ManualResponse, Role },
    tolerance::closest_setpoint,
    units::{ Quantity, QuantityKind },
};

/// Relative difference within which a set request matches a scripted fault
const FAULT_MATCH: f64 = 1e-9;

/// One call made on a [`SimulatedBench`]
#[derive(Debug, Clone, PartialEq)]
pub enum SimCall
{
    Open,
    Set(Role, Quantity),
    Read(Role, QuantityKind),
    ReadSetpoint(Role, QuantityKind),
    Prompt(ManualPrompt),
    Close,
}

impl SimCall
{
    /// Whether the call talks to an instrument rather than the operator
    pub fn is_instrument_call(&self) -> bool
    {
        match self {
            Self::Set(..) | Self::Read(..) | Self::ReadSetpoint(..) => true,
            _ => false,
        }
    }
}

/// Shared record of the calls made on a bench
#[derive(Debug, Clone, Default)]
pub struct Journal
{
    calls: Arc<Mutex<Vec<SimCall>>>,
}

impl Journal
{
    fn record(&self, call: SimCall)
    {
        let mut calls = self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        calls.push(call);
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<SimCall>
    {
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    pub fn count<F>(&self, predicate: F) -> usize
        where F: Fn(&SimCall) -> bool
    {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    /// The values set on `role`, in order
    pub fn sets(&self, role: Role) -> Vec<Quantity>
    {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SimCall::Set(target, value) if target == role => Some(value),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct SourceModel
{
    step: Option<f64>,
    gain_ppm: f64,
    readback: bool,
}

impl Default for SourceModel
{
    fn default() -> Self
    {
        Self {
            step: None,
            gain_ppm: 0.0,
            readback: true,
        }
    }
}

#[derive(Debug)]
pub struct SimulatedBench
{
    journal: Journal,
    sources: BTreeMap<Role, SourceModel>,
    meter_gain_ppm: BTreeMap<Role, f64>,
    noise: f64,
    set_faults: Vec<(Role, f64)>,
    read_faults: BTreeSet<Role>,
    open_fault: bool,
    responses: VecDeque<ManualResponse>,
    stall_prompts: bool,
    applied: Option<(Role, Quantity)>,
    /// The last resistance applied, which currents flow through
    resistance: Option<Quantity>,
    readings: u64,
}

impl Default for SimulatedBench
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl SimulatedBench
{
    /// An ideal bench: exact sources, exact meters and an operator who always proceeds
    pub fn new() -> Self
    {
        Self {
            journal: Journal::default(),
            sources: BTreeMap::new(),
            meter_gain_ppm: BTreeMap::new(),
            noise: 0.0,
            set_faults: Vec::new(),
            read_faults: BTreeSet::new(),
            open_fault: false,
            responses: VecDeque::new(),
            stall_prompts: false,
            applied: None,
            resistance: None,
            readings: 0,
        }
    }

    /// A handle on the call record that outlives the bench
    pub fn journal(&self) -> Journal
    {
        self.journal.clone()
    }

    /// `role` can only be set in multiples of `step` (base units)
    pub fn quantize(mut self, role: Role, step: f64) -> Self
    {
        self.sources.entry(role).or_default().step = Some(step);
        self
    }

    /// What `role` produces is off by `ppm` parts per million of its setting
    pub fn source_gain_ppm(mut self, role: Role, ppm: f64) -> Self
    {
        self.sources.entry(role).or_default().gain_ppm = ppm;
        self
    }

    /// `role` cannot report what it is producing
    pub fn without_readback(mut self, role: Role) -> Self
    {
        self.sources.entry(role).or_default().readback = false;
        self
    }

    /// What `role` reads is off by `ppm` parts per million of the applied value
    pub fn meter_gain_ppm(mut self, role: Role, ppm: f64) -> Self
    {
        self.meter_gain_ppm.insert(role, ppm);
        self
    }

    /// Successive readings alternate `+amount` and `-amount` around the true value
    pub fn noise(mut self, amount: f64) -> Self
    {
        self.noise = amount;
        self
    }

    /// Setting `role` to `value` fails with a timeout
    pub fn fail_set(mut self, role: Role, value: f64) -> Self
    {
        self.set_faults.push((role, value));
        self
    }

    /// Every reading from `role` fails with a timeout
    pub fn fail_reads(mut self, role: Role) -> Self
    {
        self.read_faults.insert(role);
        self
    }

    /// Opening the bench fails
    pub fn fail_open(mut self) -> Self
    {
        self.open_fault = true;
        self
    }

    /// Queues the operator's answer to the next manual prompt; unanswered prompts proceed
    pub fn respond(mut self, response: ManualResponse) -> Self
    {
        self.responses.push_back(response);
        self
    }

    /// The operator never answers
    pub fn stall_prompts(mut self) -> Self
    {
        self.stall_prompts = true;
        self
    }

    /// What a meter of the given kind sees, if anything
    fn stimulus(&self, kind: QuantityKind) -> Option<Quantity>
    {
        let (_, applied) = self.applied?;

        match (applied.kind(), kind, self.resistance) {
            (applied_kind, kind, _) if applied_kind == kind => Some(applied),
            (QuantityKind::Ampere, QuantityKind::Volt, Some(resistance)) => {
                Some(Quantity::volts(applied.value() * resistance.value()))
            }
            _ => None,
        }
    }

    fn timeout(role: Role) -> CommunicationError
    {
        CommunicationError::Timeout {
            role: role,
            timeout_ms: 15_000,
        }
    }
}

#[async_trait]
impl InstrumentInterface for SimulatedBench
{
    async fn open(&mut self) -> Result<(), CommunicationError>
    {
        self.journal.record(SimCall::Open);

        if self.open_fault {
            return Err(Self::timeout(Role::Dut));
        }

        Ok(())
    }

    async fn set_value(&mut self, role: Role, value: Quantity) -> Result<Option<Quantity>, CommunicationError>
    {
        self.journal.record(SimCall::Set(role, value));

        let faulted = self.set_faults.iter().any(|(target, fault)| {
            *target == role && (fault - value.value()).abs() <= FAULT_MATCH * fault.abs().max(f64::MIN_POSITIVE)
        });

        if faulted {
            return Err(Self::timeout(role));
        }

        let model = self.sources.get(&role).cloned().unwrap_or_default();
        let setting = closest_setpoint(value.value(), model.step.unwrap_or(0.0));
        let produced = value.with_value(setting * (1.0 + model.gain_ppm * 1e-6));

        debug!("sim: {} produces {:.9}", role, produced);
        self.applied = Some((role, produced));

        if produced.kind() == QuantityKind::Ohm {
            self.resistance = Some(produced);
        }

        Ok(if model.readback { Some(value.with_value(setting)) } else { None })
    }

    async fn read_value(&mut self, role: Role, kind: QuantityKind) -> Result<Quantity, CommunicationError>
    {
        self.journal.record(SimCall::Read(role, kind));

        if self.read_faults.contains(&role) {
            return Err(Self::timeout(role));
        }

        let applied = match self.stimulus(kind) {
            Some(applied) => applied,
            None => {
                return Err(CommunicationError::Rejected {
                    role: role,
                    reason: format!("nothing is applying {}", kind),
                });
            }
        };

        let gain = self.meter_gain_ppm.get(&role).copied().unwrap_or(0.0);
        let sign = if self.readings % 2 == 0 { 1.0 } else { -1.0 };
        self.readings += 1;

        Ok(applied.with_value(applied.value() * (1.0 + gain * 1e-6) + sign * self.noise))
    }

    async fn read_setpoint(&mut self, role: Role, kind: QuantityKind) -> Result<Quantity, CommunicationError>
    {
        self.journal.record(SimCall::ReadSetpoint(role, kind));

        let readback = self.sources.get(&role).map(|model| model.readback).unwrap_or(true);

        match self.applied {
            Some((source, applied)) if readback && source == role && applied.kind() == kind => Ok(applied),
            _ => Err(CommunicationError::Unsupported {
                role: role,
                operation: "setpoint readback",
                kind: kind,
            }),
        }
    }

    async fn prompt_manual_step(&mut self, prompt: &ManualPrompt) -> ManualResponse
    {
        self.journal.record(SimCall::Prompt(prompt.clone()));

        if self.stall_prompts {
            return std::future::pending().await;
        }

        self.responses.pop_front().unwrap_or(ManualResponse::Proceed)
    }

    async fn close(&mut self)
    {
        self.journal.record(SimCall::Close);
        self.applied = None;
        self.resistance = None;
    }
}

#[cfg(test)]
mod tests
{
    use super::{ SimCall, SimulatedBench };
    use crate::{
        instrument::{ InstrumentInterface, Role },
        units::{ Quantity, QuantityKind },
    };

    #[tokio::test]
    async fn quantized_source_with_gain_error()
    {
        let mut bench = SimulatedBench::new()
            .quantize(Role::Dut, 0.001)
            .source_gain_ppm(Role::Dut, 100.0);

        let applied = bench.set_value(Role::Dut, Quantity::volts(7.0003)).await.unwrap().unwrap();
        assert!((applied.value() - 7.0).abs() < 1e-12);

        let readback = bench.read_setpoint(Role::Dut, QuantityKind::Volt).await.unwrap();
        assert!((readback.value() - 7.0007).abs() < 1e-9);

        let reading = bench.read_value(Role::ReferenceMeter, QuantityKind::Volt).await.unwrap();
        assert!((reading.value() - 7.0007).abs() < 1e-9);
    }

    #[tokio::test]
    async fn readings_of_the_wrong_kind_are_rejected()
    {
        let mut bench = SimulatedBench::new();
        assert!(bench.read_value(Role::ReferenceMeter, QuantityKind::Volt).await.is_err());

        bench.set_value(Role::Dut, Quantity::amperes(1e-3)).await.unwrap();
        assert!(bench.read_value(Role::ReferenceMeter, QuantityKind::Volt).await.is_err());
        assert!(bench.read_value(Role::ReferenceMeter, QuantityKind::Ampere).await.is_ok());
    }

    #[tokio::test]
    async fn scripted_faults()
    {
        let mut bench = SimulatedBench::new()
            .fail_set(Role::Dut, 2.0)
            .fail_reads(Role::ReferenceMeter)
            .without_readback(Role::Dut);

        assert!(bench.set_value(Role::Dut, Quantity::volts(2.0)).await.is_err());
        assert_eq!(bench.set_value(Role::Dut, Quantity::volts(20.0)).await.unwrap(), None);
        assert!(bench.read_setpoint(Role::Dut, QuantityKind::Volt).await.is_err());
        assert!(bench.read_value(Role::ReferenceMeter, QuantityKind::Volt).await.is_err());

        let journal = bench.journal();
        assert_eq!(journal.sets(Role::Dut).len(), 2);
        assert_eq!(journal.count(SimCall::is_instrument_call), 4);
    }

    #[tokio::test]
    async fn noise_alternates()
    {
        let mut bench = SimulatedBench::new().noise(1e-6);
        bench.set_value(Role::Dut, Quantity::volts(1.0)).await.unwrap();

        let first = bench.read_value(Role::ReferenceMeter, QuantityKind::Volt).await.unwrap();
        let second = bench.read_value(Role::ReferenceMeter, QuantityKind::Volt).await.unwrap();
        assert!((first.value() - 1.000001).abs() < 1e-12);
        assert!((second.value() - 0.999999).abs() < 1e-12);
    }

    #[tokio::test]
    async fn current_through_a_resistance_reads_as_voltage()
    {
        let mut bench = SimulatedBench::new().source_gain_ppm(Role::ResistanceStandard, 1000.0);

        bench.set_value(Role::ResistanceStandard, Quantity::ohms(1e9)).await.unwrap();
        let actual = bench.read_setpoint(Role::ResistanceStandard, QuantityKind::Ohm).await.unwrap();
        assert!((actual.value() - 1.001e9).abs() < 1.0);

        bench.set_value(Role::Dut, Quantity::amperes(1e-9)).await.unwrap();
        let drop = bench.read_value(Role::ReferenceMeter, QuantityKind::Volt).await.unwrap();
        assert!((drop.value() - 1.001).abs() < 1e-9);

        let current = bench.read_value(Role::Dut, QuantityKind::Ampere).await.unwrap();
        assert_eq!(current.value(), 1e-9);
    }
}
