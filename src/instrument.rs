//! Instrument capability contracts
//!
//! # Purpose
//! The engine never talks to a concrete instrument. It sees one [`InstrumentInterface`] for the
//! whole bench which routes every request by [`Role`]: the device under test, the reference meter,
//! a reference source, or a passive resistance standard. Behind the interface each physical
//! instrument implements [`Instrument`], and manual connection steps are handled by an
//! [`Operator`].
//!
//! Command encoding and bus transport belong to the instrument implementations. The engine treats
//! every call as a single blocking operation that either returns a value or fails once with a
//! [`CommunicationError`]. Retries, if any, are the implementation's business.
//!
//! # Cancel Safety
//! The engine races operator prompts against the abort signal inside a `tokio::select!`, so
//! [`InstrumentInterface::prompt_manual_step`] **must be cancel safe**: dropping the future before
//! it completes must leave nothing half done. Bus operations are never raced and need not be.

use std::fmt;
use async_trait::async_trait;
use serde::{ Deserialize, Serialize };
use crate::{
    error::CommunicationError,
    units::{ Quantity, QuantityKind },
};

/// The part an instrument plays on the verification bench
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role
{
    /// The source-measure unit being verified
    Dut,
    /// Reference DMM, e.g. an 8.5 digit 3458A
    ReferenceMeter,
    /// Reference calibrator, e.g. a 5720A
    ReferenceSource,
    /// Characterized resistors connected by hand, e.g. a 5156A
    ResistanceStandard,
}

impl fmt::Display for Role
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(match self {
            Self::Dut => "DUT",
            Self::ReferenceMeter => "reference meter",
            Self::ReferenceSource => "reference source",
            Self::ResistanceStandard => "resistance standard",
        })
    }
}

/// A request for a human to change the bench wiring before a row can run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualPrompt
{
    pub table: u8,
    pub row: usize,
    /// What the operator has to do, straight from the procedure
    pub instruction: String,
}

/// The operator's answer to a [`ManualPrompt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManualResponse
{
    /// The connection was made, carry on with the row
    Proceed,
    /// Skip this row without touching the instruments
    Decline,
    /// Stop the whole run
    Abort,
}

/// Everything the engine needs from the bench for the duration of a run
#[async_trait]
pub trait InstrumentInterface: Send
{
    /// Prepare every instrument for the run
    ///
    /// Called exactly once before the first table. A failure here prevents the run.
    async fn open(&mut self) -> Result<(), CommunicationError>
    {
        Ok(())
    }

    /// Apply a value with the instrument in the given role
    ///
    /// Returns what the instrument reports applying, or `None` when it took the value without
    /// saying what it made of it.
    async fn set_value(&mut self, role: Role, value: Quantity) -> Result<Option<Quantity>, CommunicationError>;

    /// Take one reading of the given kind with the instrument in the given role
    async fn read_value(&mut self, role: Role, kind: QuantityKind) -> Result<Quantity, CommunicationError>;

    /// Ask the instrument in the given role what it is actually producing
    async fn read_setpoint(&mut self, role: Role, kind: QuantityKind) -> Result<Quantity, CommunicationError>;

    /// Show a manual step to the operator and wait for their answer
    ///
    /// Must be cancel safe, see the module documentation.
    async fn prompt_manual_step(&mut self, prompt: &ManualPrompt) -> ManualResponse;

    /// Put the bench into a safe state and release it
    ///
    /// Called exactly once on every exit path of a run. Best effort: failures are for the
    /// implementation to log, they cannot stop the teardown.
    async fn close(&mut self)
    {
    }
}

/// One physical instrument
///
/// Implementations own their transport and command set. Errors should carry the role the
/// instrument was constructed for.
#[async_trait]
pub trait Instrument: Send
{
    /// Identification string, e.g. the reply to `*IDN?`
    async fn identify(&mut self) -> Result<String, CommunicationError>;

    /// Return to a known default state
    async fn reset(&mut self) -> Result<(), CommunicationError>
    {
        Ok(())
    }

    /// Returns what was applied when the instrument can tell, see [`InstrumentInterface::set_value`]
    async fn set_value(&mut self, value: Quantity) -> Result<Option<Quantity>, CommunicationError>;

    async fn read_value(&mut self, kind: QuantityKind) -> Result<Quantity, CommunicationError>;

    async fn read_setpoint(&mut self, kind: QuantityKind) -> Result<Quantity, CommunicationError>;

    /// Turn outputs off or go to standby
    async fn safe_state(&mut self) -> Result<(), CommunicationError>
    {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), CommunicationError>
    {
        Ok(())
    }
}

/// The human at the bench
#[async_trait]
pub trait Operator: Send
{
    /// Must be cancel safe, see the module documentation.
    async fn acknowledge(&mut self, prompt: &ManualPrompt) -> ManualResponse;
}
