//! Error taxonomy for the verification engine
//!
//! Only two things can go wrong in a way the engine must react to: the bus misbehaves while
//! talking to an instrument, or the run was set up with bad configuration. Operator aborts and
//! estimated setpoints are outcomes recorded in the report, not errors.

use thiserror::Error;
use crate::{
    instrument::Role,
    units::QuantityKind,
};

/// A fault while talking to an instrument
///
/// These are recovered at row granularity: the row is marked `ERROR` and the engine moves on.
#[derive(Debug, Error)]
pub enum CommunicationError
{
    /// The bus transport failed underneath the instrument driver
    #[error("bus I/O failure on {role}: {source}")]
    Io
    {
        role: Role,
        #[source]
        source: std::io::Error,
    },
    /// The instrument did not answer in time
    #[error("{role} did not respond within {timeout_ms} ms")]
    Timeout
    {
        role: Role,
        timeout_ms: u32,
    },
    /// The instrument answered with something that could not be interpreted
    #[error("{role} returned an unreadable response: {response:?}")]
    InvalidResponse
    {
        role: Role,
        response: String,
    },
    /// The instrument refused the request, e.g. a value outside its ranges
    #[error("{role} rejected the request: {reason}")]
    Rejected
    {
        role: Role,
        reason: String,
    },
    /// The instrument cannot do what was asked of it at all
    #[error("{role} does not support {operation} of {kind}")]
    Unsupported
    {
        role: Role,
        operation: &'static str,
        kind: QuantityKind,
    },
    /// No instrument is attached for the role
    #[error("no instrument is attached for {0}")]
    Unattached(Role),
}

/// Malformed or missing configuration, detected once at session setup
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError
{
    #[error("no connection parameters for {0}")]
    MissingInstrument(Role),
    #[error("connection parameters for {role} are invalid: {reason}")]
    InvalidConnection
    {
        role: Role,
        reason: String,
    },
    #[error("procedure setting `{field}` is invalid: {reason}")]
    InvalidProcedure
    {
        field: &'static str,
        reason: String,
    },
    #[error("table number {0} is outside 1..=16")]
    TableNumber(u8),
    #[error("table {0} appears more than once in the run")]
    DuplicateTable(u8),
    #[error("table {table}, row {row}: {reason}")]
    InvalidRow
    {
        table: u8,
        row: usize,
        reason: String,
    },
}

/// A session-level failure that prevented a report from being produced
#[derive(Debug, Error)]
pub enum VerifyError
{
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("could not acquire instruments: {0}")]
    Acquire(#[source] CommunicationError),
}
