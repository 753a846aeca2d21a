//! **A**synchronous-Rust **R**emote **C**alibration **S**equencer for source-measure units
//!
//! Runs the performance verification tables of a source-measure unit against a bench of reference
//! instruments and produces a PASS/FAIL report per point, per table and for the whole run.
//!
//! The pieces, from the bottom up:
//!
//! - [`tolerance`] works out the setpoint a quantized source can actually reach and the acceptance
//!   window around the value actually achieved.
//! - [`executor`] runs one row: prompt, set, read back, settle, sample, judge.
//! - [`runner`] runs the rows of one table in order under a row-error policy.
//! - [`session`] validates everything, owns the bench for the run and always shuts it down.
//!
//! Instruments sit behind [`InstrumentInterface`]. [`Bench`] routes it to one [`Instrument`] per
//! [`Role`]; [`SimulatedBench`] stands in for the whole rack in dry runs.
//!
//! ```no_run
//! use arcs_verify::{
//!     section18, ConnectionParams, InstrumentConfig, ProcedureConfig, Role, SimulatedBench,
//!     VerificationSession,
//! };
//!
//! # async fn dry_run() -> Result<(), arcs_verify::VerifyError> {
//! let instruments = InstrumentConfig::new()
//!     .instrument(Role::Dut, ConnectionParams::new("GPIB0::24::INSTR"))
//!     .instrument(Role::ReferenceMeter, ConnectionParams::new("GPIB0::22::INSTR"));
//!
//! let session = VerificationSession::new(instruments, ProcedureConfig::default());
//! let report = session.run(&[section18::mainframe_output_voltage()], SimulatedBench::new()).await?;
//! println!("{}", report.verdict());
//! # Ok(())
//! # }
//! ```

pub mod units;
pub mod error;
pub mod instrument;
pub mod tolerance;
pub mod procedure;
pub mod config;
pub mod report;
pub mod events;
pub mod abort;
pub mod executor;
pub mod runner;
pub mod session;
pub mod bench;
pub mod standards;
pub mod sim;
pub mod section18;

pub use abort::AbortSignal;
pub use bench::Bench;
pub use config::{ ConnectionParams, InstrumentConfig, ParamValue, ProcedureConfig, RowErrorPolicy, TableErrorPolicy };
pub use error::{ CommunicationError, ConfigurationError, VerifyError };
pub use events::{ Event, EventSink, LogSink, NullSink };
pub use instrument::{ Instrument, InstrumentInterface, ManualPrompt, ManualResponse, Operator, Role };
pub use procedure::{ RowSpec, TableSpec };
pub use report::{ Completion, Measurement, RowResult, SessionReport, StandardResistor, TableResult, Verdict };
pub use session::VerificationSession;
pub use sim::SimulatedBench;
pub use standards::CharacterizedStandard;
pub use tolerance::{ closest_setpoint, resolve, ResolvedPoint, ToleranceSpec };
pub use units::{ Quantity, QuantityKind };
