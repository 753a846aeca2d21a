//! A complete verification run
//!
//! The session owns the bench for the run. It is moved in, opened once, and closed once on every
//! way out: after the last table, after a policy stop, after an operator abort, and after a failed
//! open. Configuration is checked before the bench is touched at all.

use std::collections::BTreeSet;
use log::{ error, info, warn };
use crate::{
    abort::AbortSignal,
    config::{ InstrumentConfig, ProcedureConfig, TableErrorPolicy },
    error::{ ConfigurationError, VerifyError },
    events::{ Event, EventSink, LogSink },
    executor::StepExecutor,
    instrument::InstrumentInterface,
    procedure::TableSpec,
    report::{ Completion, SessionReport, Verdict },
    runner::TableRunner,
};

pub struct VerificationSession
{
    instruments: InstrumentConfig,
    procedure: ProcedureConfig,
    events: Box<dyn EventSink>,
    abort: AbortSignal,
}

impl VerificationSession
{
    /// A session that reports progress through the `log` facade
    pub fn new(instruments: InstrumentConfig, procedure: ProcedureConfig) -> Self
    {
        Self {
            instruments: instruments,
            procedure: procedure,
            events: Box::new(LogSink),
            abort: AbortSignal::new(),
        }
    }

    /// Replaces the event sink
    pub fn events<E>(mut self, sink: E) -> Self
        where E: EventSink + 'static
    {
        self.events = Box::new(sink);
        self
    }

    /// Uses an abort signal shared with e.g. a UI or a Ctrl+C handler
    pub fn abort_with(mut self, signal: AbortSignal) -> Self
    {
        self.abort = signal;
        self
    }

    /// A handle that aborts this session when raised
    pub fn abort_signal(&self) -> AbortSignal
    {
        self.abort.clone()
    }

    /// Checks the configuration and tables without touching any instrument
    pub fn validate(&self, tables: &[TableSpec]) -> Result<(), ConfigurationError>
    {
        self.instruments.validate()?;
        self.procedure.validate()?;

        let mut seen = BTreeSet::new();

        for table in tables {
            table.validate()?;

            if !seen.insert(table.number()) {
                return Err(ConfigurationError::DuplicateTable(table.number()));
            }

            for role in table.roles() {
                self.instruments.require(role)?;
            }
        }

        Ok(())
    }

    /// Runs `tables` in the given order against `bench`
    ///
    /// Returns `Err` only when the run could not start: invalid configuration (nothing touched) or
    /// a bench that failed to open (closed again before returning). Everything that happens once
    /// the tables are running, an operator abort included, ends in a finalized report.
    ///
    /// # Cancel Safety
    /// This function is **not** cancel safe. Dropping the future, e.g. when it loses a
    /// `tokio::select!` or runs out a `tokio::time::timeout`, drops the bench without ever calling
    /// [`InstrumentInterface::close`], so outputs may be left on. To stop a run early raise the
    /// [`AbortSignal`] from [`VerificationSession::abort_signal`] and await the report instead.
    pub async fn run<I>(&self, tables: &[TableSpec], mut bench: I) -> Result<SessionReport, VerifyError>
        where I: InstrumentInterface
    {
        self.validate(tables)?;

        if let Err(err) = bench.open().await {
            error!("could not open the bench: {}", err);
            bench.close().await;
            return Err(VerifyError::Acquire(err));
        }

        let report = self.run_tables(tables, &mut bench).await;
        bench.close().await;

        self.events.emit(&Event::SessionFinished { verdict: report.verdict() });
        info!("verification {} ({:?})", report.verdict(), report.completion());

        Ok(report)
    }

    async fn run_tables<I>(&self, tables: &[TableSpec], bench: &mut I) -> SessionReport
        where I: InstrumentInterface
    {
        let mut report = SessionReport::begin(self.instruments.clone(), self.procedure.clone());
        self.events.emit(&Event::SessionStarted { tables: tables.len() });

        let executor = StepExecutor::new(&self.procedure, &*self.events, &self.abort);
        let runner = TableRunner::new(executor, self.procedure.row_errors, &*self.events, &self.abort);
        let mut completion = Completion::Completed;

        for table in tables {
            if self.abort.is_raised() {
                completion = Completion::Aborted;
                break;
            }

            let result = runner.run(table, bench).await;
            let aborted = result.aborted;
            let verdict = result.verdict();
            report.push(result);

            if aborted {
                completion = Completion::Aborted;
                break;
            }

            if verdict == Verdict::Error && self.procedure.table_errors == TableErrorPolicy::AbortSession {
                warn!("table {} ended in error; stopping the run", table.number());
                completion = Completion::Halted { table: table.number() };
                break;
            }
        }

        report.finish(completion);
        report
    }
}
