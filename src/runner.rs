//! Sequencing of the rows of one table
//!
//! Rows run strictly in table order, one at a time. Several of the manual's procedures rely on the
//! instrument state left by the previous row, so nothing here reorders or overlaps rows.

use log::{ info, warn };
use crate::{
    abort::AbortSignal,
    config::RowErrorPolicy,
    events::{ Event, EventSink },
    executor::StepExecutor,
    instrument::InstrumentInterface,
    procedure::TableSpec,
    report::{ RowResult, TableResult, Verdict },
};

pub struct TableRunner<'a>
{
    executor: StepExecutor<'a>,
    policy: RowErrorPolicy,
    events: &'a dyn EventSink,
    abort: &'a AbortSignal,
}

impl <'a> TableRunner<'a>
{
    pub fn new(
        executor: StepExecutor<'a>,
        policy: RowErrorPolicy,
        events: &'a dyn EventSink,
        abort: &'a AbortSignal,
    )
        -> Self
    {
        Self {
            executor: executor,
            policy: policy,
            events: events,
            abort: abort,
        }
    }

    /// Runs every row of `table` and collects the results in row order
    ///
    /// With [`RowErrorPolicy::Continue`] an `ERROR` row is recorded and the next row runs. With
    /// [`RowErrorPolicy::HaltTable`] every row after it is recorded as `ERROR` without being run.
    /// An abort finalizes the table with the rows run so far, the interrupted row included as
    /// `SKIPPED`.
    pub async fn run<I>(&self, table: &TableSpec, bench: &mut I) -> TableResult
        where I: InstrumentInterface + ?Sized
    {
        let mut result = TableResult::new(table.number(), table.title());
        let mut rows = table.rows().iter().enumerate();

        info!("table {}: {} ({} rows)", table.number(), table.title(), table.rows().len());

        while let Some((index, row)) = rows.next() {
            let outcome = self.executor.execute(table.number(), index, row, bench).await;
            let errored = outcome.verdict == Verdict::Error;
            result.push(outcome);

            if self.abort.is_raised() {
                warn!("table {}: aborted after row {}", table.number(), index + 1);
                result.aborted = true;
                break;
            }

            if errored && self.policy == RowErrorPolicy::HaltTable {
                warn!("table {}: halting after the error on row {}", table.number(), index + 1);
                result.halted = true;

                for (rest, skipped) in rows.by_ref() {
                    let halted = RowResult::error(
                        table.number(),
                        rest,
                        skipped.label(),
                        None,
                        format!("not run: table halted after the error on row {}", index + 1),
                    );
                    self.events.emit(&Event::RowCompleted(halted.clone()));
                    result.push(halted);
                }

                break;
            }
        }

        self.events.emit(&Event::TableCompleted {
            table: table.number(),
            verdict: result.verdict(),
        });

        result
    }
}
