//! Lifecycle events emitted while a run progresses
//!
//! Logging and user interfaces follow a run through an [`EventSink`]. Sinks must not block: the
//! engine emits from inside the procedure and a slow consumer would stretch settle times.

use log::{ info, warn };
use serde::Serialize;
use tokio::sync::mpsc;
use crate::{
    instrument::ManualPrompt,
    report::{ RowResult, Verdict },
    units::Quantity,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event
{
    SessionStarted
    {
        tables: usize,
    },
    RowStarted
    {
        table: u8,
        row: usize,
        label: String,
        nominal: Quantity,
    },
    ManualStepRequired(ManualPrompt),
    RowCompleted(RowResult),
    TableCompleted
    {
        table: u8,
        verdict: Verdict,
    },
    SessionFinished
    {
        verdict: Verdict,
    },
}

/// Receives events as they happen
pub trait EventSink: Send + Sync
{
    fn emit(&self, event: &Event);
}

/// Discards every event
pub struct NullSink;

impl EventSink for NullSink
{
    fn emit(&self, _event: &Event)
    {
    }
}

/// Writes every event to the `log` facade
pub struct LogSink;

impl EventSink for LogSink
{
    fn emit(&self, event: &Event)
    {
        match event {
            Event::SessionStarted { tables } => info!("verification started, {} tables", tables),
            Event::RowStarted { table, row, label, nominal } => {
                info!("table {} row {} ({}): nominal {:.6}", table, row + 1, label, nominal)
            }
            Event::ManualStepRequired(prompt) => {
                info!("table {} row {}: manual step: {}", prompt.table, prompt.row + 1, prompt.instruction)
            }
            Event::RowCompleted(result) => {
                let summary = match (&result.point, &result.measured) {
                    (Some(point), Some(measured)) => format!(
                        "achieved {:.6}, limits [{:.6}, {:.6}], measured {:.6}",
                        point.achieved,
                        point.lower,
                        point.upper,
                        measured.mean,
                    ),
                    _ => result.detail.clone().unwrap_or_default(),
                };

                if result.verdict.passed() {
                    info!("table {} row {}: {} ({})", result.table, result.row + 1, result.verdict, summary);
                }
                else {
                    warn!("table {} row {}: {} ({})", result.table, result.row + 1, result.verdict, summary);
                }
            }
            Event::TableCompleted { table, verdict } => info!("table {} finished: {}", table, verdict),
            Event::SessionFinished { verdict } => info!("verification finished: {}", verdict),
        }
    }
}

/// Forwards events to a channel, e.g. for a UI task
///
/// A closed receiver is not an error for the run; events are simply dropped.
impl EventSink for mpsc::UnboundedSender<Event>
{
    fn emit(&self, event: &Event)
    {
        let _ = self.send(event.clone());
    }
}

impl<S> EventSink for Vec<S>
    where S: EventSink
{
    fn emit(&self, event: &Event)
    {
        for sink in self.iter() {
            sink.emit(event);
        }
    }
}

impl EventSink for Box<dyn EventSink>
{
    fn emit(&self, event: &Event)
    {
        (**self).emit(event)
    }
}
