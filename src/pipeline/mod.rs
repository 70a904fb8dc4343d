//! Pipeline entry points for notifier operations.
//!
//! - `ChangeDetector`: classify extracted records against the snapshot
//! - `PollCycle` / `Poller`: run one cycle end to end
//! - `run_scheduled`: repeat cycles on a fixed interval

pub mod cycle;
pub mod diff;
pub mod schedule;

#[cfg(test)]
pub(crate) mod testing;

pub use cycle::{CycleReport, PollCycle, Poller};
pub use diff::{ChangeDetector, DiffResult, calculate_diff};
pub use schedule::{ScheduleStats, run_scheduled};
