// Domain models: server snapshots, power states and the batch report

mod report;
mod server;

pub use report::{BatchReport, ServerOutcome, ServerReport, SkipReason};
pub use server::{PowerState, ServerSnapshot, StatusLabels};
