// Per-run outcome report

use crate::error::CycleError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EnoughDaysLeft { remain_days: u32, threshold: u32 },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::EnoughDaysLeft {
                remain_days,
                threshold,
            } => write!(f, "{remain_days} days left (threshold {threshold})"),
        }
    }
}

#[derive(Debug)]
pub enum ServerOutcome {
    Skipped(SkipReason),
    /// Cycled successfully; `remain_days` is the countdown re-read afterwards.
    Succeeded { remain_days: u32 },
    Failed(CycleError),
}

#[derive(Debug)]
pub struct ServerReport {
    pub index: usize,
    pub name: String,
    pub outcome: ServerOutcome,
}

/// Outcomes of one batch, in discovery order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub servers: Vec<ServerReport>,
}

impl BatchReport {
    pub fn push(&mut self, index: usize, name: impl Into<String>, outcome: ServerOutcome) {
        self.servers.push(ServerReport {
            index,
            name: name.into(),
            outcome,
        });
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, ServerOutcome::Succeeded { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, ServerOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, ServerOutcome::Failed(_)))
    }

    /// True when no server failed.
    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }

    /// Report entry for the server discovered at `index`.
    pub fn get(&self, index: usize) -> Option<&ServerReport> {
        self.servers.iter().find(|s| s.index == index)
    }

    fn count(&self, pred: impl Fn(&ServerOutcome) -> bool) -> usize {
        self.servers.iter().filter(|s| pred(&s.outcome)).count()
    }
}
