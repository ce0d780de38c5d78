// Errors raised while driving the console and cycling servers

use crate::models::PowerState;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("login did not reach the console within {timeout:?}")]
    AuthenticationTimeout { timeout: Duration },

    #[error("no visible control labelled '{label}'")]
    ActionNotFound { label: String },

    #[error("timed out after {timeout:?} waiting for state {target}")]
    StateTimeout {
        target: PowerState,
        timeout: Duration,
    },

    #[error("expected state {expected}, observed {observed}")]
    UnexpectedStatus {
        expected: String,
        observed: PowerState,
    },

    #[error("row for server '{name}' (discovered at #{index}) is gone")]
    RowNotFound { name: String, index: usize },

    #[error("{count} rows are named '{name}' and none sits at the discovered position")]
    AmbiguousRow { name: String, count: usize },

    #[error("console driver error: {0}")]
    Driver(String),
}
