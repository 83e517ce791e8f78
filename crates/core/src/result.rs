//! Result type definition and logging combinators.
//!
//! Reconciliation never aborts its host on a recoverable failure; the helper
//! here turns an error into a log line instead.

use std::fmt::Display;

use crate::error::Error;

/// The standard Result type for Vigil core operations.
///
/// # Examples
///
/// ```ignore
/// fn interval(config: &SupervisorConfig) -> Result<Duration> {
///     config.validate()?;
///     Ok(config.supervisor.reconcile_interval())
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait that logs an error before discarding it.
pub trait ResultExt<T> {
    /// Convert a Result to an Option, logging the error under `context` if present.
    fn into_option_logged(self, context: &str) -> Option<T>;
}

impl<T, E: Display> ResultExt<T> for std::result::Result<T, E> {
    fn into_option_logged(self, context: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(error = %e, "{context}");
                None
            }
        }
    }
}
