use thiserror::Error;

/// Every failure the class runtime can report.
///
/// Structural errors (`InvalidKey`, `InvalidTarget`, `Unsupported`, `InvalidPath`) are returned
/// synchronously from the call that caused them. Errors raised while resolving deferred classes
/// or running constitutors surface from whatever drove the scheduler.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("illegal target: {0}")]
    InvalidTarget(String),

    #[error("{0} is not yet implemented")]
    Unsupported(String),

    #[error("could not find class \"{name}\" in namespace \"{namespace}\"")]
    UnresolvedClass { name: String, namespace: String },

    #[error("invalid class path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("type error: {0}")]
    TypeError(String),

    /// Raised by user supplied code (methods, getters, constitutors).
    #[error("{0}")]
    Raised(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("scheduler budget of {0} jobs exhausted")]
    BudgetExhausted(usize),
}

impl ClassError {
    pub fn raised(message: impl Into<String>) -> Self {
        ClassError::Raised(message.into())
    }
}
