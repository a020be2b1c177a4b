//! Evaluation context
//!
//! Every function receives a context alongside its arguments. The library
//! itself is pure, so the context carries only what a pure function may
//! consult: a clock override so `TODAY`/`NOW` are deterministic under test.

use chrono::{DateTime, Utc};

/// Context for formula evaluation
#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    /// Fixed timestamp for TODAY/NOW; `None` means read the system clock
    pub now: Option<DateTime<Utc>>,
}

impl EvaluationContext {
    /// Create a context that reads the system clock
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context with a fixed timestamp (for deterministic tests)
    pub fn with_now(now: DateTime<Utc>) -> Self {
        Self { now: Some(now) }
    }

    /// The current UTC time as seen by volatile date functions
    pub fn current_time(&self) -> DateTime<Utc> {
        self.now.unwrap_or_else(Utc::now)
    }
}
