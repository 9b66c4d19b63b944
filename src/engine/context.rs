//! Request context
//!
//! Carried through request handling for tracing and duration tracking.

use std::time::Instant;

use uuid::Uuid;

/// Context for one request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request id for tracing
    pub request_id: Uuid,
    /// Operation name, set by the dispatcher
    pub operation: String,
    started_at: Instant,
}

impl RequestContext {
    /// Fresh context for an operation.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            operation: operation.into(),
            started_at: Instant::now(),
        }
    }

    /// Elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> u128 {
        self.started_at.elapsed().as_millis()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_tracks_operation() {
        let ctx = RequestContext::new("task.create");
        assert_eq!(ctx.operation, "task.create");
    }
}
