use thiserror::Error;

/// Failure of a user-supplied `setup` or `teardown` hook.
#[derive(Debug, Error)]
#[error("{hook} hook failed: {source}")]
pub struct HookError {
    pub hook: &'static str,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl HookError {
    pub(crate) fn new(
        hook: &'static str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            hook,
            source: source.into(),
        }
    }
}

/// Errors which end a run while it is generating load.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Virtual user {0} exited without being stopped")]
    WorkerExited(usize),
}

/// Failure of a single scenario iteration.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Scenario panicked: {0}")]
    Panicked(String),

    #[error("Scenario abandoned after the grace period")]
    Abandoned,
}

/// Network level failure reported by the HTTP capability.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Connection error: {0}")]
    Connection(String),
}
