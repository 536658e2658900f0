use thiserror::Error;

/// Failures on the ingest and forward paths.
///
/// None of these terminate the owning task; they are logged at the operation
/// boundary and the task moves on to its next message or tick.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to decode telemetry payload: {0}")]
    Decode(String),

    #[error("invalid telemetry payload: {0}")]
    Validation(&'static str),

    #[error("failed to publish control command: {0}")]
    Actuation(String),

    #[error("{context}")]
    Persistence {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to deliver batch: {0}")]
    Delivery(String),
}

impl RelayError {
    pub(crate) fn persistence(context: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| RelayError::Persistence { context, source }
    }
}

pub type Result<T, E = RelayError> = std::result::Result<T, E>;
