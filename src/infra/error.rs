//! Failures while wiring the process: settings, tracing and the pool.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("database {stage} failed")]
    Database {
        stage: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl InfraError {
    pub fn database(stage: &'static str, source: sqlx::Error) -> Self {
        Self::Database { stage, source }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
