use std::error::Error as StdError;

use thiserror::Error;

use crate::application::articles::ArticleServiceError;
use crate::domain::error::DomainError;
use crate::infra::error::InfraError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Articles(#[from] ArticleServiceError),
    #[error("resource not found")]
    NotFound,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Process exit status for the operator CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::NotFound
            | AppError::Domain(DomainError::NotFound { .. })
            | AppError::Articles(ArticleServiceError::Domain(DomainError::NotFound { .. })) => 2,
            AppError::Validation(_)
            | AppError::Domain(_)
            | AppError::Articles(ArticleServiceError::Domain(_)) => 3,
            AppError::Infra(InfraError::Database { .. })
            | AppError::Articles(ArticleServiceError::Repo(_)) => 4,
            AppError::Infra(_) | AppError::Unexpected(_) => 1,
        }
    }

    /// The error and every source below it, outermost first.
    pub fn chain(&self) -> Vec<String> {
        let mut messages = vec![self.to_string()];
        let mut current = self.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        messages
    }
}
