use thiserror::Error;

use crate::domain::search::ModelError;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(sqlx::Error),
    #[error("Transient database fault: {0}")]
    Transient(sqlx::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),
    #[error("Embedding generation failed: {0}")]
    Embedding(#[from] ModelError),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                RepositoryError::Transient(e)
            }
            _ => RepositoryError::Database(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_faults_classify_as_transient() {
        let error: RepositoryError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(error, RepositoryError::Transient(_)));

        let error: RepositoryError = sqlx::Error::RowNotFound.into();
        assert!(matches!(error, RepositoryError::Database(_)));
    }
}
