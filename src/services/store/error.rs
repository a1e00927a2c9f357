use sea_orm::DbErr;

/// Failure surfaced by [`InviteStore`](super::InviteStore) once its retry policy gives up.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Transient faults persisted through every attempt.
    #[error("{operation} failed after {attempts} attempts: {source}")]
    Unavailable {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: DbErr,
    },
    /// The database refused the operation; retrying would not help.
    #[error("{operation} was rejected by the database: {source}")]
    Rejected {
        operation: &'static str,
        #[source]
        source: DbErr,
    },
}

impl StoreError {
    pub fn operation(&self) -> &'static str {
        match self {
            StoreError::Unavailable { operation, .. } | StoreError::Rejected { operation, .. } => {
                operation
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable { .. })
    }
}
