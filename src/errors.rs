use sea_orm::error::DbErr;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// An area, length or quantity conservation rule would be violated.
    #[error("{0}")]
    CapacityError(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(Uuid),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    pub fn item_not_found(id: Uuid) -> Self {
        ServiceError::NotFound(format!("Item with ID {} not found", id))
    }

    pub fn capacity(message: impl Into<String>) -> Self {
        ServiceError::CapacityError(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::ValidationError(message.into())
    }

    /// Stable machine-readable label, used as a metrics dimension and in CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ValidationError(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::CapacityError(_) => "capacity",
            Self::ConcurrentModification(_) => "conflict",
            Self::DatabaseError(_) => "storage",
            Self::EventError(_) | Self::InternalError(_) => "internal",
        }
    }

    /// Message suitable for showing to the person at the counter.
    /// Storage internals are not leaked.
    pub fn user_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Storage error".to_string(),
            Self::ConcurrentModification(id) => {
                format!("Item {} was changed by another operation, try again", id)
            }
            _ => self.to_string(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrentModification(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(ServiceError::validation("x").kind(), "validation");
        assert_eq!(ServiceError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(ServiceError::capacity("x").kind(), "capacity");
        assert_eq!(
            ServiceError::ConcurrentModification(Uuid::nil()).kind(),
            "conflict"
        );
        assert_eq!(ServiceError::db_error(DbErr::Custom("boom".into())).kind(), "storage");
        assert_eq!(ServiceError::InternalError("x".into()).kind(), "internal");
        assert_eq!(ServiceError::EventError("x".into()).kind(), "internal");
    }

    #[test]
    fn capacity_message_is_surfaced_verbatim() {
        let err = ServiceError::capacity("Total scrap area exceeds available parent item area");
        assert_eq!(
            err.user_message(),
            "Total scrap area exceeds available parent item area"
        );
    }

    #[test]
    fn storage_details_are_hidden_from_users() {
        let err = ServiceError::db_error("disk I/O error at page 42".to_string());
        assert_eq!(err.user_message(), "Storage error");
        assert!(err.to_string().contains("page 42"));
    }

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(ServiceError::ConcurrentModification(Uuid::new_v4()).is_retryable());
        assert!(!ServiceError::capacity("full").is_retryable());
    }
}
