use crate::models::{CategoryId, CourseId};

pub type Result<T> = std::result::Result<T, AuditError>;

/// Errors raised while auditing courses.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    /// The course vanished between listing and collection.
    #[error("course {course_id} is no longer available")]
    DataUnavailable { course_id: CourseId },

    #[error("category {0} not found")]
    CategoryNotFound(CategoryId),

    /// Override token the review form never offers.
    #[error("unrecognised override choice {0:?}")]
    MalformedOverrideInput(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
