/// Failure reported by a repository. Surfaced to callers unchanged.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("{entity} {id} does not exist")]
    Missing { entity: &'static str, id: String },
    #[error("rejected by backend: {0}")]
    Rejected(String),
}

/// Input refused before it reaches a repository.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("`{field}` must not be empty")]
    Empty { field: &'static str },
    #[error("`{field}` is out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },
    #[error("`{field}` is longer than {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("reorder must list every existing id exactly once")]
    ReorderMismatch,
}

/// Error returned by mutation commands.
///
/// An absent entity is not an error; lookups return `Option`.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
