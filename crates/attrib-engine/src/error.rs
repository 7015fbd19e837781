use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// `days_back` must be a non-negative integer; rejected explicitly
    /// rather than silently coerced to the default.
    #[error("days_back must be a non-negative integer, got {0}")]
    InvalidDaysBack(i64),
    #[error(transparent)]
    Db(#[from] attrib_db::DbError),
}
