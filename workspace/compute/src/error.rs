use thiserror::Error;

/// Error types for the compute crate
#[derive(Error, Debug)]
pub enum ComputeError {
    /// Error from the database operations
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Input that breaks a business rule
    #[error("{0}")]
    Validation(String),

    /// A referenced row does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// A template placeholder had no value
    #[error("Missing template variable '{0}'")]
    MissingTemplateVariable(String),

    /// Runtime error for unexpected situations
    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Type alias for Result with ComputeError
pub type Result<T> = std::result::Result<T, ComputeError>;
