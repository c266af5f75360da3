use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Failed to record reading for vehicle {0}: {1}")]
    PersistenceError(String, String),

    #[error("Failed to dispatch command to vehicle {0}: {1}")]
    DispatchError(String, String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}
