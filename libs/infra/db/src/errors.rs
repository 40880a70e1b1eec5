use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("database configuration invalid: {0}")]
    Configuration(String),

    #[error("query rejected by the engine: {0}")]
    Query(#[from] libsql::Error),

    #[error("row mapping failed: {0}")]
    Mapping(String),

    #[error("credential not found for service {0}")]
    CredentialNotFound(String),

    #[error("conflicting entry for ip {0}")]
    Conflict(String),

    #[error("transaction failed: {0}")]
    Transaction(String),
}
