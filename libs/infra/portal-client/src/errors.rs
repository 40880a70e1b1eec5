use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("network fault talking to portal: {0}")]
    Network(#[from] reqwest::Error),

    #[error("login rejected: {0}")]
    LoginRejected(String),

    #[error("session expired mid-sweep")]
    SessionExpired,

    #[error("portal returned non-200 status {0}")]
    UnexpectedStatus(u16),
}
