use thiserror::Error;

#[derive(Error, Debug)]
pub enum AcidError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned status {status}: {detail}")]
    Api { status: u16, detail: String },

    #[error("Capability unavailable: {0}")]
    Capability(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Trust token storage error: {0}")]
    Storage(String),

    #[error("Invalid orchestrator state: {0}")]
    InvalidState(String),

    #[error("Method cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, AcidError>;
