use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid git url: {0}")]
    InvalidGitUrl(String),

    #[error("Invalid repository uri: {0}")]
    InvalidUri(String),

    #[error("Unknown job type: {0}")]
    UnknownJobType(String),

    #[error("{0}")]
    Other(String),
}
