//! Fleet manager error types

use thiserror::Error;

/// Fleet manager errors
#[derive(Error, Debug)]
pub enum FleetError {
    #[error("cloud error: {0}")]
    Cloud(#[from] convoy_cloud::CloudError),

    #[error("SSH error: {0}")]
    Ssh(#[from] convoy_ssh::SshError),

    #[error("instance {0} is not tracked by this fleet manager")]
    UnknownInstance(String),

    #[error("instance {0} has no open session")]
    NoSession(String),

    #[error("target selects no instances")]
    EmptyTarget,

    #[error("interrupted")]
    Interrupted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FleetError>;
