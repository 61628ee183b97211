//! Compute provider error types

use thiserror::Error;

/// Compute provider errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("EC2 API error: {0}")]
    Api(String),

    #[error("required environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("security group not found: {0}")]
    GroupNotFound(String),

    #[error("instance not found: {0}")]
    InstanceNotFound(String),

    #[error("instance {0} has no public address")]
    NoPublicAddress(String),

    #[error("timed out waiting for instance {id} to reach {state}")]
    WaitTimeout { id: String, state: &'static str },
}

pub type Result<T> = std::result::Result<T, CloudError>;
