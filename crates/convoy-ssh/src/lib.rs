//! Convoy SSH transport
//!
//! Key-authenticated remote shell sessions for the fleet manager: connect
//! with tagged failure classification, run commands with captured exit
//! status, and move files over SFTP.

pub mod error;
pub mod key;
pub mod session;

// Re-exports
pub use error::{ConnectFailure, Result, SshError};
pub use key::{KeyMaterial, PRIVATE_KEY_ENV};
pub use session::{Connector, ExecOutput, RemoteShell, SshConnector, SshSession};
