//! Ephemeral EC2 fleets driven over SSH.
//!
//! `convoy` launches a pool of instances, opens one shell session per
//! instance, runs commands and moves files across the pool, and tears
//! everything down at the end. [`run_scoped`] guarantees the teardown even
//! on errors or Ctrl-C; see its docs for a complete example.

pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod scope;
pub mod target;

#[cfg(test)]
mod test_support;

pub use config::FleetConfig;
pub use error::{FleetError, Result};
pub use logging::init_tracing;
pub use manager::{CommandOutcome, DEFAULT_CONNECT_ATTEMPTS, FleetManager};
pub use scope::{run_scoped, run_scoped_with};
pub use target::Target;

pub use convoy_cloud::{Instance, InstanceState};
pub use convoy_ssh::{ConnectFailure, ExecOutput};
