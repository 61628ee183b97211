//! Convoy compute layer
//!
//! Provider abstraction and the EC2 implementation used by the convoy fleet
//! manager: instance launch/lifecycle calls, state polling, and security
//! group management.

pub mod ec2;
pub mod error;
pub mod instance;
pub mod provider;

// Re-exports
pub use ec2::Ec2Provider;
pub use error::{CloudError, Result};
pub use instance::{Instance, InstanceState, LaunchSpec, SecurityGroup};
pub use provider::ComputeProvider;
