//! Instance and launch-request value types

use aws_sdk_ec2::types::InstanceStateName;
use serde::{Deserialize, Serialize};

/// Lifecycle state of a tracked instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceState {
    Pending,
    Running,
    ShuttingDown,
    Stopping,
    Stopped,
    Terminated,
    /// A state the SDK reports that convoy does not model
    Unknown,
}

impl InstanceState {
    /// Display name used in wait-timeout diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::ShuttingDown => "shutting-down",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
            InstanceState::Terminated => "terminated",
            InstanceState::Unknown => "unknown",
        }
    }
}

impl From<&InstanceStateName> for InstanceState {
    fn from(name: &InstanceStateName) -> Self {
        match name {
            InstanceStateName::Pending => InstanceState::Pending,
            InstanceStateName::Running => InstanceState::Running,
            InstanceStateName::ShuttingDown => InstanceState::ShuttingDown,
            InstanceStateName::Stopping => InstanceState::Stopping,
            InstanceStateName::Stopped => InstanceState::Stopped,
            InstanceStateName::Terminated => InstanceState::Terminated,
            _ => InstanceState::Unknown,
        }
    }
}

/// A tracked remote compute instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    /// Provider-assigned opaque identifier
    pub id: String,

    /// Public address, assigned once the instance is running
    pub public_ip: Option<String>,

    pub state: InstanceState,
}

impl Instance {
    pub fn is_running(&self) -> bool {
        self.state == InstanceState::Running
    }
}

/// Request for a batch of identical instances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchSpec {
    pub image_id: String,
    pub instance_type: String,
    pub count: i32,
    pub key_name: String,
    pub security_group_ids: Vec<String>,
}

/// A security group resolved by [`ComputeProvider::ensure_security_group`]
///
/// `created` is true only when this call actually created the group, which
/// is what decides deletion responsibility at teardown.
///
/// [`ComputeProvider::ensure_security_group`]: crate::ComputeProvider::ensure_security_group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub id: String,
    pub created: bool,
}
