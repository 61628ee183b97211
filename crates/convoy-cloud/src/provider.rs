//! Compute provider trait definition

use crate::error::Result;
use crate::instance::{Instance, InstanceState, LaunchSpec, SecurityGroup};
use async_trait::async_trait;

/// Compute provider abstraction
///
/// The fleet manager drives instances through this trait rather than the
/// EC2 client directly, so lifecycle semantics can be tested against a mock
/// provider. [`Ec2Provider`] is the production implementation.
///
/// [`Ec2Provider`]: crate::Ec2Provider
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Launch a batch of instances per the spec. The returned instances are
    /// typically still pending and have no public address yet.
    async fn run_instances(&self, spec: &LaunchSpec) -> Result<Vec<Instance>>;

    /// Refresh a single instance's state and public address
    async fn describe_instance(&self, id: &str) -> Result<Instance>;

    async fn start_instances(&self, ids: &[String]) -> Result<()>;

    async fn stop_instances(&self, ids: &[String]) -> Result<()>;

    async fn terminate_instances(&self, ids: &[String]) -> Result<()>;

    /// Block until the instance reaches `target`, returning its refreshed
    /// attributes. Waiting for [`InstanceState::Running`] also waits for a
    /// public address to be assigned.
    async fn wait_for_state(&self, id: &str, target: InstanceState) -> Result<Instance>;

    /// Create a security group allowing inbound TCP 22 and 80 from anywhere
    /// (IPv4 and IPv6). If a group with this name already exists, adopt it:
    /// the returned `created` flag is false and the caller must not delete
    /// it. Any other provider failure is fatal.
    async fn ensure_security_group(&self, name: &str, description: &str)
    -> Result<SecurityGroup>;

    async fn delete_security_group(&self, id: &str) -> Result<()>;
}
