//! Fleet configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Desired fleet shape and connection settings.
///
/// All knobs are caller-supplied at construction; there is no CLI or config
/// file surface. `Default` matches a one-instance Ubuntu fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Name of the key pair instances launch with
    pub key_name: String,

    /// Path to the private key file. When absent, the key is read from the
    /// `CONVOY_PRIVATE_KEY` environment variable.
    pub key_file: Option<PathBuf>,

    /// Read AWS credentials and region from environment variables instead
    /// of the ambient profile chain
    pub env_credentials: bool,

    /// Number of instances to create
    pub instance_count: i32,

    /// EC2 instance type name
    pub instance_type: String,

    /// Machine image instances launch from
    pub image_id: String,

    /// Login user of the image
    pub username: String,

    /// Home directory on the instances; uploads land under it
    pub home_dir: PathBuf,

    /// Pre-existing security group ids. When absent, a group is created
    /// lazily on the first launch and deleted again at teardown.
    pub security_group_ids: Option<Vec<String>>,

    /// Fixed delay between session-connect attempts
    pub connect_retry_delay: Duration,

    /// TCP connect timeout per session attempt
    pub tcp_timeout: Duration,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            key_name: String::new(),
            key_file: None,
            env_credentials: false,
            instance_count: 1,
            instance_type: "c5.large".to_string(),
            image_id: "ami-0a47106e391391252".to_string(),
            username: "ubuntu".to_string(),
            home_dir: PathBuf::from("/home/ubuntu"),
            security_group_ids: None,
            connect_retry_delay: Duration::from_secs(10),
            tcp_timeout: Duration::from_secs(10),
        }
    }
}
