//! aws-sdk-ec2 implementation of [`ComputeProvider`]

use crate::error::{CloudError, Result};
use crate::instance::{Instance, InstanceState, LaunchSpec, SecurityGroup};
use crate::provider::ComputeProvider;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_ec2::Client;
use aws_sdk_ec2::config::Credentials;
use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::types::{InstanceType, IpPermission, IpRange, Ipv6Range};
use std::time::Duration;
use tokio::time::sleep;

/// Interval between state polls while waiting on an instance
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Poll attempts before a wait gives up (10 minutes at 5s intervals)
const MAX_POLLS: u32 = 120;

/// Error code EC2 returns when a security group name is already taken
const DUPLICATE_GROUP_CODE: &str = "InvalidGroup.Duplicate";

/// EC2-backed compute provider
pub struct Ec2Provider {
    client: Client,
}

impl Ec2Provider {
    /// Build a provider from explicit environment variables
    /// (`AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_DEFAULT_REGION`).
    pub async fn from_env() -> Result<Self> {
        let access_key = require_env("AWS_ACCESS_KEY_ID")?;
        let secret_key = require_env("AWS_SECRET_ACCESS_KEY")?;
        let region = require_env("AWS_DEFAULT_REGION")?;

        let credentials = Credentials::new(access_key, secret_key, None, None, "convoy-env");
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(credentials)
            .load()
            .await;

        Ok(Self {
            client: Client::new(&config),
        })
    }

    /// Build a provider from the ambient credential chain (profile files,
    /// instance metadata, SSO, ...).
    pub async fn from_profile() -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self {
            client: Client::new(&config),
        }
    }

    /// Look up an existing security group id by name
    async fn find_security_group(&self, name: &str) -> Result<String> {
        let output = self
            .client
            .describe_security_groups()
            .group_names(name)
            .send()
            .await
            .map_err(api_err)?;

        output
            .security_groups()
            .first()
            .and_then(|group| group.group_id())
            .map(|id| id.to_string())
            .ok_or_else(|| CloudError::GroupNotFound(name.to_string()))
    }
}

fn require_env(name: &'static str) -> Result<String> {
    std::env::var(name).map_err(|_| CloudError::MissingEnv(name))
}

/// Flatten an SDK error, keeping the full error chain in the message
fn api_err<E>(err: SdkError<E>) -> CloudError
where
    E: std::error::Error + Send + Sync + 'static,
{
    CloudError::Api(DisplayErrorContext(&err).to_string())
}

/// Convert an SDK instance into convoy's tracked form
fn convert_instance(instance: &aws_sdk_ec2::types::Instance) -> Result<Instance> {
    let id = instance
        .instance_id()
        .ok_or_else(|| CloudError::Api("instance without id in EC2 response".to_string()))?
        .to_string();

    let state = instance
        .state()
        .and_then(|s| s.name())
        .map(InstanceState::from)
        .unwrap_or(InstanceState::Unknown);

    Ok(Instance {
        id,
        public_ip: instance.public_ip_address().map(|ip| ip.to_string()),
        state,
    })
}

/// Ingress rule allowing any IPv4/IPv6 source on a single TCP port
fn open_tcp_port(port: i32) -> IpPermission {
    IpPermission::builder()
        .ip_protocol("tcp")
        .from_port(port)
        .to_port(port)
        .ip_ranges(IpRange::builder().cidr_ip("0.0.0.0/0").build())
        .ipv6_ranges(Ipv6Range::builder().cidr_ipv6("::/0").build())
        .build()
}

#[async_trait]
impl ComputeProvider for Ec2Provider {
    async fn run_instances(&self, spec: &LaunchSpec) -> Result<Vec<Instance>> {
        tracing::debug!(
            image = %spec.image_id,
            instance_type = %spec.instance_type,
            count = spec.count,
            "launching instances"
        );

        let output = self
            .client
            .run_instances()
            .image_id(&spec.image_id)
            .instance_type(InstanceType::from(spec.instance_type.as_str()))
            .min_count(spec.count)
            .max_count(spec.count)
            .key_name(&spec.key_name)
            .set_security_group_ids(Some(spec.security_group_ids.clone()))
            .send()
            .await
            .map_err(api_err)?;

        output.instances().iter().map(convert_instance).collect()
    }

    async fn describe_instance(&self, id: &str) -> Result<Instance> {
        let output = self
            .client
            .describe_instances()
            .instance_ids(id)
            .send()
            .await
            .map_err(api_err)?;

        let instance = output
            .reservations()
            .iter()
            .flat_map(|reservation| reservation.instances())
            .find(|instance| instance.instance_id() == Some(id))
            .ok_or_else(|| CloudError::InstanceNotFound(id.to_string()))?;

        convert_instance(instance)
    }

    async fn start_instances(&self, ids: &[String]) -> Result<()> {
        self.client
            .start_instances()
            .set_instance_ids(Some(ids.to_vec()))
            .send()
            .await
            .map_err(api_err)?;
        Ok(())
    }

    async fn stop_instances(&self, ids: &[String]) -> Result<()> {
        self.client
            .stop_instances()
            .set_instance_ids(Some(ids.to_vec()))
            .send()
            .await
            .map_err(api_err)?;
        Ok(())
    }

    async fn terminate_instances(&self, ids: &[String]) -> Result<()> {
        self.client
            .terminate_instances()
            .set_instance_ids(Some(ids.to_vec()))
            .send()
            .await
            .map_err(api_err)?;
        Ok(())
    }

    async fn wait_for_state(&self, id: &str, target: InstanceState) -> Result<Instance> {
        for attempt in 0..MAX_POLLS {
            let instance = self.describe_instance(id).await?;

            if instance.state == target {
                // A running instance is only usable once its address is out
                if target != InstanceState::Running || instance.public_ip.is_some() {
                    return Ok(instance);
                }
            }

            if attempt + 1 < MAX_POLLS {
                sleep(POLL_INTERVAL).await;
            }
        }

        Err(CloudError::WaitTimeout {
            id: id.to_string(),
            state: target.as_str(),
        })
    }

    async fn ensure_security_group(
        &self,
        name: &str,
        description: &str,
    ) -> Result<SecurityGroup> {
        let created = self
            .client
            .create_security_group()
            .group_name(name)
            .description(description)
            .send()
            .await;

        let group_id = match created {
            Ok(output) => {
                let id = output
                    .group_id()
                    .ok_or_else(|| {
                        CloudError::Api("security group created without id".to_string())
                    })?
                    .to_string();

                self.client
                    .authorize_security_group_ingress()
                    .group_id(&id)
                    .ip_permissions(open_tcp_port(22))
                    .ip_permissions(open_tcp_port(80))
                    .send()
                    .await
                    .map_err(api_err)?;

                tracing::info!(group = %id, "created security group {name}");
                return Ok(SecurityGroup { id, created: true });
            }
            Err(err) if err.code() == Some(DUPLICATE_GROUP_CODE) => {
                tracing::info!("security group {name} already exists, adopting it");
                self.find_security_group(name).await?
            }
            Err(err) => return Err(api_err(err)),
        };

        Ok(SecurityGroup {
            id: group_id,
            created: false,
        })
    }

    async fn delete_security_group(&self, id: &str) -> Result<()> {
        self.client
            .delete_security_group()
            .group_id(id)
            .send()
            .await
            .map_err(api_err)?;

        tracing::info!(group = %id, "security group deleted");
        Ok(())
    }
}
