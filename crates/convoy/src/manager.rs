//! The fleet manager: instance lifecycle, sessions, remote operations

use crate::config::FleetConfig;
use crate::error::{FleetError, Result};
use crate::target::Target;
use convoy_cloud::{ComputeProvider, Ec2Provider, Instance, InstanceState, LaunchSpec};
use convoy_ssh::{Connector, ExecOutput, KeyMaterial, RemoteShell, SshConnector};
use std::collections::HashMap;
use std::path::Path;

/// Name of the security group created when none is supplied
const SECURITY_GROUP_NAME: &str = "convoy-fleet";
const SECURITY_GROUP_DESCRIPTION: &str = "Managed by convoy";

/// Default number of session-connect attempts per instance
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 10;

/// Result of one remote command on one instance
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub instance_id: String,
    pub output: ExecOutput,
}

/// Orchestrates a pool of remote instances and their shell sessions.
///
/// Operations run strictly sequentially over the selected instances. The
/// manager owns at most one session per instance; stopping or terminating
/// instances drops their sessions, and reconnecting replaces (and closes)
/// any previous session.
///
/// Teardown is guaranteed by [`run_scoped`]; a manager dropped with live
/// instances only logs a warning.
///
/// [`run_scoped`]: crate::run_scoped
pub struct FleetManager {
    config: FleetConfig,
    provider: Box<dyn ComputeProvider>,
    connector: Box<dyn Connector>,
    instances: Vec<Instance>,
    sessions: HashMap<String, Box<dyn RemoteShell>>,
    security_group_ids: Vec<String>,
    owns_security_group: bool,
    cleaned_up: bool,
}

impl FleetManager {
    /// Build a manager backed by EC2 and libssh2, per the configuration's
    /// credential mode and key material.
    pub async fn new(config: FleetConfig) -> Result<Self> {
        let provider: Box<dyn ComputeProvider> = if config.env_credentials {
            Box::new(Ec2Provider::from_env().await?)
        } else {
            Box::new(Ec2Provider::from_profile().await)
        };

        let key = KeyMaterial::resolve(config.key_file.as_deref())?;
        let connector = Box::new(SshConnector {
            username: config.username.clone(),
            key,
            tcp_timeout: config.tcp_timeout,
        });

        Ok(Self::with_parts(config, provider, connector))
    }

    /// Build a manager from explicit provider and connector implementations
    pub fn with_parts(
        config: FleetConfig,
        provider: Box<dyn ComputeProvider>,
        connector: Box<dyn Connector>,
    ) -> Self {
        let security_group_ids = config.security_group_ids.clone().unwrap_or_default();
        Self {
            config,
            provider,
            connector,
            instances: Vec::new(),
            sessions: HashMap::new(),
            security_group_ids,
            owns_security_group: false,
            cleaned_up: false,
        }
    }

    /// Currently tracked instances, in launch order
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn has_session(&self, instance_id: &str) -> bool {
        self.sessions.contains_key(instance_id)
    }

    pub fn security_group_ids(&self) -> &[String] {
        &self.security_group_ids
    }

    /// True when this manager created the security group and therefore must
    /// delete it at teardown
    pub fn owns_security_group(&self) -> bool {
        self.owns_security_group
    }

    /// Launch the configured number of instances, replacing the tracked
    /// collection wholesale. Creates a security group first if none is
    /// configured. With `wait_for_running`, blocks until every instance is
    /// running and has a public address; otherwise instances may still be
    /// pending and address-dependent operations require [`load_instances`]
    /// first.
    ///
    /// [`load_instances`]: FleetManager::load_instances
    pub async fn create_instances(&mut self, wait_for_running: bool) -> Result<&[Instance]> {
        if self.security_group_ids.is_empty() {
            let group = self
                .provider
                .ensure_security_group(SECURITY_GROUP_NAME, SECURITY_GROUP_DESCRIPTION)
                .await?;
            self.owns_security_group = group.created;
            self.security_group_ids = vec![group.id];
        }

        let spec = LaunchSpec {
            image_id: self.config.image_id.clone(),
            instance_type: self.config.instance_type.clone(),
            count: self.config.instance_count,
            key_name: self.config.key_name.clone(),
            security_group_ids: self.security_group_ids.clone(),
        };

        self.instances = self.provider.run_instances(&spec).await?;
        tracing::info!(count = self.instances.len(), "instances launched");

        if wait_for_running {
            self.load_instances().await?;
        }

        Ok(&self.instances)
    }

    /// Block until every tracked instance is running, refreshing state and
    /// public address.
    pub async fn load_instances(&mut self) -> Result<()> {
        for index in 0..self.instances.len() {
            let id = self.instances[index].id.clone();
            let refreshed = self.provider.wait_for_state(&id, InstanceState::Running).await?;
            self.instances[index] = refreshed;
        }
        Ok(())
    }

    /// Start the selected instances, optionally blocking until running
    pub async fn start_instances(&mut self, target: Target, wait_until_running: bool) -> Result<()> {
        let ids = target.resolve(&self.instances)?;
        if ids.is_empty() {
            return Ok(());
        }

        for id in &ids {
            tracing::info!(instance = %id, "starting instance");
        }
        self.provider.start_instances(&ids).await?;

        if wait_until_running {
            for id in &ids {
                let refreshed = self.provider.wait_for_state(id, InstanceState::Running).await?;
                tracing::info!(instance = %id, "instance running");
                self.update_tracked(refreshed);
            }
        }
        Ok(())
    }

    /// Stop the selected instances. Their sessions are closed either way;
    /// with the wait flag, blocks until each reports stopped.
    pub async fn stop_instances(&mut self, target: Target, wait_until_stopped: bool) -> Result<()> {
        let ids = target.resolve(&self.instances)?;
        if ids.is_empty() {
            return Ok(());
        }

        for id in &ids {
            tracing::info!(instance = %id, "stopping instance");
        }
        self.provider.stop_instances(&ids).await?;

        if wait_until_stopped {
            for id in &ids {
                let refreshed = self.provider.wait_for_state(id, InstanceState::Stopped).await?;
                tracing::info!(instance = %id, "instance stopped");
                self.update_tracked(refreshed);
            }
        }

        self.drop_sessions(&ids);
        Ok(())
    }

    /// Terminate the selected instances. Their sessions are closed either
    /// way; with the wait flag, blocks until each reports terminated.
    pub async fn terminate_instances(
        &mut self,
        target: Target,
        wait_until_terminated: bool,
    ) -> Result<()> {
        let ids = target.resolve(&self.instances)?;
        if ids.is_empty() {
            return Ok(());
        }

        for id in &ids {
            tracing::info!(instance = %id, "terminating instance");
        }
        self.provider.terminate_instances(&ids).await?;

        if wait_until_terminated {
            for id in &ids {
                let refreshed = self
                    .provider
                    .wait_for_state(id, InstanceState::Terminated)
                    .await?;
                tracing::info!(instance = %id, "instance terminated");
                self.update_tracked(refreshed);
            }
        }

        self.drop_sessions(&ids);
        Ok(())
    }

    /// Open a session to each selected instance, retrying transient
    /// connection failures up to `max_attempts` times with a fixed delay.
    /// Exhausting the attempts is fatal for that instance, but the
    /// remaining instances are still attempted; the first failure is
    /// surfaced after the loop. A pre-existing session is closed before the
    /// new one replaces it.
    pub async fn connect_to_instances(
        &mut self,
        target: Target,
        max_attempts: u32,
        password: Option<&str>,
    ) -> Result<()> {
        let ids = target.resolve(&self.instances)?;
        let mut first_failure = None;

        for id in &ids {
            let host = match self.tracked(id)?.public_ip.clone() {
                Some(host) => host,
                None => {
                    tracing::error!(instance = %id, "instance has no public address yet");
                    if first_failure.is_none() {
                        first_failure =
                            Some(convoy_cloud::CloudError::NoPublicAddress(id.clone()).into());
                    }
                    continue;
                }
            };

            match self.connect_one(&host, max_attempts, password).await {
                Ok(shell) => {
                    if let Some(mut previous) = self.sessions.remove(id) {
                        previous.close();
                    }
                    self.sessions.insert(id.clone(), shell);
                    tracing::info!(instance = %id, host = %host, "connected");
                }
                Err(err) => {
                    tracing::error!(instance = %id, error = %err, "giving up on instance");
                    if first_failure.is_none() {
                        first_failure = Some(err);
                    }
                }
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn connect_one(
        &self,
        host: &str,
        max_attempts: u32,
        password: Option<&str>,
    ) -> Result<Box<dyn RemoteShell>> {
        let mut attempt: u32 = 1;
        loop {
            match self.connector.connect(host, password) {
                Ok(shell) => return Ok(shell),
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(
                        host,
                        attempt,
                        max_attempts,
                        error = %err,
                        "connection attempt failed, trying again"
                    );
                    tokio::time::sleep(self.config.connect_retry_delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Close the sessions of the selected instances. A missing session is
    /// logged unless suppressed; never an error.
    pub fn close_instance_connections(
        &mut self,
        target: Target,
        suppress_warning: bool,
    ) -> Result<()> {
        let ids = target.resolve(&self.instances)?;
        for id in &ids {
            match self.sessions.remove(id) {
                Some(mut shell) => shell.close(),
                None if !suppress_warning => {
                    tracing::warn!(instance = %id, "instance has no open session");
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Run a command on each selected instance and wait for its exit
    /// status. Output lines are printed (stdout on success, stderr on a
    /// non-zero status); a non-zero remote status is reported, not an
    /// error. The per-instance outcomes are returned for callers that want
    /// to inspect exit statuses.
    pub fn execute_command(&mut self, command: &str, target: Target) -> Result<Vec<CommandOutcome>> {
        tracing::info!(command, "executing remote command");
        let ids = target.resolve(&self.instances)?;
        let mut outcomes = Vec::with_capacity(ids.len());

        for id in &ids {
            let shell = self
                .sessions
                .get_mut(id)
                .ok_or_else(|| FleetError::NoSession(id.clone()))?;
            let output = shell.exec(command)?;

            if output.success() {
                for line in output.stdout.lines() {
                    println!("{line}");
                }
            } else {
                tracing::warn!(instance = %id, status = output.exit_status, "remote command failed");
                for line in output.stderr.lines() {
                    eprintln!("{line}");
                }
            }

            outcomes.push(CommandOutcome {
                instance_id: id.clone(),
                output,
            });
        }

        Ok(outcomes)
    }

    /// Upload a local file to `<home_dir>/<destination>` on each selected
    /// instance
    pub fn upload_file_to_instances(
        &mut self,
        source: &Path,
        destination: &str,
        target: Target,
    ) -> Result<()> {
        let ids = target.resolve(&self.instances)?;
        let remote = self.config.home_dir.join(destination);

        for id in &ids {
            let shell = self
                .sessions
                .get_mut(id)
                .ok_or_else(|| FleetError::NoSession(id.clone()))?;
            shell.upload(source, &remote)?;
            tracing::info!(instance = %id, file = %remote.display(), "file uploaded");
        }
        Ok(())
    }

    /// Download a file from a single instance to a local path
    pub fn download_file_from_instance(
        &mut self,
        source: &Path,
        destination: &Path,
        instance_id: &str,
    ) -> Result<()> {
        self.tracked(instance_id)?;
        let shell = self
            .sessions
            .get_mut(instance_id)
            .ok_or_else(|| FleetError::NoSession(instance_id.to_string()))?;
        shell.download(source, destination)?;
        tracing::info!(instance = %instance_id, file = %source.display(), "file downloaded");
        Ok(())
    }

    /// Fetch a URL on each selected instance (plain `wget` delegation)
    pub fn download_file_from_url(&mut self, url: &str, target: Target) -> Result<Vec<CommandOutcome>> {
        let command = format!("wget {url}");
        self.execute_command(&command, target)
    }

    /// Terminate everything this manager still tracks and delete the
    /// security group when this manager created it. Waiting for termination
    /// only matters in the owning case, since the group cannot be deleted
    /// while instances still reference it. Every step is best-effort:
    /// failures are logged and the remaining steps still run.
    pub async fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;

        let wait = self.owns_security_group;
        if let Err(err) = self.terminate_instances(Target::All, wait).await {
            tracing::error!(error = %err, "failed to terminate instances during cleanup");
        }

        if self.owns_security_group {
            for id in self.security_group_ids.clone() {
                if let Err(err) = self.provider.delete_security_group(&id).await {
                    tracing::warn!(group = %id, error = %err, "failed to delete security group");
                }
            }
        }
    }

    fn tracked(&self, id: &str) -> Result<&Instance> {
        self.instances
            .iter()
            .find(|instance| instance.id == id)
            .ok_or_else(|| FleetError::UnknownInstance(id.to_string()))
    }

    fn update_tracked(&mut self, refreshed: Instance) {
        if let Some(entry) = self
            .instances
            .iter_mut()
            .find(|instance| instance.id == refreshed.id)
        {
            *entry = refreshed;
        }
    }

    /// Close and forget sessions for the given ids, warnings suppressed
    fn drop_sessions(&mut self, ids: &[String]) {
        for id in ids {
            if let Some(mut shell) = self.sessions.remove(id) {
                shell.close();
            }
        }
    }
}

impl Drop for FleetManager {
    fn drop(&mut self) {
        let live = self
            .instances
            .iter()
            .filter(|instance| instance.state != InstanceState::Terminated)
            .count();
        if !self.cleaned_up && live > 0 {
            tracing::warn!(
                instances = live,
                "fleet manager dropped without cleanup; instances may keep running"
            );
        }
    }
}
