//! In-memory provider and connector doubles for manager tests

use async_trait::async_trait;
use convoy_cloud::{
    CloudError, ComputeProvider, Instance, InstanceState, LaunchSpec, SecurityGroup,
};
use convoy_ssh::{ConnectFailure, Connector, ExecOutput, RemoteShell, SshError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct ProviderState {
    instances: HashMap<String, Instance>,
    launched: u32,
    ensure_calls: u32,
    group_exists: bool,
    started: Vec<Vec<String>>,
    stopped: Vec<Vec<String>>,
    terminated: Vec<Vec<String>>,
    deleted_groups: Vec<String>,
}

/// Compute provider backed by an in-memory instance table. Clones share
/// state, so a test can hand one clone to the manager and inspect the
/// other.
#[derive(Clone, Default)]
pub struct MockProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next ensure_security_group call behave as an adoption
    pub fn pretend_group_exists(&self) {
        self.state.lock().unwrap().group_exists = true;
    }

    pub fn ensure_calls(&self) -> u32 {
        self.state.lock().unwrap().ensure_calls
    }

    pub fn started(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().started.clone()
    }

    pub fn stopped(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().stopped.clone()
    }

    pub fn terminated(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().terminated.clone()
    }

    pub fn deleted_groups(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted_groups.clone()
    }
}

fn set_states(state: &mut ProviderState, ids: &[String], target: InstanceState) {
    for id in ids {
        if let Some(instance) = state.instances.get_mut(id) {
            instance.state = target;
        }
    }
}

#[async_trait]
impl ComputeProvider for MockProvider {
    async fn run_instances(&self, spec: &LaunchSpec) -> convoy_cloud::Result<Vec<Instance>> {
        let mut state = self.state.lock().unwrap();
        let mut batch = Vec::with_capacity(spec.count as usize);
        for _ in 0..spec.count {
            state.launched += 1;
            let instance = Instance {
                id: format!("i-{:06}", state.launched),
                public_ip: None,
                state: InstanceState::Pending,
            };
            state.instances.insert(instance.id.clone(), instance.clone());
            batch.push(instance);
        }
        Ok(batch)
    }

    async fn describe_instance(&self, id: &str) -> convoy_cloud::Result<Instance> {
        self.state
            .lock()
            .unwrap()
            .instances
            .get(id)
            .cloned()
            .ok_or_else(|| CloudError::InstanceNotFound(id.to_string()))
    }

    async fn start_instances(&self, ids: &[String]) -> convoy_cloud::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.started.push(ids.to_vec());
        set_states(&mut state, ids, InstanceState::Pending);
        Ok(())
    }

    async fn stop_instances(&self, ids: &[String]) -> convoy_cloud::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.stopped.push(ids.to_vec());
        set_states(&mut state, ids, InstanceState::Stopping);
        Ok(())
    }

    async fn terminate_instances(&self, ids: &[String]) -> convoy_cloud::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.terminated.push(ids.to_vec());
        set_states(&mut state, ids, InstanceState::ShuttingDown);
        Ok(())
    }

    async fn wait_for_state(
        &self,
        id: &str,
        target: InstanceState,
    ) -> convoy_cloud::Result<Instance> {
        let mut state = self.state.lock().unwrap();
        let instance = state
            .instances
            .get_mut(id)
            .ok_or_else(|| CloudError::InstanceNotFound(id.to_string()))?;
        instance.state = target;
        match target {
            InstanceState::Running => {
                if instance.public_ip.is_none() {
                    let n: u32 = id.trim_start_matches("i-").parse().unwrap_or(0);
                    instance.public_ip = Some(format!("203.0.113.{n}"));
                }
            }
            InstanceState::Stopped | InstanceState::Terminated => {
                instance.public_ip = None;
            }
            _ => {}
        }
        Ok(instance.clone())
    }

    async fn ensure_security_group(
        &self,
        _name: &str,
        _description: &str,
    ) -> convoy_cloud::Result<SecurityGroup> {
        let mut state = self.state.lock().unwrap();
        state.ensure_calls += 1;
        let created = !state.group_exists;
        state.group_exists = true;
        Ok(SecurityGroup {
            id: "sg-mock".to_string(),
            created,
        })
    }

    async fn delete_security_group(&self, id: &str) -> convoy_cloud::Result<()> {
        self.state
            .lock()
            .unwrap()
            .deleted_groups
            .push(id.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct ConnectorState {
    attempts: u32,
    opened: u32,
    exit_status: i32,
    fail_always: Option<ConnectFailure>,
    fail_hosts: HashMap<String, ConnectFailure>,
    closed: Vec<u32>,
    execs: Vec<(String, String)>,
    uploads: Vec<(String, PathBuf, PathBuf)>,
    downloads: Vec<(String, PathBuf, PathBuf)>,
}

/// Connector handing out scripted shells. Clones share state.
#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every connect attempt with the given failure kind
    pub fn fail_always(&self, kind: ConnectFailure) {
        self.state.lock().unwrap().fail_always = Some(kind);
    }

    /// Fail connect attempts to one host only
    pub fn fail_host_always(&self, host: &str, kind: ConnectFailure) {
        self.state
            .lock()
            .unwrap()
            .fail_hosts
            .insert(host.to_string(), kind);
    }

    /// Exit status every subsequent exec reports
    pub fn set_exit_status(&self, status: i32) {
        self.state.lock().unwrap().exit_status = status;
    }

    /// Total connect attempts, failures included
    pub fn attempts(&self) -> u32 {
        self.state.lock().unwrap().attempts
    }

    pub fn sessions_opened(&self) -> u32 {
        self.state.lock().unwrap().opened
    }

    /// Serials of explicitly closed shells, in close order. Serials count
    /// from 1 in open order.
    pub fn closed_shells(&self) -> Vec<u32> {
        self.state.lock().unwrap().closed.clone()
    }

    /// (host, command) pairs in execution order
    pub fn exec_log(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().execs.clone()
    }

    pub fn upload_log(&self) -> Vec<(String, PathBuf, PathBuf)> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn download_log(&self) -> Vec<(String, PathBuf, PathBuf)> {
        self.state.lock().unwrap().downloads.clone()
    }
}

impl Connector for MockConnector {
    fn connect(
        &self,
        host: &str,
        _password: Option<&str>,
    ) -> convoy_ssh::Result<Box<dyn RemoteShell>> {
        let mut state = self.state.lock().unwrap();
        state.attempts += 1;
        let failure = state.fail_hosts.get(host).copied().or(state.fail_always);
        if let Some(kind) = failure {
            return Err(SshError::Connect {
                host: host.to_string(),
                kind,
                message: "scripted connection failure".to_string(),
            });
        }
        state.opened += 1;
        Ok(Box::new(MockShell {
            host: host.to_string(),
            serial: state.opened,
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockShell {
    host: String,
    serial: u32,
    state: Arc<Mutex<ConnectorState>>,
}

impl RemoteShell for MockShell {
    fn exec(&mut self, command: &str) -> convoy_ssh::Result<ExecOutput> {
        let mut state = self.state.lock().unwrap();
        state.execs.push((self.host.clone(), command.to_string()));
        let exit_status = state.exit_status;
        let stdout = if exit_status == 0 {
            command
                .strip_prefix("echo ")
                .map(|rest| format!("{rest}\n"))
                .unwrap_or_default()
        } else {
            String::new()
        };
        let stderr = if exit_status == 0 {
            String::new()
        } else {
            "scripted failure\n".to_string()
        };
        Ok(ExecOutput {
            exit_status,
            stdout,
            stderr,
        })
    }

    fn upload(&mut self, source: &Path, destination: &Path) -> convoy_ssh::Result<()> {
        self.state.lock().unwrap().uploads.push((
            self.host.clone(),
            source.to_path_buf(),
            destination.to_path_buf(),
        ));
        Ok(())
    }

    fn download(&mut self, source: &Path, destination: &Path) -> convoy_ssh::Result<()> {
        self.state.lock().unwrap().downloads.push((
            self.host.clone(),
            source.to_path_buf(),
            destination.to_path_buf(),
        ));
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().unwrap().closed.push(self.serial);
    }
}
