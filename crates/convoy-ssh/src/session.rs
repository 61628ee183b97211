//! SSH session wrapper: command execution and SFTP transfer

use crate::error::{ConnectFailure, Result, SshError};
use crate::key::KeyMaterial;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

const SSH_PORT: u16 = 22;

/// Result of one remote command
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub exit_status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// An established remote shell bound to one host.
///
/// Object safe so the fleet manager can track sessions uniformly and tests
/// can substitute a recording fake.
pub trait RemoteShell: Send {
    /// Run a command, wait for it to finish, and return its exit status and
    /// captured output streams.
    fn exec(&mut self, command: &str) -> Result<ExecOutput>;

    /// Copy a local file to the remote path over a file-transfer channel
    fn upload(&mut self, local: &Path, remote: &Path) -> Result<()>;

    /// Copy a remote file to the local path over a file-transfer channel
    fn download(&mut self, remote: &Path, local: &Path) -> Result<()>;

    /// Close the underlying transport. Best-effort, never fails.
    fn close(&mut self);
}

/// Establishes sessions for the fleet manager
pub trait Connector: Send + Sync {
    fn connect(&self, host: &str, password: Option<&str>) -> Result<Box<dyn RemoteShell>>;
}

/// A live libssh2 session
pub struct SshSession {
    session: ssh2::Session,
    host: String,
}

impl SshSession {
    /// Connect and authenticate with the given key material. The optional
    /// password is used as the key passphrase.
    ///
    /// Failures are tagged so the caller's retry loop can tell transient
    /// conditions apart: TCP errors map to `Timeout`/`NoRoute`, handshake
    /// errors to `NoRoute`, authentication errors to `Auth`.
    pub fn connect(
        host: &str,
        username: &str,
        key: &KeyMaterial,
        password: Option<&str>,
        tcp_timeout: Duration,
    ) -> Result<Self> {
        let addr = (host, SSH_PORT)
            .to_socket_addrs()
            .map_err(|err| connect_err(host, ConnectFailure::NoRoute, &err))?
            .next()
            .ok_or_else(|| SshError::Connect {
                host: host.to_string(),
                kind: ConnectFailure::NoRoute,
                message: "hostname resolved to no addresses".to_string(),
            })?;

        let stream = TcpStream::connect_timeout(&addr, tcp_timeout)
            .map_err(|err| connect_err(host, ConnectFailure::from_io_kind(err.kind()), &err))?;

        let mut session = ssh2::Session::new()?;
        session.set_tcp_stream(stream);
        session
            .handshake()
            .map_err(|err| connect_err(host, ConnectFailure::NoRoute, &err))?;

        match key {
            KeyMaterial::File(path) => session
                .userauth_pubkey_file(username, None, path, password)
                .map_err(|err| connect_err(host, ConnectFailure::Auth, &err))?,
            KeyMaterial::Inline(text) => session
                .userauth_pubkey_memory(username, None, text, password)
                .map_err(|err| connect_err(host, ConnectFailure::Auth, &err))?,
        }

        tracing::debug!(host, username, "session established");
        Ok(Self {
            session,
            host: host.to_string(),
        })
    }
}

fn connect_err(host: &str, kind: ConnectFailure, err: &dyn std::fmt::Display) -> SshError {
    SshError::Connect {
        host: host.to_string(),
        kind,
        message: err.to_string(),
    }
}

impl RemoteShell for SshSession {
    fn exec(&mut self, command: &str) -> Result<ExecOutput> {
        let mut channel = self.session.channel_session()?;
        channel.exec(command)?;

        let mut stdout = String::new();
        channel.read_to_string(&mut stdout)?;

        let mut stderr = String::new();
        channel.stderr().read_to_string(&mut stderr)?;

        channel.wait_close()?;
        let exit_status = channel.exit_status()?;

        Ok(ExecOutput {
            exit_status,
            stdout,
            stderr,
        })
    }

    fn upload(&mut self, local: &Path, remote: &Path) -> Result<()> {
        let sftp = self.session.sftp()?;
        let mut source = std::fs::File::open(local)?;
        let mut destination = sftp.create(remote)?;
        std::io::copy(&mut source, &mut destination)?;
        Ok(())
    }

    fn download(&mut self, remote: &Path, local: &Path) -> Result<()> {
        let sftp = self.session.sftp()?;
        let mut source = sftp.open(remote)?;
        let mut destination = std::fs::File::create(local)?;
        std::io::copy(&mut source, &mut destination)?;
        Ok(())
    }

    fn close(&mut self) {
        tracing::debug!(host = %self.host, "closing session");
        let _ = self
            .session
            .disconnect(None, "closed by fleet manager", None);
    }
}

/// Production [`Connector`]: key-authenticated libssh2 sessions
pub struct SshConnector {
    pub username: String,
    pub key: KeyMaterial,
    pub tcp_timeout: Duration,
}

impl Connector for SshConnector {
    fn connect(&self, host: &str, password: Option<&str>) -> Result<Box<dyn RemoteShell>> {
        let session = SshSession::connect(host, &self.username, &self.key, password, self.tcp_timeout)?;
        Ok(Box::new(session))
    }
}
