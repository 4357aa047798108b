use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{debug, info};
use which::which;

use crate::retry::ExponentialRetry;

const LOCAL_HOST: Ipv4Addr = Ipv4Addr::LOCALHOST;
const MAX_POLL_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
pub struct TunnelConfig {
    pub ssh_host: String,
    pub ssh_port: u16,
    pub ssh_username: String,
    pub ssh_key_path: Option<PathBuf>,
    /// Port on 127.0.0.1 forwarded to the remote database
    pub local_port: u16,
    /// How long to wait for the forward to start accepting connections
    pub timeout: Duration,
}

/// Local port forward kept open by an `ssh -N -L` child process.
/// The child is killed on `close` or when the tunnel is dropped.
pub struct SshTunnel {
    child: Child,
    local_port: u16,
    closed: bool,
}

fn ssh_command(ssh: &Path, config: &TunnelConfig, remote_host: &str, remote_port: u16) -> Command {
    let mut cmd = Command::new(ssh);
    cmd.arg("-N")
        .arg("-o")
        .arg("ExitOnForwardFailure=yes")
        .arg("-o")
        .arg("BatchMode=yes")
        .arg("-o")
        .arg("ServerAliveInterval=30")
        .arg("-p")
        .arg(config.ssh_port.to_string())
        .arg("-L")
        .arg(format!(
            "{LOCAL_HOST}:{}:{remote_host}:{remote_port}",
            config.local_port
        ));
    if let Some(key) = &config.ssh_key_path {
        cmd.arg("-i").arg(key);
    }
    cmd.arg(format!("{}@{}", config.ssh_username, config.ssh_host))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::inherit());
    return cmd;
}

/// Anything already listening on the local port would be mistaken for the tunnel.
fn ensure_port_free(port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind((LOCAL_HOST, port))
        .with_context(|| format!("Local port {port} is already in use"))?;
    drop(listener);
    return Ok(());
}

impl SshTunnel {
    pub fn open(config: &TunnelConfig, remote_host: &str, remote_port: u16) -> anyhow::Result<Self> {
        info!(
            "Setting up SSH tunnel via {}@{}:{}...",
            config.ssh_username, config.ssh_host, config.ssh_port
        );
        ensure_port_free(config.local_port)?;
        let ssh = which("ssh").context("ssh client not found in PATH")?;
        let child = ssh_command(&ssh, config, remote_host, remote_port)
            .spawn()
            .context("Failed to start ssh")?;
        let mut tunnel = SshTunnel {
            child,
            local_port: config.local_port,
            closed: false,
        };
        tunnel.wait_until_ready(config.timeout)?;
        info!("SSH tunnel established on local port {}", tunnel.local_port);
        return Ok(tunnel);
    }

    pub fn local_host(&self) -> String {
        return LOCAL_HOST.to_string();
    }

    pub fn local_port(&self) -> u16 {
        return self.local_port;
    }

    fn wait_until_ready(&mut self, timeout: Duration) -> anyhow::Result<()> {
        let started = Instant::now();
        let addr = SocketAddr::from((LOCAL_HOST, self.local_port));
        let mut delays = ExponentialRetry::with_base_duration(32, Duration::from_millis(100));
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Err(anyhow::anyhow!(
                    "ssh exited before the tunnel was ready ({status})"
                ));
            }
            if TcpStream::connect_timeout(&addr, Duration::from_secs(1)).is_ok() {
                if let Some(status) = self.child.try_wait()? {
                    return Err(anyhow::anyhow!(
                        "ssh exited before the tunnel was ready ({status})"
                    ));
                }
                return Ok(());
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(anyhow::anyhow!("Tunnel is not ready after {timeout:?}"));
            }
            let delay = delays
                .next()
                .context("Tunnel is not ready")?
                .min(MAX_POLL_DELAY)
                .min(timeout - elapsed);
            debug!("Tunnel is not ready yet, next check in {delay:?}");
            std::thread::sleep(delay);
        }
    }

    pub fn close(&mut self) -> anyhow::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.child.try_wait()?.is_none() {
            self.child.kill().context("Failed to stop ssh")?;
        }
        self.child.wait().context("Failed to wait for ssh to exit")?;
        info!("SSH tunnel closed");
        return Ok(());
    }
}

impl Drop for SshTunnel {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.close();
        }
    }
}
