use anyhow::Context;
use tracing::{error, info};

use crate::databases::traits::{DBReader, DBWriter};
use crate::tunnel::{SshTunnel, TunnelConfig};
use crate::uri::URI;

/// Source of the two live connections used by a migration.
///
/// `teardown` releases everything the provider opened, including partially
/// established resources, and may be called more than once.
pub trait ConnectionProvider {
    fn open_source(&mut self) -> anyhow::Result<Box<dyn DBReader>>;

    fn open_destination(&mut self) -> anyhow::Result<Box<dyn DBWriter>>;

    fn teardown(&mut self);
}

/// Opens the source through an SSH tunnel (when configured) and the
/// destination directly.
pub struct TunnelConnectionProvider {
    source: URI,
    destination: URI,
    tunnel_config: Option<TunnelConfig>,
    tunnel: Option<SshTunnel>,
}

impl TunnelConnectionProvider {
    pub fn new(source: URI, destination: URI, tunnel_config: Option<TunnelConfig>) -> Self {
        return Self {
            source,
            destination,
            tunnel_config,
            tunnel: None,
        };
    }

    fn source_uri(&mut self) -> anyhow::Result<URI> {
        let Some(config) = &self.tunnel_config else {
            return Ok(self.source.clone());
        };
        let (remote_host, remote_port) = self
            .source
            .endpoint()
            .context("Source database can't be reached through a tunnel")?;
        let tunnel = SshTunnel::open(config, &remote_host, remote_port)
            .context("Failed to setup SSH tunnel")?;
        let uri = self
            .source
            .with_endpoint(&tunnel.local_host(), tunnel.local_port())?;
        self.tunnel = Some(tunnel);
        return Ok(uri);
    }
}

impl ConnectionProvider for TunnelConnectionProvider {
    fn open_source(&mut self) -> anyhow::Result<Box<dyn DBReader>> {
        let uri = self.source_uri()?;
        let mut reader = uri
            .create_reader()
            .with_context(|| format!("Failed to connect to source {}", uri.redacted()))?;
        reader.ping().context("Source connection check failed")?;
        info!("Source connection successful");
        return Ok(reader);
    }

    fn open_destination(&mut self) -> anyhow::Result<Box<dyn DBWriter>> {
        let mut writer = self.destination.create_writer().with_context(|| {
            format!(
                "Failed to connect to destination {}",
                self.destination.redacted()
            )
        })?;
        writer
            .ping()
            .context("Destination connection check failed")?;
        info!("Destination connection successful");
        return Ok(writer);
    }

    fn teardown(&mut self) {
        if let Some(mut tunnel) = self.tunnel.take() {
            if let Err(err) = tunnel.close() {
                error!("Error during cleanup: {err:#}");
            }
        }
        info!("Cleanup completed");
    }
}
