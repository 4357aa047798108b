use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::Level;

use crate::error::Error;
use crate::migration::{DEFAULT_BATCH_SIZE, MigrationConfig};
use crate::tunnel::TunnelConfig;
use crate::uri::URI;

/// Copy tables from a database behind an SSH tunnel into another database
/// and verify row counts afterwards.
///
/// Every option can also be set through the environment variable shown next to it.
#[derive(Parser, Clone, Debug)]
#[command(version, about, long_about = None)]
#[command(next_line_help = true)]
pub struct Args {
    /// URI of the source database (postgres://, postgresql:// or sqlite://)
    #[arg(long, short, env = "SOURCE_URI")]
    pub source: URI,

    /// URI of the destination database. Tables must already exist there
    #[arg(long, short, env = "DESTINATION_URI")]
    pub destination: URI,

    /// Tables to migrate, in order. Repeat the flag or pass a comma separated list.
    /// Repeated names are migrated once per occurrence
    #[arg(long, short, env = "TABLES_TO_MIGRATE", value_delimiter = ',', required = true)]
    pub table: Vec<String>,

    /// Number of rows read and written per batch
    #[arg(long, env = "BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: u64,

    /// Number of retries to write a batch. Exponential retry is used, with start value 500ms and
    /// factor of 2.
    #[arg(long, env = "BATCH_WRITE_RETRIES", default_value_t = 0)]
    pub batch_write_retries: usize,

    /// SSH host used to reach the source database. Without it the source is reached directly
    #[arg(long, env = "SSH_HOST")]
    pub ssh_host: Option<String>,

    /// SSH port
    #[arg(long, env = "SSH_PORT", default_value_t = 22)]
    pub ssh_port: u16,

    /// SSH user
    #[arg(long, env = "SSH_USERNAME", default_value = "ubuntu")]
    pub ssh_username: String,

    /// Private key for the SSH connection. Defaults to the ssh agent and default keys
    #[arg(long, env = "SSH_KEY_PATH")]
    pub ssh_key_path: Option<PathBuf>,

    /// Local port of the tunnel
    #[arg(long, env = "LOCAL_BIND_PORT", default_value_t = 5434)]
    pub local_port: u16,

    /// Seconds to wait for the tunnel to accept connections
    #[arg(long, env = "TUNNEL_TIMEOUT_SECS", default_value_t = 10)]
    pub tunnel_timeout_secs: u64,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value_t = Level::INFO)]
    pub log_level: Level,

    /// File the log is appended to, in addition to stdout
    #[arg(long, env = "LOG_FILE", default_value = "migration.log")]
    pub log_file: PathBuf,

    /// Log to stdout only
    #[clap(long, action)]
    pub no_log_file: bool,
}

impl Args {
    pub fn new(source: URI, destination: URI) -> Self {
        return Args {
            source,
            destination,
            table: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            batch_write_retries: 0,
            ssh_host: None,
            ssh_port: 22,
            ssh_username: "ubuntu".to_string(),
            ssh_key_path: None,
            local_port: 5434,
            tunnel_timeout_secs: 10,
            log_level: Level::INFO,
            log_file: PathBuf::from("migration.log"),
            no_log_file: true,
        };
    }

    pub fn migration_config(&self) -> Result<MigrationConfig, Error> {
        let mut config = MigrationConfig::new(&self.table, self.batch_size)?;
        config.batch_write_retries = self.batch_write_retries;
        return Ok(config);
    }

    pub fn tunnel_config(&self) -> Option<TunnelConfig> {
        let ssh_host = self.ssh_host.as_ref().filter(|host| !host.trim().is_empty())?;
        return Some(TunnelConfig {
            ssh_host: ssh_host.trim().to_string(),
            ssh_port: self.ssh_port,
            ssh_username: self.ssh_username.clone(),
            ssh_key_path: self.ssh_key_path.clone(),
            local_port: self.local_port,
            timeout: Duration::from_secs(self.tunnel_timeout_secs),
        });
    }
}
