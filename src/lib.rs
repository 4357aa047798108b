pub mod args;
pub mod databases;
pub mod error;
pub mod migration;
pub mod progress;
pub mod provider;
pub mod retry;
pub mod table_migrator;
pub mod tunnel;
pub mod uri;
pub mod verifier;


use migration::{Migration, MigrationSummary};
use provider::TunnelConnectionProvider;

/// Runs the whole migration described by `args`.
///
/// Returns the per table outcomes. An error means nothing was migrated,
/// either because the configuration is invalid or the connections could not
/// be set up.
pub fn run(args: args::Args) -> Result<MigrationSummary, error::Error> {
    let config = args.migration_config()?;
    let mut provider =
        TunnelConnectionProvider::new(args.source.clone(), args.destination.clone(), args.tunnel_config());
    return Migration::new(config).run(&mut provider);
}
