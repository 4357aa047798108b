use std::fs::OpenOptions;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use db_relocator::args::Args;
use db_relocator::error::Error;
use db_relocator::migration::MigrationSummary;
use tracing::error;
use tracing_subscriber::fmt::writer::MakeWriterExt;

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt().with_max_level(args.log_level);
    if args.no_log_file {
        builder.init();
        return Ok(());
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&args.log_file)
        .with_context(|| format!("Unable to open log file {}", args.log_file.display()))?;
    builder
        .with_ansi(false)
        .with_writer(std::io::stdout.and(Mutex::new(file)))
        .init();
    return Ok(());
}

fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = init_logging(&args) {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }
    let result = db_relocator::run(args);
    if let Err(err) = &result {
        error!("Migration failed: {err}");
    }
    return exit_code(&result);
}

fn exit_code(result: &Result<MigrationSummary, Error>) -> ExitCode {
    return match result {
        Ok(summary) if summary.is_success() => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    };
}
