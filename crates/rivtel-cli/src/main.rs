mod cli;
mod commands;
mod error;
mod output;

use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::commands::Ctx;
use crate::error::{exit_code, CliError};

#[tokio::main]
async fn main() {
    // Invalid arguments are exit code 4; help/version print normally.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exit_code::SUCCESS,
                _ => exit_code::USAGE,
            };
            let _ = err.print();
            std::process::exit(code);
        }
    };

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Route warnings and diagnostics to stderr so stdout stays parseable.
fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    // Completions need no context (and no network).
    if let Command::Completions(args) = &cli.command {
        use clap::CommandFactory;
        let mut cmd = Cli::command();
        clap_complete::generate(args.shell, &mut cmd, "rivtel", &mut std::io::stdout());
        return Ok(());
    }

    let ctx = Ctx::new(&cli.global)?;
    let global = &cli.global;

    match cli.command {
        Command::Auth(args) => commands::auth::handle(&ctx, args, global).await,
        Command::Vehicles => commands::vehicles::handle(&ctx, global).await,
        Command::Status { offline } => commands::status::handle(&ctx, offline, global).await,
        Command::Watch { interval } => commands::watch::handle(&ctx, interval, global).await,
        Command::Export {
            since,
            until,
            limit,
        } => commands::export::handle(&ctx, since, until, limit, global).await,
        Command::Store(args) => commands::store_cmd::handle(&ctx, args, global).await,
        Command::Completions(_) => unreachable!("handled above"),
    }
}
