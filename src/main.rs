use clap::Parser;
use std::process::ExitCode;

use bookrag::Settings;
use bookrag::cli::commands::{self, index::IndexArgs, query::QueryArgs};
use bookrag::cli::{Cli, Commands};
use bookrag::logging;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Commands::Init { force } = cli.command {
        logging::init();
        return commands::init::run(force);
    }

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init_with_config(&settings.logging);

    let result = match cli.command {
        Commands::Init { force } => Ok(commands::init::run(force)),
        Commands::Config => commands::config::run(&settings).map(|()| ExitCode::SUCCESS),
        Commands::Index {
            root,
            dry_run,
            limit,
            json,
        } => {
            let args = IndexArgs {
                root,
                dry_run,
                limit,
                json,
            };
            commands::index::run(args, &settings).await
        }
        Commands::Query {
            text,
            mode,
            selection,
            anchor,
            language,
            json,
            context,
        } => {
            let args = QueryArgs {
                text,
                mode,
                selection,
                anchor,
                language,
                json,
                context,
            };
            commands::query::run(args, &settings).await
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
