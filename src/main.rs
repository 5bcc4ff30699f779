use clap::Parser;
use expense_tracker::args::{Args, Command};
use expense_tracker::{commands, Config, Result};
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().expenses_home().path();

    let _: () = match args.command() {
        Command::Init => commands::init(home).await?.print(),

        Command::AddCategory(add_args) => {
            let config = Config::load(home).await?;
            commands::add_category(config, add_args.clone())
                .await?
                .print()
        }

        Command::AddExpense(add_args) => {
            let config = Config::load(home).await?;
            commands::add_expense(config, add_args.clone())
                .await?
                .print()
        }

        Command::Summary => commands::summary(Config::load(home).await?)
            .await?
            .print(),

        Command::Daily(daily_args) => {
            let config = Config::load(home).await?;
            commands::daily(config, daily_args.clone()).await?.print()
        }

        Command::DeleteExpense(delete_args) => {
            let config = Config::load(home).await?;
            commands::delete_expense(config, delete_args.clone())
                .await?
                .print()
        }

        Command::DeleteCategory(delete_args) => {
            let config = Config::load(home).await?;
            commands::delete_category(config, delete_args.clone())
                .await?
                .print()
        }
    };
    Ok(())
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => {
            // RUST_LOG exists; use it.
            EnvFilter::from_default_env()
        }
        None => {
            // RUST_LOG does not exist; use default log level for the library and binary only.
            EnvFilter::new(format!(
                "expense_tracker={},{}={}",
                level,
                env!("CARGO_CRATE_NAME"),
                level
            ))
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
