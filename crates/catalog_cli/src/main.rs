//! CLI probe for `catalog_core`.
//!
//! # Responsibility
//! - Exercise the category data-access layer against a real database.
//! - Print records as JSON lines for quick local checks.

use catalog_core::{
    init_logging, AppConfig, AppDbContext, CategoryListQuery, CategoryService, ContextError,
    ContextOptions, LoggingConfig,
};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "catalog_cli", version, about = "Manage catalog categories")]
struct Cli {
    #[command(flatten)]
    target: Target,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct Target {
    /// Connection string, e.g. `Data Source=catalog.db`.
    #[arg(long)]
    connection: Option<String>,

    /// TOML configuration file with a `[database]` section.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a category.
    Add { title: String },
    /// List categories.
    List {
        #[arg(long)]
        contains: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show one category.
    Show { id: i64 },
    /// Replace a category title.
    Rename { id: i64, title: String },
    /// Delete a category.
    Remove { id: i64 },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.validation_errors() {
                Some(errors) => {
                    for message in errors.messages() {
                        eprintln!("error: {message}");
                    }
                }
                None => eprintln!("error: {err}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), ContextError> {
    let options = resolve_options(&cli.target)?;
    let mut context = AppDbContext::open(&options)?;

    let outcome = execute(&mut context, cli.command);
    finish(outcome, context.close())
}

/// Keeps the command's own error when closing the context also fails.
fn finish(
    outcome: Result<(), ContextError>,
    closed: Result<(), ContextError>,
) -> Result<(), ContextError> {
    match (outcome, closed) {
        (Err(err), Err(close_err)) => {
            warn!("event=context_close module=cli status=error error={close_err}");
            Err(err)
        }
        (Err(err), Ok(())) => Err(err),
        (Ok(()), closed) => closed,
    }
}

fn resolve_options(target: &Target) -> Result<ContextOptions, ContextError> {
    if let Some(path) = &target.config {
        let config = AppConfig::load_from_path(path)?;
        start_logging(&config.logging);
        return Ok(config.database);
    }

    let connection = target.connection.as_deref().unwrap_or_default();
    Ok(ContextOptions::from_connection_string(connection)?)
}

fn start_logging(config: &LoggingConfig) {
    if let Err(err) = init_logging(config) {
        eprintln!("warning: logging disabled: {err}");
    }
}

fn execute(context: &mut AppDbContext, command: Command) -> Result<(), ContextError> {
    let mut service = CategoryService::new(context);

    match command {
        Command::Add { title } => {
            let id = service.create(title)?;
            info!("event=cli_add module=cli status=ok id={id}");
            println!("{id}");
        }
        Command::List { contains, limit } => {
            let query = CategoryListQuery {
                title_contains: contains,
                limit,
                offset: 0,
            };
            for category in service.list(&query)? {
                print_json(&category);
            }
        }
        Command::Show { id } => {
            let category = service.get(id)?.ok_or(ContextError::NotFound(id))?;
            print_json(&category);
        }
        Command::Rename { id, title } => {
            let category = service.rename(id, title)?;
            print_json(&category);
        }
        Command::Remove { id } => service.delete(id)?,
    }

    Ok(())
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(err) => eprintln!("error: failed to encode record: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::finish;
    use catalog_core::ContextError;

    #[test]
    fn command_error_wins_over_close_error() {
        let err = finish(Err(ContextError::NotFound(3)), Err(ContextError::MissingId)).unwrap_err();
        assert!(matches!(err, ContextError::NotFound(3)));
    }

    #[test]
    fn close_error_surfaces_after_successful_command() {
        let err = finish(Ok(()), Err(ContextError::MissingId)).unwrap_err();
        assert!(matches!(err, ContextError::MissingId));
        assert!(finish(Ok(()), Ok(())).is_ok());
    }
}
