mod commands;
mod utils;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stack")]
#[command(about = "Declare a stack once. Converge it in dependency order.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what apply would change, without changing anything
    Plan {
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Converge the stack
    Apply {
        /// Maximum number of resources reconciled at once
        #[arg(short = 'c', long, env = "STACK_CONCURRENCY", default_value_t = stackflow_cloud::DEFAULT_CONCURRENCY)]
        concurrency: usize,
        /// Seconds a resource may stay in transition before failing
        #[arg(long, env = "STACK_TIMEOUT_SECS")]
        timeout_secs: Option<u64>,
        /// Apply without asking for confirmation
        #[arg(short, long)]
        yes: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every resource of the stack in reverse dependency order
    Destroy {
        /// Destroy without asking for confirmation
        #[arg(short, long)]
        yes: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete one resource and converge the stack again
    Replace {
        /// Resource to replace, as kind:name (e.g. registry:shop-registry)
        resource: String,
        /// Replace without asking for confirmation
        #[arg(short, long)]
        yes: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the attributes of the resources that are ready
    Outputs {
        /// Print the outputs as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate the stack file
    Validate,
    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries plans and JSON; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Version => {
            println!("stackflow {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Validate => {
            commands::validate::handle()?;
        }
        Commands::Plan { json } => {
            commands::plan::handle(json).await?;
        }
        Commands::Apply {
            concurrency,
            timeout_secs,
            yes,
            json,
        } => {
            commands::apply::handle(concurrency, timeout_secs, yes, json).await?;
        }
        Commands::Destroy { yes, json } => {
            commands::destroy::handle(yes, json).await?;
        }
        Commands::Replace {
            resource,
            yes,
            json,
        } => {
            commands::replace::handle(&resource, yes, json).await?;
        }
        Commands::Outputs { json } => {
            commands::outputs::handle(json).await?;
        }
    }

    Ok(())
}
