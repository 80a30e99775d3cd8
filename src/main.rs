use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use xrate::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for xrate::AppCommand {
    fn from(cmd: Commands) -> xrate::AppCommand {
        match cmd {
            Commands::Summary { json } => xrate::AppCommand::Summary { json },
            Commands::Search { query } => xrate::AppCommand::Search {
                query: query.unwrap_or_default(),
            },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display holding totals and cross rates
    Summary {
        /// Print the derived maps as JSON
        #[arg(long)]
        json: bool,
    },
    /// Find currencies by code or name
    Search {
        /// Case-insensitive text to match; lists everything when omitted
        query: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => {
            xrate::cli::setup::setup(cli.config_path.as_deref(), &mut std::io::stdout())
        }
        Some(cmd) => xrate::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
