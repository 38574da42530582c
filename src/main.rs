use anyhow::Result;
use clap::{Parser, Subcommand};
use cryptodash::core::log::init_logging;

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

impl From<Commands> for cryptodash::AppCommand {
    fn from(cmd: Commands) -> cryptodash::AppCommand {
        match cmd {
            Commands::Login { email, password } => {
                cryptodash::AppCommand::Login { email, password }
            }
            Commands::Logout => cryptodash::AppCommand::Logout,
            Commands::Dashboard { once } => cryptodash::AppCommand::Dashboard { once },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Sign in and store the session
    Login {
        /// Account email; prompted for when omitted
        #[arg(long)]
        email: Option<String>,
        /// Account password; prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Drop the stored session
    Logout,
    /// Open the market dashboard
    Dashboard {
        /// Render one frame and exit
        #[arg(long)]
        once: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => cryptodash::cli::setup::setup(),
        Some(cmd) => cryptodash::run_command(cmd.into(), cli.config_path.as_deref()).await,
        // Bare `cryptodash` goes straight to the dashboard.
        None => {
            cryptodash::run_command(
                cryptodash::AppCommand::Dashboard { once: false },
                cli.config_path.as_deref(),
            )
            .await
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
