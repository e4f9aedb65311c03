use clap::{Parser, Subcommand};
use hsreporter::config::defaults::Overrides;
use hsreporter::config::resolve_config_path;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "hsreporter")]
#[command(about = "Uploads Hearthstone log output to a HTTP endpoint", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Token for authenticating to the HTTP endpoint
    #[arg(long, global = true)]
    token: Option<String>,

    /// HTTP endpoint that receives logging information
    #[arg(long, global = true)]
    server: Option<String>,

    /// Path to Hearthstone's logging configuration file
    #[arg(long = "log-config", global = true)]
    log_config: Option<PathBuf>,

    /// Path to Hearthstone's game logging output file [default: the Unity
    /// player log]
    #[arg(long = "game-log-file", global = true)]
    game_log_file: Option<PathBuf>,

    /// Path to Hearthstone's network logging output file [default: net.log
    /// next to the game log]
    #[arg(long = "net-log-file", global = true)]
    net_log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Run,
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hsreporter=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run) | None => {
            let overrides = Overrides {
                token: cli.token,
                server_url: cli.server,
                log_config: cli.log_config,
                game_log_file: cli.game_log_file,
                net_log_file: cli.net_log_file,
            };
            hsreporter::cli::run::run(config_path, overrides).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                hsreporter::cli::config::init(stdout)?;
            }
            ConfigAction::Validate => {
                hsreporter::cli::config::validate(config_path)?;
            }
        },
    }

    Ok(())
}
