//! Resource recommender CLI
//!
//! Queries the recommender service for per-application CPU and memory
//! recommendations.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{applications, recommendations};

/// Resource recommender CLI
#[derive(Parser)]
#[command(name = "rsz")]
#[command(author, version, about = "CLI for the Resource Recommender", long_about = None)]
pub struct Cli {
    /// API endpoint URL (falls back to ~/.config/rsz/config.json, then http://localhost:8080)
    #[arg(long, env = "RSZ_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Query recommendations and applications
    #[command(subcommand)]
    Get(GetCommands),

    /// Manage the CLI configuration file
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum GetCommands {
    /// Get resource recommendations
    Recommendations {
        /// Only this application
        #[arg(long, short)]
        application: Option<String>,
    },

    /// List monitored applications
    Applications {
        /// Filter by status (running, idle, terminated)
        #[arg(long)]
        status: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Store the API endpoint in the config file
    SetApiUrl {
        /// Recommender API URL
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut file_config = config::Config::load()?;
    let api_url = file_config.resolve_api_url(cli.api_url);

    match cli.command {
        Commands::Get(get_cmd) => {
            let client = client::ApiClient::new(&api_url)?;
            match get_cmd {
                GetCommands::Recommendations { application } => {
                    recommendations::get_recommendations(&client, application, cli.format).await?;
                }
                GetCommands::Applications { status } => {
                    applications::get_applications(&client, status, cli.format).await?;
                }
            }
        }
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Show => commands::config::show(&file_config, &api_url),
            ConfigCommands::SetApiUrl { url } => {
                commands::config::set_api_url(&mut file_config, url)?;
            }
        },
    }

    Ok(())
}
