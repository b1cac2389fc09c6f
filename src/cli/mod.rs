pub mod client;
pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "hr")]
#[command(about = "HR CLI - search, lifecycle and form tooling for the HR associates API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(long, global = true, env = "HR_API_URL", default_value = "http://localhost:3000", help = "API base URL")]
    pub url: String,

    #[arg(long, global = true, env = "HR_API_TOKEN", hide_env_values = true, help = "Bearer token for /api routes")]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Explain how a free-text search is understood (offline)")]
    Parse {
        #[arg(help = "Search text, e.g. \"nome João, matricula 1000\"")]
        query: String,
        #[arg(long, help = "Also print the generated SQL")]
        sql: bool,
    },

    #[command(about = "Apply database migrations (uses DATABASE_URL)")]
    Migrate,

    #[command(about = "Check API health")]
    Health,

    #[command(about = "Associate records")]
    Associates {
        #[command(subcommand)]
        cmd: commands::associates::AssociateCommands,
    },

    #[command(about = "Dynamic forms")]
    Forms {
        #[command(subcommand)]
        cmd: commands::forms::FormCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);
    let api = client::ApiClient::new(&cli.url, cli.token.clone())?;

    match cli.command {
        Commands::Parse { query, sql } => commands::parse::handle(&query, sql, output_format),
        Commands::Migrate => commands::migrate::handle(output_format).await,
        Commands::Health => commands::health::handle(&api, output_format).await,
        Commands::Associates { cmd } => commands::associates::handle(cmd, &api, output_format).await,
        Commands::Forms { cmd } => commands::forms::handle(cmd, &api, output_format).await,
    }
}
