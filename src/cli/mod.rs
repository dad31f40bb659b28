pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bff-gateway")]
#[command(about = "Validating backend-for-frontend proxy")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Start the HTTP server")]
    Serve {
        #[arg(long, help = "Override the configured listen port")]
        port: Option<u16>,
    },

    #[command(about = "List the endpoint catalog")]
    Routes {
        #[arg(long, help = "Output in JSON format")]
        json: bool,
    },

    #[command(about = "Print the effective configuration as YAML")]
    Config,
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { port } => commands::serve::handle(port).await,
        Commands::Routes { json } => commands::routes::handle(json),
        Commands::Config => commands::config::handle(),
    }
}
