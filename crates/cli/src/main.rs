//! numthread CLI — the main entry point.
//!
//! Commands:
//! - `init`    — Write the default config file
//! - `serve`   — Start the HTTP API server
//! - `status`  — Show configuration and stored entity counts
//! - `show`    — Print discussions as reply trees

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "numthread",
    about = "numthread — threaded discussions where every reply is an arithmetic step",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration file
    Init,

    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show configuration and entity counts
    Status,

    /// Print discussions with their reply trees
    Show {
        /// Only this discussion
        #[arg(short, long)]
        discussion: Option<i64>,

        /// Emit JSON in the HTTP API's format
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Status => commands::status::run().await?,
        Commands::Show { discussion, json } => commands::show::run(discussion, json).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_show_flags() {
        let cli = Cli::try_parse_from(["numthread", "show", "--discussion", "3", "--json", "-v"])
            .unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Show {
                discussion: Some(3),
                json: true
            }
        ));
    }

    #[test]
    fn parses_serve_port() {
        let cli = Cli::try_parse_from(["numthread", "serve", "--port", "8088"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { port: Some(8088) }));
    }
}
