use agenda_rag::Result;
use agenda_rag::commands::{ask_loop, build_index, search_events, show_status};
use agenda_rag::config::{Config, get_config_dir, run_interactive_config, show_config};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "agenda-rag")]
#[command(about = "Index public events and retrieve them to ground answers about what's on")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama, the agenda source and chunking
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Fetch events and rebuild the vector index
    Build {
        /// Region to index instead of the configured one, e.g. "Bretagne"
        #[arg(long)]
        region: Option<String>,
        /// Fetch and chunk events without embedding or storing them
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the indexed chunks closest to a query
    Search {
        query: String,
        /// Number of results, defaults to the configured top_k
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Ask questions interactively
    Ask,
    /// Show the state of Ollama and the vector index
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&Config::load_default()?);
            } else {
                let config_dir = get_config_dir().map_err(anyhow::Error::from)?;
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Build { region, dry_run } => {
            build_index(&Config::load_default()?, region, dry_run).await?;
        }
        Commands::Search { query, limit } => {
            search_events(&Config::load_default()?, &query, limit).await?;
        }
        Commands::Ask => {
            ask_loop(&Config::load_default()?).await?;
        }
        Commands::Status => {
            show_status(&Config::load_default()?).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["agenda-rag", "status"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Status));
        }
    }

    #[test]
    fn build_defaults() {
        let parsed = Cli::try_parse_from(["agenda-rag", "build"]).expect("build parses");
        let Commands::Build { region, dry_run } = parsed.command else {
            panic!("expected the build command");
        };
        assert_eq!(region, None);
        assert!(!dry_run);
    }

    #[test]
    fn build_with_region_and_dry_run() {
        let parsed = Cli::try_parse_from([
            "agenda-rag",
            "build",
            "--region",
            "Bretagne",
            "--dry-run",
        ])
        .expect("build parses");
        let Commands::Build { region, dry_run } = parsed.command else {
            panic!("expected the build command");
        };
        assert_eq!(region.as_deref(), Some("Bretagne"));
        assert!(dry_run);
    }

    #[test]
    fn search_with_limit() {
        let parsed = Cli::try_parse_from(["agenda-rag", "search", "concert jazz", "--limit", "5"])
            .expect("search parses");
        let Commands::Search { query, limit } = parsed.command else {
            panic!("expected the search command");
        };
        assert_eq!(query, "concert jazz");
        assert_eq!(limit, Some(5));
    }

    #[test]
    fn search_requires_a_query() {
        let cli = Cli::try_parse_from(["agenda-rag", "search"]);
        assert!(cli.is_err());
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["agenda-rag", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show } = parsed.command {
                assert!(show);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["agenda-rag", "serve"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["agenda-rag", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
