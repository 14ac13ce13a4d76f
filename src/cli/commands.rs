//! CLI command definitions using clap.
//!
//! - select: rank catalog tools for a message without calling the model
//! - catalog: list or validate the tool catalog
//! - ask: answer one question end to end
//! - chat: answer a message or a JSON chat request read from stdin

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Toolrag - tool selection and a bounded tool-calling loop for a real estate assistant
#[derive(Parser, Debug)]
#[command(name = "toolrag")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Tool catalog file or directory (overrides config)
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show which tools would be offered to the model for a message
    Select(SelectArgs),

    /// Tool catalog commands
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },

    /// Ask a question and print the answer
    Ask {
        /// The user message
        message: String,

        /// Offer the full catalog instead of a selection
        #[arg(long)]
        all_tools: bool,
    },

    /// Read a message from stdin and write the reply to stdout
    Chat {
        /// Request and reply as JSON ({message, history?} in, {response, chartData?, mapUpdate?} out)
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SelectArgs {
    /// The user message to rank tools for
    pub message: String,

    /// Number of ranked tools to keep
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Number of tools offered when the ranking is weak
    #[arg(long)]
    pub fallback_k: Option<usize>,

    /// Tools that are always offered (repeatable)
    #[arg(short, long = "always-include")]
    pub always_include: Vec<String>,

    /// Show the reason and per-tool scores
    #[arg(short, long)]
    pub debug: bool,

    /// Print the selection as JSON
    #[arg(long)]
    pub json: bool,
}

/// Catalog subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum CatalogCommands {
    /// List catalog tools
    List,

    /// Validate the catalog, optionally against the tools the server exposes
    Validate {
        /// Compare with the MCP server's tools/list
        #[arg(long)]
        against_server: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["toolrag"]).is_err());
    }

    #[test]
    fn test_cli_global_options() {
        let cli = Cli::try_parse_from(["toolrag", "-v", "-c", "/tmp/toolrag.yml", "catalog", "list"]).unwrap();
        assert!(cli.is_verbose());
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/toolrag.yml")));
        assert!(cli.catalog.is_none());
    }

    #[test]
    fn test_select_defaults() {
        let cli = Cli::try_parse_from(["toolrag", "select", "sales in Yas Island"]).unwrap();
        match cli.command {
            Commands::Select(args) => {
                assert_eq!(args.message, "sales in Yas Island");
                assert!(args.top_k.is_none());
                assert!(args.always_include.is_empty());
                assert!(!args.debug);
                assert!(!args.json);
            }
            _ => panic!("Expected select command"),
        }
    }

    #[test]
    fn test_select_options() {
        let cli = Cli::try_parse_from([
            "toolrag",
            "select",
            "rent in Reem",
            "--top-k",
            "3",
            "--fallback-k",
            "8",
            "--always-include",
            "update_map",
            "--always-include",
            "get_districts",
            "--debug",
        ])
        .unwrap();
        match cli.command {
            Commands::Select(args) => {
                assert_eq!(args.top_k, Some(3));
                assert_eq!(args.fallback_k, Some(8));
                assert_eq!(args.always_include, vec!["update_map", "get_districts"]);
                assert!(args.debug);
            }
            _ => panic!("Expected select command"),
        }
    }

    #[test]
    fn test_catalog_validate() {
        let cli = Cli::try_parse_from(["toolrag", "catalog", "validate", "--against-server"]).unwrap();
        match cli.command {
            Commands::Catalog {
                command: CatalogCommands::Validate { against_server },
            } => assert!(against_server),
            _ => panic!("Expected catalog validate command"),
        }
    }

    #[test]
    fn test_ask_and_chat() {
        let cli = Cli::try_parse_from(["toolrag", "ask", "How many districts?"]).unwrap();
        assert!(matches!(cli.command, Commands::Ask { ref message, all_tools: false } if message == "How many districts?"));

        let cli = Cli::try_parse_from(["toolrag", "--catalog", "tools/", "chat", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Chat { json: true }));
        assert_eq!(cli.catalog, Some(PathBuf::from("tools/")));

        let cli = Cli::try_parse_from(["toolrag", "chat"]).unwrap();
        assert!(matches!(cli.command, Commands::Chat { json: false }));
    }

    #[test]
    fn test_help_works() {
        Cli::command().debug_assert();
    }
}
