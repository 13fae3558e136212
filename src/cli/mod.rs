use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "OpenMarks",
    about = "Time-aware bookmarks ranked from your browsing habits"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the collector API until Ctrl+C.
    Service,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Status,
    Doctor,
    /// Print the ranked bookmarks for the current time of day.
    Top {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Record a visit by hand.
    Track {
        url: String,
        #[arg(long)]
        title: Option<String>,
    },
    /// Remove a domain and its whole visit history.
    Forget { domain: String },
    Ignore { domain: String },
    Unignore { domain: String },
    /// Collapse repeat visits to `scheme://host` (`true` or `false`).
    MergeToRoot {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    Stats,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}
