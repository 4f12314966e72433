use clap::{
    Parser,
    Subcommand,
};
use unsplash_stats_config::Overrides;

/// Collect point-in-time Unsplash account stats into SQLite.
#[derive(Parser, Debug, Clone)]
#[command(name = "unsplash-stats", author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Fetch the latest stats and save one snapshot run.
    Collect {
        #[command(flatten)]
        overrides: Overrides,

        /// Do not write the export files after the run.
        #[arg(long)]
        skip_export: bool,
    },
    /// Write the history views as JSON files.
    Export {
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Serve the collection API and the history views over HTTP.
    Serve {
        #[command(flatten)]
        overrides: Overrides,
    },
}

impl Command {
    pub fn overrides(&self) -> &Overrides {
        match self {
            Command::Collect { overrides, .. } | Command::Export { overrides } | Command::Serve { overrides } => overrides,
        }
    }
}
