use clap::Parser;
use color_eyre::Result;
use std::process::ExitCode;
use unsplash_stats::{
    init_errors,
    init_logging,
    App,
    Args,
};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_errors()?;
    init_logging(args.verbose)?;
    App::new(args).run().await
}
