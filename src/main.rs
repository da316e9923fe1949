#![recursion_limit = "256"]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("outfit_x=info".parse()?))
        .init();

    Cli::parse().run()
}
