use anyhow::Result;
use clap::Parser;
use shoal_backends::cli::{self, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "shoal=debug,info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    if let Some(output) = cli::run(&cli).await? {
        println!("{output}");
    }
    Ok(())
}
