use clap::Parser;
use pmp_ai_gateway::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command() {
        Command::Serve(args) => cli::serve::run(args).await,
    }
}
