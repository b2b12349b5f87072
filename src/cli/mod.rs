//! CLI module for the PMP AI Gateway

pub mod serve;

use clap::{Args, Parser, Subcommand};

/// PMP AI Gateway - caching, rate limiting proxy for LLM APIs
#[derive(Parser)]
#[command(name = "pmp-ai-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// `serve` runs when no subcommand is given
    pub fn command(self) -> Command {
        self.command
            .unwrap_or_else(|| Command::Serve(ServeArgs::default()))
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the gateway (default mode)
    Serve(ServeArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Delete every key in the store before serving
    #[arg(long)]
    pub flush_store: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_serve() {
        let cli = Cli::parse_from(["pmp-ai-gateway"]);

        assert!(matches!(
            cli.command(),
            Command::Serve(ServeArgs { flush_store: false })
        ));
    }

    #[test]
    fn test_serve_flush_flag() {
        let cli = Cli::parse_from(["pmp-ai-gateway", "serve", "--flush-store"]);

        assert!(matches!(
            cli.command(),
            Command::Serve(ServeArgs { flush_store: true })
        ));
    }
}
