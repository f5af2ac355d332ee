use clap::{Parser, Subcommand};
use anyhow::Result;

mod app;
mod config;
mod handler;
mod history;
mod logging;
mod render;
mod repl;
mod session;
mod stream;
mod transport;
mod tui;
mod ui;

use config::Config;

#[derive(Parser)]
#[command(name = "llama-chat")]
#[command(about = "Chat with a streaming llama.cpp endpoint from the terminal")]
#[command(version)]
struct Cli {
    /// Chat endpoint URL (overrides config and LLAMA_CHAT_ENDPOINT)
    #[arg(short, long, global = true)]
    endpoint: Option<String>,
    /// Token budget for the history sent with each turn
    #[arg(short, long, global = true)]
    max_tokens: Option<usize>,
    /// System prompt sent as `preMessage`
    #[arg(short, long, global = true)]
    pre_message: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Full-screen chat (default)
    Tui,
    /// Line-by-line chat on stdin/stdout
    Repl,
    /// Write the resolved settings to the config file
    InitConfig,
}

impl Cli {
    fn apply_to(&self, config: &mut Config) {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_history_tokens = max_tokens;
        }
        if let Some(pre_message) = &self.pre_message {
            config.pre_message = pre_message.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _log_guard = match logging::init_logging() {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("warning: logging disabled: {:#}", e);
            None
        }
    };

    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %format!("{:#}", e), "using default config");
        Config::default()
    });
    config.apply_env();
    cli.apply_to(&mut config);

    match cli.command.unwrap_or(Commands::Tui) {
        Commands::Tui => app::run(&config).await?,
        Commands::Repl => repl::run(&config).await?,
        Commands::InitConfig => {
            let path = config.save()?;
            println!("Wrote {}", path.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::parse_from([
            "llama-chat",
            "--endpoint",
            "http://10.0.0.2:1234/chat",
            "--max-tokens",
            "64",
            "repl",
        ]);
        let mut config = Config::default();
        cli.apply_to(&mut config);

        assert_eq!(config.endpoint, "http://10.0.0.2:1234/chat");
        assert_eq!(config.max_history_tokens, 64);
        assert_eq!(config.pre_message, config::DEFAULT_PRE_MESSAGE);
        assert!(matches!(cli.command, Some(Commands::Repl)));
    }

    #[test]
    fn test_default_command_is_tui() {
        let cli = Cli::parse_from(["llama-chat"]);
        assert!(cli.command.is_none());
        let mut config = Config::default();
        cli.apply_to(&mut config);
        assert_eq!(config, Config::default());
    }
}
