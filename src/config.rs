//! Server configuration loading.
//!
//! Each setting resolves with the precedence: command-line argument, then
//! environment variable (`PORT`, `BOARD_FILE`, `HOST`), then built-in
//! default.

use std::path::PathBuf;

use clap::Parser;
use log::warn;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BOARD: &str = "boards/perfect.txt";
pub const DEFAULT_HOST: &str = "localhost";

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about = "Multiplayer Memory Scramble game server")]
pub struct Args {
    /// Port to listen on (0 picks a free port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Board file loaded as the starting game board
    #[arg(short, long)]
    pub board: Option<PathBuf>,

    /// Host address to bind to
    #[arg(short = 'H', long)]
    pub host: Option<String>,
}

/// Resolved server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub board_file: PathBuf,
    pub host: String,
}

impl Config {
    /// Resolves configuration from the process arguments and environment.
    pub fn load() -> Config {
        Config::resolve(Args::parse())
    }

    fn resolve(args: Args) -> Config {
        let port = args.port.or_else(env_port).unwrap_or(DEFAULT_PORT);
        let board_file = args
            .board
            .or_else(|| std::env::var("BOARD_FILE").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BOARD));
        let host = args
            .host
            .or_else(|| std::env::var("HOST").ok())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        Config {
            port,
            board_file,
            host,
        }
    }
}

fn env_port() -> Option<u16> {
    let raw = std::env::var("PORT").ok()?;
    match raw.parse() {
        Ok(port) => Some(port),
        Err(_) => {
            warn!("ignoring invalid PORT value {:?}", raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_args() -> Args {
        Args {
            port: None,
            board: None,
            host: None,
        }
    }

    #[test]
    fn arguments_win_over_everything() {
        let config = Config::resolve(Args {
            port: Some(0),
            board: Some(PathBuf::from("boards/ab.txt")),
            host: Some("0.0.0.0".to_string()),
        });
        assert_eq!(config.port, 0);
        assert_eq!(config.board_file, PathBuf::from("boards/ab.txt"));
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn env_precedence() {
        // The environment is process-global, so defaults and env fallback
        // are exercised sequentially inside this one test.
        std::env::remove_var("PORT");
        std::env::remove_var("BOARD_FILE");
        std::env::remove_var("HOST");
        let defaults = Config::resolve(no_args());
        assert_eq!(defaults.port, DEFAULT_PORT);
        assert_eq!(defaults.board_file, PathBuf::from(DEFAULT_BOARD));
        assert_eq!(defaults.host, DEFAULT_HOST);

        std::env::set_var("PORT", "9001");
        std::env::set_var("BOARD_FILE", "boards/hearts.txt");
        let from_env = Config::resolve(no_args());
        assert_eq!(from_env.port, 9001);
        assert_eq!(from_env.board_file, PathBuf::from("boards/hearts.txt"));

        let with_args = Config::resolve(Args {
            port: Some(7777),
            board: None,
            host: None,
        });
        assert_eq!(with_args.port, 7777);

        std::env::set_var("PORT", "not-a-number");
        let bad_port = Config::resolve(no_args());
        assert_eq!(bad_port.port, DEFAULT_PORT);

        std::env::remove_var("PORT");
        std::env::remove_var("BOARD_FILE");
    }
}
