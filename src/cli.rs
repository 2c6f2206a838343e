//! Command line interface for the `flowframe` replay binary.
//!
//! Kept free of library imports so `build.rs` can render the man page from
//! the same definition.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// Command line arguments for the `flowframe` binary.
#[derive(Debug, Parser)]
#[command(
    name = "flowframe",
    version,
    about = "Replay request/response transcripts through the flowframe analyzer"
)]
pub struct Cli {
    /// Increase log verbosity; repeat for more detail. `RUST_LOG` takes
    /// precedence.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Analyzer configuration file in TOML.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands understood by the binary.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replay a transcript and print one JSON event per line.
    ///
    /// Each transcript line reads `<flow> <c|s> <millis> <payload>`, where
    /// `c` marks client-to-server bytes and the payload accepts `\n`, `\r`,
    /// `\t`, `\\` and `\xHH` escapes. `<flow> end <millis>` closes a flow.
    /// Blank lines and lines starting with `#` are ignored.
    Replay {
        /// Transcript file; `-` reads standard input.
        transcript: PathBuf,

        /// Include request content in events.
        #[arg(long)]
        send_request: bool,

        /// Include response content in events.
        #[arg(long)]
        send_response: bool,

        /// Pretty-print each event.
        #[arg(long)]
        pretty: bool,
    },

    /// Print the effective configuration as TOML.
    Config,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn parses_replay_with_flags() {
        let cli = Cli::parse_from([
            "flowframe",
            "-vv",
            "replay",
            "capture.txt",
            "--send-request",
            "--config",
            "flowframe.toml",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(
            cli.config.as_deref().and_then(|p| p.to_str()),
            Some("flowframe.toml")
        );
        let Command::Replay {
            transcript,
            send_request,
            send_response,
            pretty,
        } = cli.command
        else {
            panic!("expected replay subcommand");
        };
        assert_eq!(transcript.to_str(), Some("capture.txt"));
        assert!(send_request);
        assert!(!send_response);
        assert!(!pretty);
    }

    #[test]
    fn parses_config_subcommand() {
        let cli = Cli::parse_from(["flowframe", "config"]);
        assert!(matches!(cli.command, Command::Config));
        assert!(cli.config.is_none());
    }
}
