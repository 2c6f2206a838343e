//! Replay binary for `flowframe`.
//!
//! Feeds a transcript through the analyzer and prints every published
//! transaction as a JSON line on standard output. Diagnostics go to standard
//! error.

mod cli;

use std::{
    fs::{self, File},
    io::{self, BufRead, BufReader, Write},
    path::Path,
    process::ExitCode,
    sync::Arc,
};

use clap::Parser;
use cli::{Cli, Command};
use flowframe::{Analyzer, AnalyzerConfig, Event, EventSink, Replayer};
use tracing_subscriber::EnvFilter;

type BoxError = Box<dyn std::error::Error>;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "flowframe failed");
            eprintln!("flowframe: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), BoxError> {
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Config => {
            config.validate()?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        Command::Replay {
            transcript,
            send_request,
            send_response,
            pretty,
        } => {
            config.send_request |= send_request;
            config.send_response |= send_response;
            replay(&config, &transcript, pretty)?;
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<AnalyzerConfig, BoxError> {
    let Some(path) = path else {
        return Ok(AnalyzerConfig::default());
    };
    let text = fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    let config = toml::from_str(&text)?;
    tracing::info!(path = %path.display(), "loaded configuration");
    Ok(config)
}

fn replay(config: &AnalyzerConfig, transcript: &Path, pretty: bool) -> Result<(), BoxError> {
    let sink: Arc<dyn EventSink> = Arc::new(move |event: Event| print_event(&event, pretty));
    let analyzer = Analyzer::new(config, Some(sink))?;
    let mut replayer = Replayer::new(analyzer);

    let reader: Box<dyn BufRead> = if transcript == Path::new("-") {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(File::open(transcript).map_err(|err| {
            format!("failed to open {}: {err}", transcript.display())
        })?))
    };

    let result = replayer.run(reader);
    replayer.finish();
    let records = result?;

    tracing::info!(records, dropped = replayer.dropped(), "replay finished");
    Ok(())
}

fn print_event(event: &Event, pretty: bool) {
    let rendered = if pretty {
        serde_json::to_string_pretty(event)
    } else {
        serde_json::to_string(event)
    };
    let written = rendered
        .map_err(io::Error::from)
        .and_then(|line| writeln!(io::stdout().lock(), "{line}"));
    if let Err(err) = written {
        log::warn!("failed to write event: {err}");
    }
}
