use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use framestream_frame::FrameConfig;
use framestream_transport::Endpoint;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start an echo server.
    Echo(EchoArgs),
    /// Send a message sequence terminated by an end frame.
    Send(SendArgs),
    /// Listen and print received messages.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, config: FrameConfig) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args, config),
        Command::Send(args) => send::run(args, format, config),
        Command::Listen(args) => listen::run(args, format, config),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Endpoint to bind (`unix:PATH`, `tcp:HOST:PORT`, or a socket path).
    pub endpoint: Endpoint,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Endpoint to connect to (`unix:PATH`, `tcp:HOST:PORT`, or a socket path).
    pub endpoint: Endpoint,
    /// JSON message, sent as a success frame. Repeatable.
    #[arg(long, value_name = "JSON")]
    pub json: Vec<String>,
    /// Raw string message, sent as a success frame after any JSON messages. Repeatable.
    #[arg(long, value_name = "TEXT")]
    pub data: Vec<String>,
    /// Read one success message from a file.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
    /// Append an error frame with this code.
    #[arg(long, value_name = "CODE", requires = "error_msg")]
    pub error_code: Option<u64>,
    /// Message for the appended error frame.
    #[arg(long, value_name = "MSG", requires = "error_code")]
    pub error_msg: Option<String>,
    /// JSON detail data for the appended error frame.
    #[arg(long, value_name = "JSON", requires = "error_code")]
    pub error_data: Option<String>,
    /// Trailing data carried by the closing end frame.
    #[arg(long, value_name = "TEXT")]
    pub end_data: Option<String>,
    /// Print replies until the peer ends the sequence.
    #[arg(long)]
    pub wait: bool,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Endpoint to bind (`unix:PATH`, `tcp:HOST:PORT`, or a socket path).
    pub endpoint: Endpoint,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `5s`, `500ms`, or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

fn install_ctrlc_handler() -> CliResult<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })?;
    Ok(running)
}
