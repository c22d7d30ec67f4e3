mod cmd;
mod exit;
mod logging;
mod output;

use std::time::Duration;

use clap::Parser;
use framestream_frame::{FrameConfig, DEFAULT_MAX_BODY};

use crate::cmd::{parse_duration, Command};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "framestream", version, about = "Framed message stream CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// Maximum frame body size in bytes (flag + payload).
    #[arg(
        long,
        value_name = "BYTES",
        env = "FRAMESTREAM_MAX_FRAME_SIZE",
        default_value_t = DEFAULT_MAX_BODY,
        global = true
    )]
    max_frame_size: usize,

    /// Read/write timeout on connections (e.g. 5s, 500ms).
    #[arg(long, value_name = "DURATION", value_parser = parse_duration, global = true)]
    timeout: Option<Duration>,

    /// Reject flag bytes other than error/success/end.
    #[arg(long, global = true)]
    strict_flags: bool,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_body_size: self.max_frame_size,
            strict_flags: self.strict_flags,
            read_timeout: self.timeout,
            write_timeout: self.timeout,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let config = cli.frame_config();
    let result = cmd::run(cli.command, format, config);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "framestream",
            "send",
            "/tmp/test.sock",
            "--json",
            "{\"x\":1}",
            "--data",
            "hello",
            "--end-data",
            "bye",
        ])
        .expect("send args should parse");

        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.json, vec!["{\"x\":1}".to_string()]);
                assert_eq!(args.data, vec!["hello".to_string()]);
                assert_eq!(args.end_data.as_deref(), Some("bye"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn error_code_requires_message() {
        let err = Cli::try_parse_from([
            "framestream",
            "send",
            "/tmp/test.sock",
            "--error-code",
            "404",
        ])
        .expect_err("missing --error-msg should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rejects_bad_endpoint() {
        let err = Cli::try_parse_from(["framestream", "listen", "tcp:nohost"])
            .expect_err("tcp endpoint without port should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn global_options_build_frame_config() {
        let cli = Cli::try_parse_from([
            "framestream",
            "listen",
            "unix:/tmp/test.sock",
            "--max-frame-size",
            "1024",
            "--timeout",
            "250ms",
            "--strict-flags",
        ])
        .expect("listen args should parse");

        let config = cli.frame_config();
        assert_eq!(config.max_body_size, 1024);
        assert!(config.strict_flags);
        assert_eq!(config.read_timeout, Some(Duration::from_millis(250)));
        assert_eq!(config.write_timeout, Some(Duration::from_millis(250)));
    }
}
