use std::fmt;
use std::io;

use framestream_frame::StreamError;
use framestream_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
/// The peer answered with an application error frame.
pub const REMOTE_ERROR: i32 = 2;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidEndpoint { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn stream_error(context: &str, err: StreamError) -> CliError {
    match err {
        StreamError::Io(source) => io_error(context, source),
        StreamError::Closed | StreamError::Truncated { .. } => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        StreamError::Remote(_) => CliError::new(REMOTE_ERROR, format!("{context}: {err}")),
        StreamError::Json(_) | StreamError::Structured(_) | StreamError::ErrInfo(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ref framing if framing.is_framing() => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framestream_frame::ErrCode;

    #[test]
    fn io_kinds_map_to_exit_codes() {
        let denied = io_error("x", io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(denied.code, PERMISSION_DENIED);

        let timed_out = io_error("x", io::Error::from(io::ErrorKind::WouldBlock));
        assert_eq!(timed_out.code, TIMEOUT);
    }

    #[test]
    fn stream_errors_map_to_exit_codes() {
        assert_eq!(stream_error("recv", StreamError::Closed).code, FAILURE);
        assert_eq!(
            stream_error("recv", StreamError::Remote(ErrCode(9).error("nope"))).code,
            REMOTE_ERROR
        );
        assert_eq!(
            stream_error("recv", StreamError::InvalidLength(0)).code,
            DATA_INVALID
        );
        assert_eq!(
            stream_error("recv", StreamError::EndOfSequence(Default::default())).code,
            INTERNAL
        );
    }

    #[test]
    fn invalid_endpoint_is_usage_error() {
        let err = "unix:".parse::<framestream_transport::Endpoint>().unwrap_err();
        assert_eq!(transport_error("connect", err).code, USAGE);
    }

    #[test]
    fn context_prefixes_message() {
        let err = stream_error("send failed", StreamError::Closed);
        assert_eq!(err.to_string(), "send failed: connection closed");
    }
}
