use std::fs;
use std::io::{Read, Write};

use framestream_frame::{ErrInfo, Flag, FrameConfig, Stream};

use crate::cmd::SendArgs;
use crate::exit::{stream_error, transport_error, CliError, CliResult, FAILURE, REMOTE_ERROR, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat, Received};

/// The frames one `send` invocation writes, in order.
#[derive(Debug, Default)]
struct SendPlan {
    json: Vec<serde_json::Value>,
    data: Vec<Vec<u8>>,
    error: Option<ErrInfo>,
    end_data: Vec<u8>,
}

impl SendPlan {
    fn from_args(args: &SendArgs) -> CliResult<Self> {
        let json = args
            .json
            .iter()
            .map(|raw| {
                serde_json::from_str(raw)
                    .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))
            })
            .collect::<CliResult<Vec<serde_json::Value>>>()?;

        let mut data: Vec<Vec<u8>> = args.data.iter().map(|s| s.as_bytes().to_vec()).collect();
        if let Some(path) = &args.file {
            let bytes = fs::read(path).map_err(|err| {
                crate::exit::io_error(&format!("failed reading {}", path.display()), err)
            })?;
            data.push(bytes);
        }

        let error = match (args.error_code, &args.error_msg) {
            (Some(code), Some(msg)) => Some(build_error(code, msg, args.error_data.as_deref())?),
            _ => None,
        };

        Ok(Self {
            json,
            data,
            error,
            end_data: args
                .end_data
                .as_deref()
                .map(|s| s.as_bytes().to_vec())
                .unwrap_or_default(),
        })
    }
}

fn build_error(code: u64, msg: &str, data: Option<&str>) -> CliResult<ErrInfo> {
    let Some(raw) = data else {
        return Ok(ErrInfo::new(code, msg));
    };
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|err| CliError::new(USAGE, format!("--error-data is not valid JSON: {err}")))?;
    ErrInfo::with_data(code, msg, &value)
        .map_err(|err| CliError::new(USAGE, format!("--error-data: {err}")))
}

pub fn run(args: SendArgs, format: OutputFormat, config: FrameConfig) -> CliResult<i32> {
    let plan = SendPlan::from_args(&args)?;

    let conn = args
        .endpoint
        .connect()
        .map_err(|err| transport_error("connect failed", err))?;
    let peer = conn.peer_label();
    let mut stream = Stream::from_connection_with_config(conn, config)
        .map_err(|err| stream_error("connect failed", err))?;

    write_sequence(&mut stream, &plan).map_err(|err| stream_error("send failed", err))?;
    tracing::debug!(
        endpoint = %args.endpoint,
        json = plan.json.len(),
        data = plan.data.len(),
        error = plan.error.is_some(),
        "sequence sent"
    );

    if args.wait {
        return wait_for_replies(&mut stream, &peer, format);
    }
    Ok(SUCCESS)
}

fn write_sequence<R: Read, W: Write>(
    stream: &mut Stream<R, W>,
    plan: &SendPlan,
) -> framestream_frame::Result<()> {
    for value in &plan.json {
        stream.then_json(value);
    }
    for data in &plan.data {
        stream.then_frame(data, Flag::Success);
    }
    if let Some(info) = &plan.error {
        stream.then_error(info);
    }
    stream.then_end_with_data(&plan.end_data).finish()
}

/// Print replies until end-of-sequence. Exits with [`REMOTE_ERROR`] if any
/// reply was an error frame.
fn wait_for_replies<R: Read, W: Write>(
    stream: &mut Stream<R, W>,
    peer: &str,
    format: OutputFormat,
) -> CliResult<i32> {
    let mut saw_error = false;
    loop {
        let msg = Received::from_read(stream.read_frame())
            .map_err(|err| stream_error("receive failed", err))?
            .ok_or_else(|| CliError::new(FAILURE, "peer closed before ending the sequence"))?;

        print_message(&msg, peer, format);
        match msg {
            Received::End(_) => break,
            Received::Error(_) | Received::MalformedError(_) => saw_error = true,
            Received::Success(_) => {}
        }
    }
    Ok(if saw_error { REMOTE_ERROR } else { SUCCESS })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use framestream_frame::{ErrCode, FrameReader, FrameWriter, StreamError};

    use super::*;

    fn plan() -> SendPlan {
        SendPlan {
            json: vec![serde_json::json!({"x": 1})],
            data: vec![b"raw".to_vec()],
            error: Some(ErrCode(404).error("not found")),
            end_data: b"bye".to_vec(),
        }
    }

    #[test]
    fn sequence_is_written_in_order() {
        let mut stream = Stream::new(Cursor::new(Vec::new()), Vec::new());
        write_sequence(&mut stream, &plan()).unwrap();

        let (_, writer) = stream.into_split();
        let mut reader = FrameReader::new(Cursor::new(writer.into_inner()));
        assert_eq!(reader.read_frame().unwrap().as_ref(), br#"{"x":1}"#);
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"raw");
        assert!(ErrCode(404).matches(&reader.read_frame().unwrap_err()));
        assert_eq!(
            reader.read_frame().unwrap_err().into_trailing().unwrap().as_ref(),
            b"bye"
        );
    }

    #[test]
    fn oversized_message_stops_the_sequence() {
        let config = FrameConfig {
            max_body_size: 4,
            ..FrameConfig::default()
        };
        let mut stream = Stream::with_config(Cursor::new(Vec::new()), Vec::new(), config);
        let err = write_sequence(&mut stream, &plan()).unwrap_err();
        assert!(matches!(err, StreamError::FrameTooLarge { .. }));
        assert!(stream.writer().get_ref().is_empty());
    }

    fn replies(build: impl FnOnce(&mut FrameWriter<Vec<u8>>)) -> Stream<Cursor<Vec<u8>>, Vec<u8>> {
        let mut writer = FrameWriter::new(Vec::new());
        build(&mut writer);
        Stream::new(Cursor::new(writer.into_inner()), Vec::new())
    }

    #[test]
    fn wait_stops_at_end_of_sequence() {
        let mut stream = replies(|w| {
            w.then_frame(b"one", Flag::Success).then_end();
        });
        assert_eq!(
            wait_for_replies(&mut stream, "test", OutputFormat::Pretty).unwrap(),
            SUCCESS
        );
    }

    #[test]
    fn wait_reports_remote_errors() {
        let mut stream = replies(|w| {
            w.then_error(&ErrCode(7).error("denied")).then_end();
        });
        assert_eq!(
            wait_for_replies(&mut stream, "test", OutputFormat::Pretty).unwrap(),
            REMOTE_ERROR
        );
    }

    #[test]
    fn wait_fails_when_peer_closes_early() {
        let mut stream = replies(|w| {
            w.then_frame(b"one", Flag::Success);
        });
        let err = wait_for_replies(&mut stream, "test", OutputFormat::Pretty).unwrap_err();
        assert_eq!(err.code, FAILURE);
    }

    #[test]
    fn error_data_must_be_json() {
        assert!(build_error(1, "m", Some("not json")).is_err());
        let info = build_error(1, "m", Some(r#"{"k":"v"}"#)).unwrap();
        assert_eq!(info.raw_data(), Some(br#"{"k":"v"}"#.as_ref()));
    }
}
