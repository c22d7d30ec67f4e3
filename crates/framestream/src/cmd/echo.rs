use std::io::{Read, Write};
use std::sync::atomic::Ordering;

use framestream_frame::{Flag, FrameConfig, Stream, StreamError};

use crate::cmd::{install_ctrlc_handler, EchoArgs};
use crate::exit::{stream_error, transport_error, CliResult, SUCCESS};
use crate::output::Received;

enum Disposition {
    Reply(Received),
    EndSession,
}

pub fn run(args: EchoArgs, config: FrameConfig) -> CliResult<i32> {
    let listener = args
        .endpoint
        .bind()
        .map_err(|err| transport_error("bind failed", err))?;
    tracing::info!(endpoint = %listener.local_endpoint(), "echo server listening");

    let running = install_ctrlc_handler()?;

    while running.load(Ordering::SeqCst) {
        let conn = listener
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        let peer = conn.peer_label();
        let mut stream = Stream::from_connection_with_config(conn, config.clone())
            .map_err(|err| stream_error("session setup failed", err))?;

        while running.load(Ordering::SeqCst) {
            let msg = match classify(stream.read_frame()) {
                Disposition::Reply(msg) => msg,
                Disposition::EndSession => break,
            };

            tracing::info!(peer = %peer, kind = msg.flag().name(), "echoing message");

            if let Err(err) = reply(&mut stream, &msg) {
                tracing::warn!(peer = %peer, error = %err, "echo send failed");
                break;
            }
        }
    }

    Ok(SUCCESS)
}

/// Decide what to do with one read. Read faults end the session; the
/// server keeps accepting.
fn classify(result: framestream_frame::Result<bytes::Bytes>) -> Disposition {
    match Received::from_read(result) {
        Ok(Some(msg)) => Disposition::Reply(msg),
        Ok(None) => Disposition::EndSession,
        Err(err) => {
            log_session_fault(&err);
            Disposition::EndSession
        }
    }
}

fn log_session_fault(err: &StreamError) {
    if err.is_framing() {
        tracing::warn!(error = %err, "dropping session after framing fault");
    } else {
        tracing::debug!(error = %err, "session ended");
    }
}

/// Mirror a message: success and error frames go back unchanged, an end
/// frame is answered with an end frame carrying the same trailing bytes.
fn reply<R: Read, W: Write>(stream: &mut Stream<R, W>, msg: &Received) -> framestream_frame::Result<()> {
    match msg {
        Received::Success(payload) => stream.write_frame(payload, Flag::Success),
        Received::Error(info) => stream.write_error(info),
        Received::MalformedError(payload) => stream.write_frame(payload, Flag::Error),
        Received::End(trailing) => stream.write_end_with_data(trailing),
    }
}
