use std::sync::atomic::Ordering;

use framestream_frame::{FrameConfig, Stream};

use crate::cmd::{install_ctrlc_handler, ListenArgs};
use crate::exit::{stream_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat, Received};

pub fn run(args: ListenArgs, format: OutputFormat, config: FrameConfig) -> CliResult<i32> {
    let listener = args
        .endpoint
        .bind()
        .map_err(|err| transport_error("bind failed", err))?;
    tracing::info!(endpoint = %listener.local_endpoint(), "listening");

    let running = install_ctrlc_handler()?;
    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let conn = listener
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        let peer = conn.peer_label();
        let mut stream = Stream::from_connection_with_config(conn, config.clone())
            .map_err(|err| stream_error("session setup failed", err))?;
        tracing::debug!(peer = %peer, "session started");

        while running.load(Ordering::SeqCst) {
            let msg = match Received::from_read(stream.read_frame()) {
                Ok(Some(msg)) => msg,
                Ok(None) => break,
                Err(err) if err.is_closed() => {
                    tracing::warn!(peer = %peer, error = %err, "session ended mid-frame");
                    break;
                }
                Err(err) => return Err(stream_error("receive failed", err)),
            };

            print_message(&msg, &peer, format);
            printed = printed.saturating_add(1);

            if let Some(count) = args.count {
                if printed >= count {
                    return Ok(SUCCESS);
                }
            }
        }
    }

    Ok(SUCCESS)
}
