use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use framestream_frame::{ErrInfo, Flag, StreamError};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One message read off a stream, classified by its flag.
#[derive(Debug)]
pub enum Received {
    Success(Bytes),
    Error(ErrInfo),
    /// An error frame whose body did not decode as `ErrInfo`.
    MalformedError(Bytes),
    End(Bytes),
}

impl Received {
    /// Classify the outcome of `read_frame`. `Ok(None)` means the peer
    /// closed the connection on a frame boundary.
    pub fn from_read(result: framestream_frame::Result<Bytes>) -> Result<Option<Self>, StreamError> {
        match result {
            Ok(payload) => Ok(Some(Self::Success(payload))),
            Err(StreamError::Remote(info)) => Ok(Some(Self::Error(info))),
            Err(StreamError::MalformedErrorFrame { payload, .. }) => {
                Ok(Some(Self::MalformedError(payload)))
            }
            Err(StreamError::EndOfSequence(trailing)) => Ok(Some(Self::End(trailing))),
            Err(StreamError::Closed) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub fn flag(&self) -> Flag {
        match self {
            Self::Success(_) => Flag::Success,
            Self::Error(_) | Self::MalformedError(_) => Flag::Error,
            Self::End(_) => Flag::End,
        }
    }

    fn payload(&self) -> &[u8] {
        match self {
            Self::Success(p) | Self::MalformedError(p) | Self::End(p) => p,
            Self::Error(info) => info.message().as_bytes(),
        }
    }

    fn summary(&self) -> String {
        match self {
            Self::Error(info) => format!("code={} msg={}", info.code(), info.message()),
            other => payload_preview(other.payload()),
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    kind: &'static str,
    flag: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    msg: Option<&'a str>,
    payload_size: usize,
    payload: String,
    peer: &'a str,
    timestamp: String,
}

pub fn print_message(msg: &Received, peer: &str, format: OutputFormat) {
    let flag = msg.flag();
    match format {
        OutputFormat::Json => {
            let (code, text) = match msg {
                Received::Error(info) => (Some(info.code().0), Some(info.message())),
                _ => (None, None),
            };
            let raw = match msg {
                Received::Error(info) => info.raw_data().unwrap_or_default(),
                other => other.payload(),
            };
            let out = MessageOutput {
                kind: flag.name(),
                flag: flag.as_byte(),
                code,
                msg: text,
                payload_size: raw.len(),
                payload: payload_preview(raw),
                peer,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "SIZE", "PEER", "PAYLOAD"])
                .add_row(vec![
                    flag.name().to_string(),
                    msg.payload().len().to_string(),
                    peer.to_string(),
                    msg.summary(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "kind={} size={} peer={} {}",
                flag.name(),
                msg.payload().len(),
                peer,
                msg.summary()
            );
        }
        OutputFormat::Raw => {
            print_raw(msg.payload());
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
