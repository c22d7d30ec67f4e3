use std::io::{BufReader, BufWriter, Read, Write};

use bytes::Bytes;
use framestream_transport::{Connection, TransportError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::codec::{Frame, FrameConfig};
use crate::errinfo::ErrInfo;
use crate::error::{Result, StreamError};
use crate::flag::Flag;
use crate::reader::FrameReader;
use crate::structured::StructuredMessage;
use crate::writer::{FrameSink, FrameWriter};

/// A `Stream` over a buffered [`Connection`].
pub type ConnectionStream = Stream<BufReader<Connection>, BufWriter<Connection>>;

/// A framed, duplex message stream.
///
/// Owns a read half and a write half plus the latched error of the current
/// write chain. All operations take `&mut self`; to drive reads and writes
/// from different threads, split it with [`into_split`](Self::into_split).
pub struct Stream<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
}

impl<R: Read, W: Write> Stream<R, W> {
    /// Build a stream from pre-established (ideally buffered) halves.
    pub fn new(reader: R, writer: W) -> Self {
        Self::with_config(reader, writer, FrameConfig::default())
    }

    /// Build a stream from halves with explicit configuration.
    pub fn with_config(reader: R, writer: W, config: FrameConfig) -> Self {
        Self {
            reader: FrameReader::with_config(reader, config.clone()),
            writer: FrameWriter::with_config(writer, config),
        }
    }

    /// Reassemble a stream from halves returned by [`into_split`](Self::into_split).
    pub fn from_parts(reader: FrameReader<R>, writer: FrameWriter<W>) -> Self {
        Self { reader, writer }
    }

    /// Split into independently owned read and write halves. Any latched
    /// chain error stays with the write half.
    pub fn into_split(self) -> (FrameReader<R>, FrameWriter<W>) {
        (self.reader, self.writer)
    }

    /// Write one frame: length prefix, flag, payload, flush.
    pub fn write_frame(&mut self, payload: &[u8], flag: Flag) -> Result<()> {
        self.writer.write_frame(payload, flag)
    }

    /// Read the next frame and dispatch on its flag.
    ///
    /// Success frames yield their payload. Error frames yield
    /// [`StreamError::Remote`]; end frames yield
    /// [`StreamError::EndOfSequence`] with the trailing bytes.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        self.reader.read_frame()
    }

    /// Read the next frame without dispatching on its flag.
    pub fn read_raw(&mut self) -> Result<Frame> {
        self.reader.read_raw()
    }

    pub fn write_json<V: Serialize + ?Sized>(&mut self, value: &V) -> Result<()> {
        self.writer.write_json(value)
    }

    pub fn read_json<V: DeserializeOwned>(&mut self) -> Result<V> {
        self.reader.read_json()
    }

    pub fn write_structured<M: StructuredMessage>(&mut self, msg: &M) -> Result<()> {
        self.writer.write_structured(msg)
    }

    pub fn read_structured<M: StructuredMessage>(&mut self) -> Result<M> {
        self.reader.read_structured()
    }

    pub fn write_error(&mut self, info: &ErrInfo) -> Result<()> {
        self.writer.write_error(info)
    }

    pub fn write_end(&mut self) -> Result<()> {
        self.writer.write_end()
    }

    pub fn write_end_with_data(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_end_with_data(data)
    }

    pub fn then_frame(&mut self, payload: &[u8], flag: Flag) -> &mut Self {
        self.writer.then_frame(payload, flag);
        self
    }

    pub fn then_json<V: Serialize + ?Sized>(&mut self, value: &V) -> &mut Self {
        self.writer.then_json(value);
        self
    }

    pub fn then_structured<M: StructuredMessage>(&mut self, msg: &M) -> &mut Self {
        self.writer.then_structured(msg);
        self
    }

    pub fn then_error(&mut self, info: &ErrInfo) -> &mut Self {
        self.writer.then_error(info);
        self
    }

    pub fn then_end(&mut self) -> &mut Self {
        self.writer.then_end();
        self
    }

    pub fn then_end_with_data(&mut self, data: &[u8]) -> &mut Self {
        self.writer.then_end_with_data(data);
        self
    }

    /// The latched error of the current write chain, if any.
    pub fn error(&self) -> Option<&StreamError> {
        self.writer.error()
    }

    /// Take the latched error of the current write chain.
    pub fn finish(&mut self) -> Result<()> {
        self.writer.finish()
    }

    pub fn reader(&self) -> &FrameReader<R> {
        &self.reader
    }

    pub fn reader_mut(&mut self) -> &mut FrameReader<R> {
        &mut self.reader
    }

    pub fn writer(&self) -> &FrameWriter<W> {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut FrameWriter<W> {
        &mut self.writer
    }
}

impl<T: Read, U: Write> Stream<BufReader<T>, BufWriter<U>> {
    /// Wrap raw read and write handles in buffering.
    pub fn buffered(read: T, write: U, config: FrameConfig) -> Self {
        Self::with_config(BufReader::new(read), BufWriter::new(write), config)
    }
}

impl ConnectionStream {
    /// Build a buffered stream over a raw connection.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        Self::from_connection_with_config(conn, FrameConfig::default())
    }

    /// Build a buffered stream over a raw connection, applying the
    /// configured timeouts to it.
    ///
    /// The connection handle is cloned so each direction owns one.
    pub fn from_connection_with_config(conn: Connection, config: FrameConfig) -> Result<Self> {
        conn.set_read_timeout(config.read_timeout)
            .map_err(transport_to_stream_error)?;
        conn.set_write_timeout(config.write_timeout)
            .map_err(transport_to_stream_error)?;
        let write_half = conn.try_clone().map_err(transport_to_stream_error)?;
        debug!(transport = conn.transport_name(), "stream opened over connection");
        Ok(Self::buffered(conn, write_half, config))
    }
}

impl<R: Read, W: Write> FrameSink for Stream<R, W> {
    fn write_frame(&mut self, payload: &[u8], flag: Flag) -> Result<()> {
        self.writer.write_frame(payload, flag)
    }
}

fn transport_to_stream_error(err: TransportError) -> StreamError {
    match err {
        TransportError::Io(io) | TransportError::Accept(io) => StreamError::Io(io),
        TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
            StreamError::Io(source)
        }
        other => StreamError::Io(std::io::Error::other(other.to_string())),
    }
}
