use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use serde::Serialize;
use tracing::{debug, trace};

use crate::codec::{encode_frame, FrameConfig};
use crate::errinfo::ErrInfo;
use crate::error::{Result, StreamError};
use crate::flag::Flag;
use crate::structured::StructuredMessage;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Anything that can emit whole frames.
///
/// Implemented by [`FrameWriter`] and `Stream`, so helpers such as
/// [`ErrInfo::write_to`] work with either.
pub trait FrameSink {
    /// Write one frame and flush it.
    fn write_frame(&mut self, payload: &[u8], flag: Flag) -> Result<()>;

    /// Marshal `info` and write it as an error frame.
    fn write_error(&mut self, info: &ErrInfo) -> Result<()> {
        let body = info.marshal()?;
        self.write_frame(&body, Flag::Error)
    }
}

/// Writes frames to any `Write` sink, usually a `BufWriter`.
///
/// Besides the plain `write_*` methods, the writer offers chained `then_*`
/// variants. A chained write is skipped entirely once an earlier chained
/// write has failed; [`finish`](Self::finish) reports that first failure.
///
/// If the sink fails after part of a frame has gone out, the remainder is
/// kept and sent before anything else on the next write or flush, so the
/// peer never sees a torn frame followed by a new one.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    sent: usize,
    config: FrameConfig,
    latched: Option<StreamError>,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            sent: 0,
            config,
            latched: None,
        }
    }

    /// Write one frame: length prefix, flag, payload, then flush (blocking).
    ///
    /// End-of-file on the sink (a zero-length write) is reported as
    /// [`StreamError::Closed`]; every other failure as [`StreamError::Io`].
    /// A frame left half-written by an earlier failure is completed first;
    /// if that fails, this frame is not attempted.
    pub fn write_frame(&mut self, payload: &[u8], flag: Flag) -> Result<()> {
        self.drain_pending()?;

        let body_len = payload.len() + 1;
        if body_len > self.config.max_body_size {
            return Err(StreamError::FrameTooLarge {
                size: body_len as u64,
                max: self.config.max_body_size,
            });
        }

        self.buf.clear();
        self.sent = 0;
        encode_frame(flag.as_byte(), payload, &mut self.buf)?;

        if let Err(err) = self.drain() {
            if self.sent == 0 {
                self.buf.clear();
            } else {
                debug!(
                    sent = self.sent,
                    total = self.buf.len(),
                    error = %err,
                    "frame write stopped partway, remainder goes out first next time"
                );
            }
            return Err(err);
        }

        self.flush()?;
        trace!(flag = flag.as_byte(), size = payload.len(), "wrote frame");
        Ok(())
    }

    /// True if an earlier write stopped partway through a frame.
    pub fn is_mid_frame(&self) -> bool {
        self.sent < self.buf.len()
    }

    fn drain_pending(&mut self) -> Result<()> {
        if !self.is_mid_frame() {
            return Ok(());
        }
        let remaining = self.buf.len() - self.sent;
        self.drain()?;
        debug!(remaining, "completed half-written frame");
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        while self.sent < self.buf.len() {
            match self.inner.write(&self.buf[self.sent..]) {
                Ok(0) => return Err(StreamError::Closed),
                Ok(n) => self.sent += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(classify_write_error(err)),
            }
        }
        Ok(())
    }

    /// Serialize `value` as JSON and write it as a success frame.
    pub fn write_json<V: Serialize + ?Sized>(&mut self, value: &V) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.write_frame(&payload, Flag::Success)
    }

    /// Encode `msg` with its structured-binary codec and write it as a success frame.
    pub fn write_structured<M: StructuredMessage>(&mut self, msg: &M) -> Result<()> {
        let payload = msg.encode_structured()?;
        self.write_frame(&payload, Flag::Success)
    }

    /// Marshal `info` and write it as an error frame.
    pub fn write_error(&mut self, info: &ErrInfo) -> Result<()> {
        FrameSink::write_error(self, info)
    }

    /// Write an empty end-of-sequence frame.
    pub fn write_end(&mut self) -> Result<()> {
        self.write_end_with_data(&[])
    }

    /// Write an end-of-sequence frame carrying trailing bytes.
    pub fn write_end_with_data(&mut self, data: &[u8]) -> Result<()> {
        self.write_frame(data, Flag::End)
    }

    /// Flush the underlying sink, completing any half-written frame first.
    pub fn flush(&mut self) -> Result<()> {
        self.drain_pending()?;
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(classify_write_error(err)),
            }
        }
    }

    /// Run `op` unless a previous chained write failed; latch its failure.
    fn chain(&mut self, op: impl FnOnce(&mut Self) -> Result<()>) -> &mut Self {
        if let Some(err) = &self.latched {
            debug!(error = %err, "skipping chained write after earlier failure");
            return self;
        }
        if let Err(err) = op(self) {
            self.latched = Some(err);
        }
        self
    }

    /// Chained [`write_frame`](Self::write_frame).
    pub fn then_frame(&mut self, payload: &[u8], flag: Flag) -> &mut Self {
        self.chain(|w| w.write_frame(payload, flag))
    }

    /// Chained [`write_json`](Self::write_json).
    pub fn then_json<V: Serialize + ?Sized>(&mut self, value: &V) -> &mut Self {
        self.chain(|w| w.write_json(value))
    }

    /// Chained [`write_structured`](Self::write_structured).
    pub fn then_structured<M: StructuredMessage>(&mut self, msg: &M) -> &mut Self {
        self.chain(|w| w.write_structured(msg))
    }

    /// Chained [`write_error`](Self::write_error).
    pub fn then_error(&mut self, info: &ErrInfo) -> &mut Self {
        self.chain(|w| w.write_error(info))
    }

    /// Chained [`write_end`](Self::write_end).
    pub fn then_end(&mut self) -> &mut Self {
        self.chain(|w| w.write_end())
    }

    /// Chained [`write_end_with_data`](Self::write_end_with_data).
    pub fn then_end_with_data(&mut self, data: &[u8]) -> &mut Self {
        self.chain(|w| w.write_end_with_data(data))
    }

    /// The first failure of the current chain, if any.
    pub fn error(&self) -> Option<&StreamError> {
        self.latched.as_ref()
    }

    /// Take the first failure of the current chain, clearing the latch so
    /// a new chain can start.
    pub fn finish(&mut self) -> Result<()> {
        match self.latched.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying sink.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner sink.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Update maximum body size for subsequent writes.
    pub fn set_max_body_size(&mut self, max_body_size: usize) {
        self.config.max_body_size = max_body_size;
    }
}

impl<T: Write> FrameSink for FrameWriter<T> {
    fn write_frame(&mut self, payload: &[u8], flag: Flag) -> Result<()> {
        FrameWriter::write_frame(self, payload, flag)
    }
}

fn classify_write_error(err: std::io::Error) -> StreamError {
    match err.kind() {
        ErrorKind::WriteZero | ErrorKind::UnexpectedEof => StreamError::Closed,
        _ => StreamError::Io(err),
    }
}
