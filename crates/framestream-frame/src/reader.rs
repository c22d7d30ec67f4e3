use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use crate::codec::{check_body_len, decode_body_len, Frame, FrameConfig, LENGTH_PREFIX_SIZE};
use crate::errinfo::ErrInfo;
use crate::error::{Result, StreamError};
use crate::flag::{Flag, END};
use crate::structured::StructuredMessage;

/// Reads frames from any `Read` source, usually a `BufReader`.
///
/// Every read is a strict fixed-count loop: short reads are retried until the
/// requested byte count arrives or the source fails. If the source fails with
/// an I/O error partway through a frame (a read timeout, for instance), the
/// bytes already received are kept and the next read resumes that frame.
pub struct FrameReader<T> {
    inner: T,
    config: FrameConfig,
    partial: Partial,
}

/// Progress on the frame currently being read.
#[derive(Default)]
struct Partial {
    prefix: [u8; LENGTH_PREFIX_SIZE],
    prefix_filled: usize,
    in_body: bool,
    body: BytesMut,
    body_filled: usize,
}

impl Partial {
    fn is_started(&self) -> bool {
        self.prefix_filled > 0
    }
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            config,
            partial: Partial::default(),
        }
    }

    /// Read the next frame without interpreting its flag (blocking).
    ///
    /// Returns [`StreamError::Closed`] when the source is at end-of-file before
    /// the first byte of a frame, and [`StreamError::Truncated`] when it ends
    /// partway through one.
    pub fn read_raw(&mut self) -> Result<Frame> {
        let max_body = self.config.max_body_size;
        let partial = &mut self.partial;

        if !partial.in_body {
            let prefix = fill(&mut self.inner, &mut partial.prefix, &mut partial.prefix_filled);
            if let Err(short) = prefix {
                return Err(match short {
                    Short::Eof if partial.prefix_filled == 0 => StreamError::Closed,
                    short => short.into_error(LENGTH_PREFIX_SIZE, partial.prefix_filled),
                });
            }

            let checked = decode_body_len(&partial.prefix)
                .and_then(|len| check_body_len(len, max_body));
            let body_len = match checked {
                Ok(body_len) => body_len,
                Err(err) => {
                    *partial = Partial::default();
                    return Err(err);
                }
            };
            partial.body = BytesMut::zeroed(body_len);
            partial.body_filled = 0;
            partial.in_body = true;
        }

        let expected = partial.body.len();
        if let Err(short) = fill(&mut self.inner, &mut partial.body[..], &mut partial.body_filled) {
            return Err(short.into_error(expected, partial.body_filled));
        }

        let mut body = std::mem::take(&mut partial.body);
        *partial = Partial::default();

        let flag_byte = body[0];
        let payload = body.split_off(1).freeze();
        trace!(flag = flag_byte, size = payload.len(), "read frame");

        Ok(Frame { flag_byte, payload })
    }

    /// True if an earlier read stopped partway through a frame; the next
    /// read continues it.
    pub fn is_mid_frame(&self) -> bool {
        self.partial.is_started()
    }

    /// Read the next frame and dispatch on its flag (blocking).
    ///
    /// - success: `Ok(payload)`
    /// - error: `Err(StreamError::Remote(info))`, or
    ///   `Err(StreamError::MalformedErrorFrame { .. })` if the body is not an `ErrInfo`
    /// - anything else: `Err(StreamError::EndOfSequence(trailing))`
    pub fn read_frame(&mut self) -> Result<Bytes> {
        let frame = self.read_raw()?;
        match frame.flag() {
            Flag::Success => Ok(frame.payload),
            Flag::Error => match ErrInfo::unmarshal(&frame.payload) {
                Ok(info) => {
                    debug!(code = %info.code(), "peer reported error");
                    Err(StreamError::Remote(info))
                }
                Err(source) => {
                    warn!(size = frame.payload.len(), error = %source, "undecodable error frame");
                    Err(StreamError::MalformedErrorFrame {
                        payload: frame.payload,
                        source,
                    })
                }
            },
            Flag::End => {
                if self.config.strict_flags && frame.flag_byte != END {
                    return Err(StreamError::UnknownFlag(frame.flag_byte));
                }
                debug!(trailing = frame.payload.len(), "end of sequence");
                Err(StreamError::EndOfSequence(frame.payload))
            }
        }
    }

    /// Read a success frame and decode it as JSON.
    pub fn read_json<V: DeserializeOwned>(&mut self) -> Result<V> {
        let payload = self.read_frame()?;
        Ok(serde_json::from_slice(&payload)?)
    }

    /// Read a success frame and decode it with its structured-binary codec.
    pub fn read_structured<M: StructuredMessage>(&mut self) -> Result<M> {
        let payload = self.read_frame()?;
        Ok(M::decode_structured(&payload)?)
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying source.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner source.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Update maximum body size for subsequent reads.
    pub fn set_max_body_size(&mut self, max_body_size: usize) {
        self.config.max_body_size = max_body_size;
    }
}

/// Fill `buf[*filled..]`, recording progress in `filled` so an interrupted
/// fill can be resumed.
fn fill<R: Read>(
    inner: &mut R,
    buf: &mut [u8],
    filled: &mut usize,
) -> std::result::Result<(), Short> {
    while *filled < buf.len() {
        match inner.read(&mut buf[*filled..]) {
            Ok(0) => return Err(Short::Eof),
            Ok(n) => *filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Err(Short::Eof),
            Err(err) => {
                if *filled > 0 {
                    debug!(
                        received = *filled,
                        wanted = buf.len(),
                        error = %err,
                        "read stopped mid-frame, keeping progress"
                    );
                }
                return Err(Short::Io(err));
            }
        }
    }
    Ok(())
}

/// Why a fixed-count read stopped early.
enum Short {
    Eof,
    Io(std::io::Error),
}

impl Short {
    fn into_error(self, expected: usize, received: usize) -> StreamError {
        match self {
            Short::Eof => StreamError::Truncated { expected, received },
            Short::Io(err) => StreamError::Io(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::codec::encode_frame;
    use crate::errinfo::ErrCode;
    use crate::flag::{ERROR, SUCCESS};

    fn wire(frames: &[(u8, &[u8])]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for (flag, payload) in frames {
            encode_frame(*flag, payload, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn success_frame_yields_payload() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[(SUCCESS, b"hello")])));
        assert_eq!(reader.read_frame().unwrap().as_ref(), b"hello");
    }

    #[test]
    fn empty_success_payload() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[(SUCCESS, b"")])));
        assert!(reader.read_frame().unwrap().is_empty());
    }

    #[test]
    fn error_frame_yields_remote_err_info() {
        let body = ErrCode(7).error("x").marshal().unwrap();
        let mut reader = FrameReader::new(Cursor::new(wire(&[(ERROR, &body)])));

        let err = reader.read_frame().unwrap_err();
        let info = err.remote().expect("remote error");
        assert_eq!(info.code(), ErrCode(7));
        assert_eq!(info.message(), "x");
        assert!(ErrCode(7).matches(&err));
    }

    #[test]
    fn undecodable_error_frame_keeps_raw_payload() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[(ERROR, b"<html>oops")])));

        match reader.read_frame().unwrap_err() {
            StreamError::MalformedErrorFrame { payload, .. } => {
                assert_eq!(payload.as_ref(), b"<html>oops");
            }
            other => panic!("expected malformed error frame, got {other:?}"),
        }
    }

    #[test]
    fn sparse_error_frame_is_still_remote() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[
            (ERROR, br#"{"Code":5}"#),
            (ERROR, br#"{"code":6,"msg":"lower"}"#),
        ])));

        assert!(ErrCode(5).matches(&reader.read_frame().unwrap_err()));
        let err = reader.read_frame().unwrap_err();
        assert_eq!(err.remote().unwrap().message(), "lower");
        assert!(ErrCode(6).matches(&err));
    }

    #[test]
    fn end_frame_yields_trailing_bytes() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[(END, b"trailer")])));
        let err = reader.read_frame().unwrap_err();
        assert!(err.is_end_of_sequence());
        assert_eq!(err.into_trailing().unwrap().as_ref(), b"trailer");
    }

    #[test]
    fn any_unreserved_flag_is_end_of_sequence() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[(0x09, b""), (0xFF, b"z")])));

        let first = reader.read_frame().unwrap_err().into_trailing().unwrap();
        assert!(first.is_empty());
        let second = reader.read_frame().unwrap_err().into_trailing().unwrap();
        assert_eq!(second.as_ref(), b"z");
    }

    #[test]
    fn strict_flags_reject_unreserved_values() {
        let cfg = FrameConfig {
            strict_flags: true,
            ..FrameConfig::default()
        };
        let mut reader =
            FrameReader::with_config(Cursor::new(wire(&[(END, b""), (0x09, b"")])), cfg);

        assert!(reader.read_frame().unwrap_err().is_end_of_sequence());
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            StreamError::UnknownFlag(0x09)
        ));
    }

    #[test]
    fn read_raw_keeps_the_flag_byte() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[(0x42, b"raw")])));
        let frame = reader.read_raw().unwrap();
        assert_eq!(frame.flag_byte, 0x42);
        assert_eq!(frame.payload.as_ref(), b"raw");
    }

    #[test]
    fn read_json_decodes_payload() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[(SUCCESS, br#"{"x":1}"#)])));
        let value: serde_json::Value = reader.read_json().unwrap();
        assert_eq!(value["x"], 1);
    }

    #[test]
    fn read_json_reports_decode_failure() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[(SUCCESS, b"not json")])));
        let err = reader.read_json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, StreamError::Json(_)));
    }

    #[test]
    fn byte_at_a_time_delivery() {
        let payload = vec![0xAB; 300];
        let byte_reader = ByteByByteReader {
            bytes: wire(&[(SUCCESS, &payload), (END, b"done")]),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        assert_eq!(reader.read_frame().unwrap().as_ref(), payload.as_slice());
        assert_eq!(
            reader.read_frame().unwrap_err().into_trailing().unwrap().as_ref(),
            b"done"
        );
    }

    #[test]
    fn large_payload() {
        let payload = vec![0x5A; 256 * 1024];
        let mut reader = FrameReader::new(Cursor::new(wire(&[(SUCCESS, &payload)])));
        assert_eq!(reader.read_frame().unwrap().len(), payload.len());
    }

    #[test]
    fn closed_on_frame_boundary() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[(SUCCESS, b"only")])));
        reader.read_frame().unwrap();

        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, StreamError::Closed));
        assert!(err.is_closed());
    }

    #[test]
    fn closed_inside_length_prefix() {
        let mut reader = FrameReader::new(Cursor::new(vec![0u8, 0, 0]));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            StreamError::Truncated {
                expected: 8,
                received: 3
            }
        ));
        assert!(err.is_closed());
    }

    #[test]
    fn closed_inside_body() {
        let mut partial = BytesMut::new();
        partial.put_i64(17);
        partial.put_u8(SUCCESS);
        partial.put_slice(b"only-part");

        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            StreamError::Truncated {
                expected: 17,
                received: 10
            }
        ));
    }

    #[test]
    fn zero_length_prefix_is_framing_fault() {
        let mut reader = FrameReader::new(Cursor::new(vec![0u8; 8]));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, StreamError::InvalidLength(0)));
        assert!(err.is_framing());
    }

    #[test]
    fn oversized_frame_rejected_before_allocation() {
        let mut prefix = BytesMut::new();
        prefix.put_i64(i64::MAX);

        let cfg = FrameConfig {
            max_body_size: 1024,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(prefix.to_vec()), cfg);
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            StreamError::FrameTooLarge { max: 1024, .. }
        ));
    }

    #[test]
    fn set_max_body_size_applies_to_next_read() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[(SUCCESS, b"0123456789")])));
        reader.set_max_body_size(4);
        assert_eq!(reader.config().max_body_size, 4);
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            StreamError::FrameTooLarge { size: 11, max: 4 }
        ));
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(wire(&[(SUCCESS, b"ok")])),
        };
        let mut framed = FrameReader::new(reader);
        assert_eq!(framed.read_frame().unwrap().as_ref(), b"ok");
    }

    #[test]
    fn would_block_propagates_io_error() {
        let mut framed = FrameReader::new(WouldBlockReader);
        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, StreamError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    #[cfg(unix)]
    fn frames_cross_a_socket_pair_from_another_thread() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let reader = Arc::new(Mutex::new(FrameReader::new(std::io::BufReader::new(right))));

        let reader_thread = {
            let reader = Arc::clone(&reader);
            std::thread::spawn(move || {
                let mut reader = reader.lock().unwrap();
                for expected in 0..32u32 {
                    let msg: u32 = reader.read_json().unwrap();
                    assert_eq!(msg, expected);
                }
                assert!(reader.read_frame().unwrap_err().is_end_of_sequence());
            })
        };

        let mut writer = crate::writer::FrameWriter::new(std::io::BufWriter::new(left));
        for i in 0..32u32 {
            writer.write_json(&i).unwrap();
        }
        writer.write_end().unwrap();

        reader_thread.join().unwrap();
    }

    #[test]
    fn io_error_mid_body_resumes_on_next_read() {
        let bytes = wire(&[(SUCCESS, b"hello-world"), (SUCCESS, b"next")]);
        let mut framed = FrameReader::new(StallOnce {
            inner: Cursor::new(bytes),
            stall_at: 12,
            stalled: false,
        });

        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, StreamError::Io(ref e) if e.kind() == ErrorKind::WouldBlock));
        assert!(framed.is_mid_frame());

        assert_eq!(framed.read_frame().unwrap().as_ref(), b"hello-world");
        assert!(!framed.is_mid_frame());
        assert_eq!(framed.read_frame().unwrap().as_ref(), b"next");
    }

    #[test]
    fn io_error_mid_prefix_resumes_on_next_read() {
        let mut framed = FrameReader::new(StallOnce {
            inner: Cursor::new(wire(&[(END, b"tail")])),
            stall_at: 3,
            stalled: false,
        });

        assert!(matches!(framed.read_frame().unwrap_err(), StreamError::Io(_)));
        assert!(framed.is_mid_frame());
        assert_eq!(
            framed.read_frame().unwrap_err().into_trailing().unwrap().as_ref(),
            b"tail"
        );
    }

    #[test]
    fn io_error_on_frame_boundary_leaves_no_progress() {
        let mut framed = FrameReader::new(WouldBlockReader);
        assert!(framed.read_frame().is_err());
        assert!(!framed.is_mid_frame());
    }

    #[test]
    #[cfg(unix)]
    fn read_timeout_mid_frame_keeps_stream_aligned() {
        use std::io::Write;
        use std::time::Duration;

        let (mut left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        right
            .set_read_timeout(Some(Duration::from_millis(50)))
            .unwrap();
        let mut framed = FrameReader::new(right);

        let bytes = wire(&[(SUCCESS, b"hello-world"), (SUCCESS, b"second")]);
        let first_len = LENGTH_PREFIX_SIZE + 1 + b"hello-world".len();
        left.write_all(&bytes[..12]).unwrap();

        let err = framed.read_frame().unwrap_err();
        assert!(matches!(
            err,
            StreamError::Io(ref e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
        ));
        assert!(framed.is_mid_frame());

        left.write_all(&bytes[12..first_len]).unwrap();
        left.write_all(&bytes[first_len..]).unwrap();

        assert_eq!(framed.read_frame().unwrap().as_ref(), b"hello-world");
        assert_eq!(framed.read_frame().unwrap().as_ref(), b"second");
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let _ = reader.get_ref();
        let _ = reader.get_mut();
        let _inner = reader.into_inner();
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }

    struct WouldBlockReader;

    impl Read for WouldBlockReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }
    }

    /// Delivers bytes up to `stall_at`, fails once with `WouldBlock`, then
    /// delivers the rest.
    struct StallOnce {
        inner: Cursor<Vec<u8>>,
        stall_at: u64,
        stalled: bool,
    }

    impl Read for StallOnce {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let pos = self.inner.position();
            if !self.stalled && pos >= self.stall_at {
                self.stalled = true;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            let limit = if self.stalled {
                buf.len()
            } else {
                buf.len().min((self.stall_at - pos) as usize)
            };
            self.inner.read(&mut buf[..limit])
        }
    }
}
