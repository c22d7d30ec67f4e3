//! Length-prefixed message framing over a byte stream.
//!
//! Every message travels as one frame:
//! - An 8-byte big-endian signed length covering the rest of the frame
//! - A 1-byte flag: `0` error, `1` success, anything else end-of-sequence
//! - The payload (length - 1 bytes)
//!
//! Error frames carry a JSON [`ErrInfo`]; reads surface them as
//! [`StreamError::Remote`] so callers never decode them by hand. End frames
//! surface as [`StreamError::EndOfSequence`] with their trailing bytes.
//!
//! [`Stream`] pairs a [`FrameReader`] with a [`FrameWriter`] and adds typed
//! JSON and structured-binary helpers plus latched-error write chaining.

pub mod codec;
pub mod errinfo;
pub mod error;
pub mod flag;
pub mod int_codec;
pub mod reader;
pub mod stream;
pub mod structured;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_MAX_BODY, FLAG_SIZE,
    LENGTH_PREFIX_SIZE,
};
pub use errinfo::{ErrCode, ErrInfo, ErrInfoError};
pub use error::{Result, StreamError};
pub use flag::Flag;
pub use int_codec::{FixedInt, IntCodecError};
pub use reader::FrameReader;
pub use stream::{ConnectionStream, Stream};
pub use structured::{StructuredError, StructuredMessage};
pub use writer::{FrameSink, FrameWriter};
