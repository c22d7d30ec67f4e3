//! Length-prefixed, flagged message streams with errors carried as data.
//!
//! # Crate Structure
//!
//! - [`transport`]: raw connections (Unix domain sockets, TCP) and endpoints
//! - [`frame`]: the frame codec, `ErrInfo`, and the typed [`Stream`](frame::Stream)

/// Re-export transport types.
pub mod transport {
    pub use framestream_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use framestream_frame::*;
}

pub use framestream_frame::{ErrCode, ErrInfo, Flag, FrameConfig, Stream, StreamError};
pub use framestream_transport::{Connection, Endpoint};
