//! The one-byte frame classifier.
//!
//! Bytes 0 and 1 are reserved for error and success frames. Every other byte
//! reads as end-of-sequence; writers always emit [`END`].

/// Wire value of an application-error frame.
pub const ERROR: u8 = 0;

/// Wire value of a success frame.
pub const SUCCESS: u8 = 1;

/// Canonical wire value of an end-of-sequence frame.
pub const END: u8 = 2;

/// Frame classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// The payload is a serialized `ErrInfo`.
    Error,
    /// The payload is an application message.
    Success,
    /// No further messages follow; the payload is optional trailing data.
    End,
}

impl Flag {
    /// Classify a wire byte. Any value other than [`ERROR`] or [`SUCCESS`] is `End`.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            ERROR => Self::Error,
            SUCCESS => Self::Success,
            _ => Self::End,
        }
    }

    /// The byte written on the wire for this flag.
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Error => ERROR,
            Self::Success => SUCCESS,
            Self::End => END,
        }
    }

    /// Returns true if `byte` is one of the three canonical values.
    pub fn is_canonical(byte: u8) -> bool {
        byte <= END
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Success => "SUCCESS",
            Self::End => "END",
        }
    }
}

impl From<Flag> for u8 {
    fn from(flag: Flag) -> Self {
        flag.as_byte()
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
