//! Application errors carried as data.
//!
//! An [`ErrInfo`] travels in an error-flagged frame and is rebuilt on the
//! receiving side as the same type, so both local and remote failures are
//! classified the same way: by [`ErrCode`], never by message text.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StreamError;
use crate::writer::FrameSink;

/// Caller-defined application error code. This is the wire-stable key.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ErrCode(pub u64);

impl ErrCode {
    /// Build an [`ErrInfo`] with this code and no data.
    pub fn error(self, msg: impl Into<String>) -> ErrInfo {
        ErrInfo::new(self, msg)
    }

    /// Build an [`ErrInfo`] with this code and JSON-serialized `data`.
    pub fn error_with_data<T: Serialize + ?Sized>(
        self,
        msg: impl Into<String>,
        data: &T,
    ) -> Result<ErrInfo, ErrInfoError> {
        ErrInfo::with_data(self, msg, data)
    }

    /// Returns true if `err` is (or wraps) an [`ErrInfo`] carrying this code.
    pub fn matches(self, err: &(dyn std::error::Error + 'static)) -> bool {
        ErrInfo::from_error(err).is_some_and(|info| info.code == self)
    }
}

impl From<u64> for ErrCode {
    fn from(code: u64) -> Self {
        Self(code)
    }
}

impl fmt::Display for ErrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Failures building or inspecting an [`ErrInfo`].
#[derive(Debug, thiserror::Error)]
pub enum ErrInfoError {
    /// `unmarshal_data` was called on a value without data.
    #[error("error value carries no data")]
    NoData,

    /// The value or its data could not be serialized.
    #[error("failed to serialize error value: {0}")]
    Encode(#[source] serde_json::Error),

    /// The wire form or the attached data could not be decoded.
    #[error("failed to decode error value: {0}")]
    Decode(#[source] serde_json::Error),
}

/// A wire-serializable application error.
///
/// JSON form: `{"Code": 404, "Msg": "not found", "RawData": "<base64>" | null}`.
///
/// Decoding is lenient: missing fields take their zero value and the
/// lowercase and camelCase key spellings are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrInfo {
    #[serde(rename = "Code", alias = "code", default)]
    code: ErrCode,
    #[serde(rename = "Msg", alias = "msg", default)]
    msg: String,
    #[serde(
        rename = "RawData",
        alias = "rawData",
        alias = "raw_data",
        alias = "rawdata",
        default,
        with = "raw_data"
    )]
    raw_data: Option<Vec<u8>>,
}

impl ErrInfo {
    pub fn new(code: impl Into<ErrCode>, msg: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            msg: msg.into(),
            raw_data: None,
        }
    }

    /// Like [`ErrInfo::new`], additionally serializing `data` as JSON into the
    /// value's raw data.
    pub fn with_data<T: Serialize + ?Sized>(
        code: impl Into<ErrCode>,
        msg: impl Into<String>,
        data: &T,
    ) -> Result<Self, ErrInfoError> {
        let raw = serde_json::to_vec(data).map_err(ErrInfoError::Encode)?;
        Ok(Self::new(code, msg).with_raw_data(raw))
    }

    /// Attach already-encoded opaque data.
    pub fn with_raw_data(mut self, raw: impl Into<Vec<u8>>) -> Self {
        self.raw_data = Some(raw.into());
        self
    }

    pub fn code(&self) -> ErrCode {
        self.code
    }

    /// Diagnostic text. Never branch on this.
    pub fn message(&self) -> &str {
        &self.msg
    }

    pub fn raw_data(&self) -> Option<&[u8]> {
        self.raw_data.as_deref()
    }

    /// Serialize to the JSON wire form.
    pub fn marshal(&self) -> Result<Vec<u8>, ErrInfoError> {
        serde_json::to_vec(self).map_err(ErrInfoError::Encode)
    }

    /// Parse the JSON wire form.
    pub fn unmarshal(bytes: &[u8]) -> Result<Self, ErrInfoError> {
        serde_json::from_slice(bytes).map_err(ErrInfoError::Decode)
    }

    /// Decode the attached data into `T`.
    ///
    /// Fails with [`ErrInfoError::NoData`] when no data is attached, or
    /// [`ErrInfoError::Decode`] when it is not valid JSON for `T`.
    pub fn unmarshal_data<T: DeserializeOwned>(&self) -> Result<T, ErrInfoError> {
        let raw = self.raw_data.as_deref().ok_or(ErrInfoError::NoData)?;
        serde_json::from_slice(raw).map_err(ErrInfoError::Decode)
    }

    /// Emit this value as the next error-flagged frame on `sink`.
    pub fn write_to<S: FrameSink + ?Sized>(&self, sink: &mut S) -> crate::Result<()> {
        sink.write_error(self)
    }

    /// Find an `ErrInfo` in `err` or its source chain.
    ///
    /// Errors received from a peer arrive wrapped in [`StreamError::Remote`];
    /// those are unwrapped too.
    pub fn from_error<'a>(err: &'a (dyn std::error::Error + 'static)) -> Option<&'a ErrInfo> {
        let mut current = Some(err);
        while let Some(err) = current {
            if let Some(info) = err.downcast_ref::<ErrInfo>() {
                return Some(info);
            }
            if let Some(StreamError::Remote(info)) = err.downcast_ref::<StreamError>() {
                return Some(info);
            }
            current = err.source();
        }
        None
    }
}

impl fmt::Display for ErrInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.msg)
    }
}

impl std::error::Error for ErrInfo {}

/// `Option<Vec<u8>>` as a standard base64 string, or `null`.
mod raw_data {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Vec<u8>>, ser: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => ser.serialize_str(&STANDARD.encode(bytes)),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Vec<u8>>, D::Error> {
        let Some(encoded) = Option::<String>::deserialize(de)? else {
            return Ok(None);
        };
        STANDARD
            .decode(encoded.as_bytes())
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}
