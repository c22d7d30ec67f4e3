//! Pluggable structured-binary payloads.
//!
//! Framing does not know any binary schema. A type opts in by implementing
//! [`StructuredMessage`]; with the `prost` feature every `prost::Message`
//! does so automatically.

/// Failures from a structured-binary codec.
#[derive(Debug, thiserror::Error)]
pub enum StructuredError {
    #[error("encode failed: {0}")]
    Encode(String),

    #[error("decode failed: {0}")]
    Decode(String),
}

/// A value with a structured-binary (protobuf-class) encoding.
pub trait StructuredMessage: Sized {
    fn encode_structured(&self) -> Result<Vec<u8>, StructuredError>;

    fn decode_structured(bytes: &[u8]) -> Result<Self, StructuredError>;
}

#[cfg(feature = "prost")]
impl<M: prost::Message + Default> StructuredMessage for M {
    fn encode_structured(&self) -> Result<Vec<u8>, StructuredError> {
        Ok(self.encode_to_vec())
    }

    fn decode_structured(bytes: &[u8]) -> Result<Self, StructuredError> {
        M::decode(bytes).map_err(|err| StructuredError::Decode(err.to_string()))
    }
}
