use thiserror::Error;

/// Failures while decoding a partition stream. These travel inside
/// `anyhow::Error`; use `downcast_ref::<CodecError>()` to inspect them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("stream truncated: wanted {wanted} bytes, {available} available")]
    Truncated { wanted: usize, available: usize },

    #[error("malformed block frame: {0}")]
    BadFrame(String),

    #[error("block failed to decompress: {0}")]
    Decompress(String),

    #[error("block declared {declared} uncompressed bytes but produced {actual}")]
    LengthMismatch { declared: usize, actual: usize },

    #[error("varint does not fit in {bits} bits")]
    VarintOverflow { bits: u32 },

    #[error("stream is closed")]
    Closed,
}
