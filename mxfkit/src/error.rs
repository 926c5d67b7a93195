//! Error types for MXF decoding

use std::io;
use thiserror::Error;

/// Result type for MXF operations
pub type Result<T> = std::result::Result<T, MxfError>;

/// Errors that can occur while scanning and decoding MXF
#[derive(Error, Debug)]
pub enum MxfError {
    /// Underlying read failed or came back short
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Length or set encoding this decoder does not handle
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// Partition sequence breaks the Header/Body*/Footer layout
    #[error("Partition order violation: {0}")]
    OrderViolation(&'static str),

    /// A fixed-layout decoder ran past the end of its input
    #[error("Out of bounds: need {needed} bytes, have {available}")]
    Bounds {
        /// Bytes required by the layout.
        needed: u64,
        /// Bytes actually present.
        available: u64,
    },

    /// Partition-pack decoding was asked to handle a non-partition key
    #[error("Invalid partition: {0}")]
    InvalidPartition(String),
}

impl MxfError {
    pub(crate) fn bounds(needed: usize, available: usize) -> Self {
        MxfError::Bounds {
            needed: needed as u64,
            available: available as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MxfError::UnsupportedEncoding("BER indefinite length".into());
        assert!(err.to_string().contains("indefinite"));

        let err = MxfError::OrderViolation("repeated header partition");
        assert!(err.to_string().contains("repeated header"));

        let err = MxfError::bounds(100, 50);
        assert!(err.to_string().contains("100"));
        assert!(err.to_string().contains("50"));
    }

    #[test]
    fn test_io_error_source() {
        use std::error::Error as _;

        let err: MxfError = io::Error::new(io::ErrorKind::UnexpectedEof, "short read").into();
        assert!(matches!(err, MxfError::Io(_)));
        assert!(err.source().is_some());
    }
}
