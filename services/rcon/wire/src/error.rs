//! Wire protocol error types.

use thiserror::Error;

/// Wire protocol errors
#[derive(Error, Debug)]
pub enum WireError {
    /// Declared packet size is below the protocol minimum
    #[error("packet too small: {0} bytes")]
    Undersized(i32),

    /// Size limit exceeded
    #[error("size limit exceeded: {size} bytes (max {max})")]
    Size {
        /// Offending size
        size: usize,
        /// Configured limit
        max: usize,
    },

    /// Body is not followed by the NUL terminator
    #[error("missing packet terminator")]
    Terminator,

    /// Outgoing body contains a NUL byte
    #[error("body contains NUL byte at offset {0}")]
    Nul(usize),

    /// Underlying I/O failure while framing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
