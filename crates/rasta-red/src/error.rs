//! Recoverable error codes returned across the redundancy layer API.
//!
//! These are the only values the public API ever returns. Wire-level
//! problems (bad check code, duplicate sequence numbers, PDUs too far
//! ahead, a full defer queue) are handled silently by dropping the
//! offending PDU, and internal invariant violations abort the process.

use std::fmt;

/// Error returned by the redundancy layer's public operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedError {
    /// A channel or transport id is out of range, or an argument violates
    /// its documented bounds.
    InvalidParameter,
    /// The configuration is inconsistent (id/index mismatch, duplicate
    /// transport ids, a value outside its permitted range).
    InvalidConfiguration,
    /// A payload size outside `MIN_PAYLOAD_LEN..=MAX_PAYLOAD_LEN`.
    InvalidMessageSize,
    /// The caller's read buffer is too small for the pending payload.
    InvalidBufferSize,
    /// No payload is waiting in the received buffer.
    NoMessageReceived,
    /// The operation is not permitted in the channel's current state.
    InvalidOperationInCurrentState,
}

impl fmt::Display for RedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedError::InvalidParameter => write!(f, "invalid parameter"),
            RedError::InvalidConfiguration => write!(f, "invalid configuration"),
            RedError::InvalidMessageSize => write!(f, "invalid message size"),
            RedError::InvalidBufferSize => write!(f, "buffer too small for pending message"),
            RedError::NoMessageReceived => write!(f, "no message received"),
            RedError::InvalidOperationInCurrentState => {
                write!(f, "operation not permitted in current channel state")
            }
        }
    }
}

impl std::error::Error for RedError {}
