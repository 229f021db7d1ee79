/*!
 * Device Types
 * Errors reported by remote memory transports
 */

use crate::core::types::{Address, Size};
use smartstring::alias::String as SmartString;
use thiserror::Error;

/// Device operation result
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Transport-level failures
///
/// The heap never interprets or retries these; they surface to callers as
/// [`crate::memory::HeapError::Transport`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeviceError {
    #[error("Access out of bounds: {len} bytes at {address} (device capacity {capacity})")]
    OutOfBounds {
        address: Address,
        len: Size,
        capacity: Size,
    },

    #[error("Bus error: {0}")]
    Bus(SmartString),

    #[error("Device already released")]
    Released,
}

impl DeviceError {
    /// Create a bus error
    #[inline]
    pub fn bus(msg: impl Into<SmartString>) -> Self {
        Self::Bus(msg.into())
    }
}
