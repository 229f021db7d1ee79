/*!
 * Core Types
 * Common types used across the heap and device layers
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Size type for memory operations
pub type Size = usize;

/// Offset into the remote memory space
///
/// Never dereferenced locally; every access goes through a [`RemoteMemory`]
/// transport.
///
/// [`RemoteMemory`]: crate::device::RemoteMemory
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Address(usize);

impl Address {
    /// "No address"; only a real block when the heap itself starts at 0
    pub const NULL: Self = Self(0);

    #[inline]
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Raw offset value, for handing to a transport
    #[inline]
    pub const fn get(self) -> usize {
        self.0
    }

    /// Address `size` bytes above this one
    ///
    /// Returns `None` on overflow of the address space.
    #[inline]
    pub fn offset(self, size: Size) -> Option<Self> {
        self.0.checked_add(size).map(Self)
    }

    /// Bytes from `base` up to this address, `None` if `base` is above it
    #[inline]
    pub fn distance_from(self, base: Address) -> Option<Size> {
        self.0.checked_sub(base.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl From<usize> for Address {
    #[inline]
    fn from(raw: usize) -> Self {
        Self(raw)
    }
}

/// Round `size` up to a multiple of `unit`
///
/// `unit` of 0 or 1 leaves the size untouched. Returns `None` on overflow.
#[inline]
pub fn round_up(size: Size, unit: Size) -> Option<Size> {
    if unit <= 1 {
        return Some(size);
    }
    match size % unit {
        0 => Some(size),
        rem => size.checked_add(unit - rem),
    }
}
