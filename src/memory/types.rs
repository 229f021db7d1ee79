/*!
 * Memory Types
 * Common types for heap management
 */

use crate::core::types::{Address, Size};
use crate::device::DeviceError;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use smartstring::alias::String as SmartString;
use std::fmt;
use thiserror::Error;

/// Heap operation result
pub type HeapResult<T> = Result<T, HeapError>;

/// Heap errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
#[non_exhaustive]
pub enum HeapError {
    #[error("Out of memory: requested {requested} bytes, tail has {tail_available} bytes ({free_bytes} free / {capacity} total)")]
    #[diagnostic(
        code(heap::out_of_memory),
        help("Free unused blocks and/or call collect() to compact the heap, then retry.")
    )]
    OutOfMemory {
        requested: Size,
        tail_available: Size,
        free_bytes: Size,
        capacity: Size,
    },

    #[error("Invalid argument: {0}")]
    #[diagnostic(
        code(heap::invalid_argument),
        help("The caller passed a size or address the heap does not recognise.")
    )]
    InvalidArgument(SmartString),

    #[error("Invalid heap state: {0}")]
    #[diagnostic(
        code(heap::invalid_state),
        help("Call init() before using the heap; a deinitialized heap cannot be reused.")
    )]
    InvalidState(HeapState),

    #[error("Transport failure: {0}")]
    #[diagnostic(code(heap::transport))]
    Transport(#[from] DeviceError),

    #[error("Heap corruption detected: {0}")]
    #[diagnostic(code(heap::corrupted))]
    Corrupted(SmartString),
}

impl HeapError {
    /// Create an invalid argument error
    #[inline]
    pub fn invalid_argument(msg: impl Into<SmartString>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a corruption error
    #[inline]
    pub fn corrupted(msg: impl Into<SmartString>) -> Self {
        Self::Corrupted(msg.into())
    }

    /// Whether the caller can free/collect and retry
    #[inline]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::OutOfMemory { .. })
    }
}

/// Lifecycle of a heap instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeapState {
    Uninitialized,
    Ready,
    Deinitialized,
}

impl fmt::Display for HeapState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HeapState::Uninitialized => write!(f, "UNINITIALIZED"),
            HeapState::Ready => write!(f, "READY"),
            HeapState::Deinitialized => write!(f, "DEINITIALIZED"),
        }
    }
}

/// Allocator mode
///
/// `Finalizing` is entered through [`crate::memory::Heap::finalizing`] and
/// restricts frees to paths that never grow local bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocatorMode {
    Normal,
    Finalizing,
}

/// Block state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockState {
    Free,
    Allocated,
}

/// One contiguous range of the heap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub address: Address,
    pub size: Size,
    pub state: BlockState,
}

impl Block {
    pub fn new(address: Address, size: Size, state: BlockState) -> Self {
        Self {
            address,
            size,
            state,
        }
    }

    /// One past the last byte
    pub fn end(&self) -> Address {
        Address::new(self.address.get() + self.size)
    }

    pub fn is_allocated(&self) -> bool {
        self.state == BlockState::Allocated
    }
}

/// Heap statistics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeapStats {
    pub capacity: Size,
    pub used_bytes: Size,
    pub free_bytes: Size,
    /// Untouched bytes above the bump pointer
    pub tail_bytes: Size,
    pub free_blocks: usize,
    pub largest_free_block: Size,
    pub live_blocks: usize,
    /// Bytes abandoned during finalization, reclaimed by the next collect
    pub leaked_bytes: Size,
    pub usage_percentage: f64,
    /// Classified against the heap's configured thresholds
    pub pressure: MemoryPressure,
}

impl HeapStats {
    pub fn memory_pressure(&self) -> MemoryPressure {
        self.pressure
    }

    /// 0.0 when all free space is one range, approaching 1.0 as it splinters
    pub fn fragmentation(&self) -> f64 {
        if self.free_bytes == 0 {
            return 0.0;
        }
        1.0 - (self.largest_free_block as f64 / self.free_bytes as f64)
    }
}

/// Memory pressure levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MemoryPressure {
    Low,
    Medium,
    High,
    Critical,
}

impl MemoryPressure {
    /// Classify a usage ratio against ascending thresholds
    pub(crate) fn classify(ratio: f64, medium: f64, high: f64, critical: f64) -> Self {
        if ratio >= critical {
            MemoryPressure::Critical
        } else if ratio >= high {
            MemoryPressure::High
        } else if ratio >= medium {
            MemoryPressure::Medium
        } else {
            MemoryPressure::Low
        }
    }
}

impl fmt::Display for MemoryPressure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MemoryPressure::Low => write!(f, "LOW"),
            MemoryPressure::Medium => write!(f, "MEDIUM"),
            MemoryPressure::High => write!(f, "HIGH"),
            MemoryPressure::Critical => write!(f, "CRITICAL"),
        }
    }
}
