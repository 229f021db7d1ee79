/*!
 * Remote Heap Library
 * Dynamic allocation over external memory reachable only through a transport
 */

pub mod core;
pub mod device;
pub mod memory;
pub mod monitoring;

// Re-exports
pub use crate::core::types::{Address, Size};
pub use device::{DeviceError, InMemoryDevice, RemoteMemory};
pub use memory::{
    AllocatorMode, Block, BlockState, CompactionPolicy, Compactor, Finalizer, Heap, HeapAllocator,
    HeapConfig, HeapError, HeapInfo, HeapResult, HeapState, HeapStats, MemoryPressure, Owner,
    TrackedAddress,
};
pub use monitoring::init_tracing;
