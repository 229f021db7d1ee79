/*!
 * Device Module
 * Remote memory transport abstraction
 */

pub mod memory;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use memory::{InMemoryDevice, TransferStats};
pub use traits::RemoteMemory;
pub use types::{DeviceError, DeviceResult};
