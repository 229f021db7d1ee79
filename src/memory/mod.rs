/*!
 * Memory Module
 * Remote heap allocation, compaction, and owner tracking
 */

pub mod config;
pub mod manager;
pub mod traits;
pub mod types;

// Re-export for convenience
pub use config::{CompactionPolicy, HeapConfig};
pub use manager::{Finalizer, Heap, TrackedAddress};
pub use traits::*;
pub use types::*;
