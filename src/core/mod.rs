/*!
 * Core Module
 * Fundamental heap types and limits
 */

pub mod limits;
pub mod types;

// Re-export for convenience
pub use types::*;
