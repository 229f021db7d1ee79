/*!
 * Heap Limits and Constants
 *
 * Centralized location for heap defaults, thresholds, and transport sizing.
 *
 * - Performance-relevant constants are marked with [PERF]
 */

// =============================================================================
// HEAP GEOMETRY
// =============================================================================

/// Default managed region size (8MB, a common external PSRAM part)
pub const DEFAULT_HEAP_SIZE: usize = 8 * 1024 * 1024;

/// Default start of the managed region
pub const DEFAULT_HEAP_START: usize = 0;

/// Natural transfer unit of the transport (32-bit word)
/// Every allocation size is rounded up to a multiple of this
pub const DEFAULT_TRANSPORT_UNIT: usize = 4;

// =============================================================================
// COMPACTION
// =============================================================================

/// Staging buffer used to shuttle bytes during relocation (256 bytes)
/// [PERF] Bounded so compaction never needs more local RAM than this
pub const DEFAULT_STAGING_CHUNK: usize = 256;

/// Upper bound accepted for the staging buffer (64KB)
pub const MAX_STAGING_CHUNK: usize = 64 * 1024;

// =============================================================================
// MEMORY PRESSURE
// =============================================================================

/// Usage ratio at which pressure is reported as Medium
pub const PRESSURE_MEDIUM: f64 = 0.60;

/// Usage ratio at which pressure is reported as High
pub const PRESSURE_WARNING: f64 = 0.80;

/// Usage ratio at which pressure is reported as Critical
pub const PRESSURE_CRITICAL: f64 = 0.95;
