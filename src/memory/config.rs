/*!
 * Heap Configuration
 *
 * Geometry, transport sizing, and compaction policy for a heap instance
 */

use super::types::{HeapError, HeapResult};
use crate::core::limits::*;
use crate::core::types::{Address, Size};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// When compaction runs besides explicit `collect()` calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionPolicy {
    /// Compact after every free that could not shrink the tail
    OnFree,
    /// Only compact on `collect()`
    Explicit,
}

impl FromStr for CompactionPolicy {
    type Err = HeapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "on_free" | "on-free" | "onfree" => Ok(Self::OnFree),
            "explicit" | "manual" => Ok(Self::Explicit),
            other => Err(HeapError::invalid_argument(format!(
                "unknown compaction policy '{}'",
                other
            ))),
        }
    }
}

/// Heap configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeapConfig {
    /// First byte of the managed region
    pub heap_start: Address,
    /// Bytes in the managed region
    pub heap_size: Size,
    /// Allocation granularity; sizes are rounded up to a multiple of this
    pub unit: Size,
    /// Staging buffer size used when relocating blocks
    pub staging_chunk: Size,
    pub compaction: CompactionPolicy,
    // Memory pressure thresholds (ratio of capacity)
    pub medium_threshold: f64,   // 60%
    pub warning_threshold: f64,  // 80%
    pub critical_threshold: f64, // 95%
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::new(Address::new(DEFAULT_HEAP_START), DEFAULT_HEAP_SIZE)
    }
}

impl HeapConfig {
    /// Region `[heap_start, heap_start + heap_size)` with default tuning
    pub fn new(heap_start: Address, heap_size: Size) -> Self {
        Self {
            heap_start,
            heap_size,
            unit: DEFAULT_TRANSPORT_UNIT,
            staging_chunk: DEFAULT_STAGING_CHUNK,
            compaction: CompactionPolicy::OnFree,
            medium_threshold: PRESSURE_MEDIUM,
            warning_threshold: PRESSURE_WARNING,
            critical_threshold: PRESSURE_CRITICAL,
        }
    }

    /// Whole of an 8MB PSRAM part
    pub fn psram_8mb() -> Self {
        Self::new(Address::new(0), 8 * 1024 * 1024)
    }

    pub fn with_unit(mut self, unit: Size) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_staging_chunk(mut self, staging_chunk: Size) -> Self {
        self.staging_chunk = staging_chunk;
        self
    }

    pub fn with_compaction(mut self, compaction: CompactionPolicy) -> Self {
        self.compaction = compaction;
        self
    }

    /// One past the last managed byte
    pub fn heap_end(&self) -> Option<Address> {
        self.heap_start.offset(self.heap_size)
    }

    /// Reject configurations the allocator cannot honour
    pub fn validate(&self) -> HeapResult<()> {
        if self.heap_size == 0 {
            return Err(HeapError::invalid_argument("heap size must be non-zero"));
        }
        if self.heap_end().is_none() {
            return Err(HeapError::invalid_argument("heap region overflows the address space"));
        }
        if self.unit == 0 || !self.unit.is_power_of_two() {
            return Err(HeapError::invalid_argument(format!(
                "transport unit {} is not a power of two",
                self.unit
            )));
        }
        if self.staging_chunk == 0 || self.staging_chunk > MAX_STAGING_CHUNK {
            return Err(HeapError::invalid_argument(format!(
                "staging chunk {} outside 1..={}",
                self.staging_chunk, MAX_STAGING_CHUNK
            )));
        }
        let ordered = 0.0 <= self.medium_threshold
            && self.medium_threshold <= self.warning_threshold
            && self.warning_threshold <= self.critical_threshold
            && self.critical_threshold <= 1.0;
        if !ordered {
            return Err(HeapError::invalid_argument(
                "pressure thresholds must satisfy 0 <= medium <= warning <= critical <= 1",
            ));
        }
        Ok(())
    }

    /// Default configuration overridden by environment variables
    ///
    /// - REMOTE_HEAP_START: first managed byte (decimal or 0x-prefixed hex)
    /// - REMOTE_HEAP_SIZE: managed bytes
    /// - REMOTE_HEAP_UNIT: transport unit
    /// - REMOTE_HEAP_COMPACTION: `on_free` or `explicit`
    pub fn from_env() -> HeapResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> HeapResult<Self> {
        let mut config = Self::default();
        if let Some(raw) = lookup("REMOTE_HEAP_START") {
            config.heap_start = Address::new(parse_size("REMOTE_HEAP_START", &raw)?);
        }
        if let Some(raw) = lookup("REMOTE_HEAP_SIZE") {
            config.heap_size = parse_size("REMOTE_HEAP_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("REMOTE_HEAP_UNIT") {
            config.unit = parse_size("REMOTE_HEAP_UNIT", &raw)?;
        }
        if let Some(raw) = lookup("REMOTE_HEAP_COMPACTION") {
            config.compaction = raw.parse()?;
        }
        config.validate()?;
        Ok(config)
    }
}

fn parse_size(key: &str, raw: &str) -> HeapResult<Size> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => Size::from_str_radix(hex, 16),
        None => raw.parse::<Size>(),
    };
    parsed.map_err(|e| HeapError::invalid_argument(format!("{}='{}': {}", key, raw, e)))
}
