/*!
 * In-Memory Device
 * Vec-backed remote memory for tests, benchmarks, and the demo binary
 */

use super::traits::RemoteMemory;
use super::types::{DeviceError, DeviceResult};
use crate::core::types::{Address, Size};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Transfer counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStats {
    pub reads: u64,
    pub writes: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

/// Remote memory simulated with a local buffer
///
/// Supports fault injection: after a configured number of successful writes
/// every further write fails with a bus error, which is how a transport
/// dropping out mid-compaction is reproduced.
#[derive(Debug)]
pub struct InMemoryDevice {
    bytes: Vec<u8>,
    stats: TransferStats,
    writes_until_failure: Option<u64>,
    released: bool,
}

impl InMemoryDevice {
    /// Create a zero-filled device with `capacity` bytes
    pub fn new(capacity: Size) -> Self {
        Self {
            bytes: vec![0u8; capacity],
            stats: TransferStats::default(),
            writes_until_failure: None,
            released: false,
        }
    }

    /// Fail every write after the next `writes` successful ones
    pub fn fail_after_writes(&mut self, writes: u64) {
        self.writes_until_failure = Some(writes);
    }

    /// Stop injecting failures
    pub fn clear_faults(&mut self) {
        self.writes_until_failure = None;
    }

    pub fn stats(&self) -> TransferStats {
        self.stats
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Raw view of the backing buffer, bypassing the transport
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    fn range(&self, address: Address, len: Size) -> DeviceResult<std::ops::Range<usize>> {
        if self.released {
            return Err(DeviceError::Released);
        }
        let start = address.get();
        match start.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(start..end),
            _ => Err(DeviceError::OutOfBounds {
                address,
                len,
                capacity: self.bytes.len(),
            }),
        }
    }
}

impl RemoteMemory for InMemoryDevice {
    fn read_bytes(&mut self, address: Address, buf: &mut [u8]) -> DeviceResult<()> {
        let range = self.range(address, buf.len())?;
        buf.copy_from_slice(&self.bytes[range]);
        self.stats.reads += 1;
        self.stats.bytes_read += buf.len() as u64;
        Ok(())
    }

    fn write_bytes(&mut self, address: Address, data: &[u8]) -> DeviceResult<()> {
        let range = self.range(address, data.len())?;
        if let Some(remaining) = self.writes_until_failure.as_mut() {
            if *remaining == 0 {
                return Err(DeviceError::bus("injected write failure"));
            }
            *remaining -= 1;
        }
        self.bytes[range].copy_from_slice(data);
        self.stats.writes += 1;
        self.stats.bytes_written += data.len() as u64;
        Ok(())
    }

    fn capacity(&self) -> Size {
        self.bytes.len()
    }

    fn release(&mut self) {
        debug!(capacity = self.bytes.len(), "In-memory device released");
        self.released = true;
    }
}
