/*!
 * Device Traits
 * Interface to the remote memory transport
 */

use super::types::DeviceResult;
use crate::core::types::{Address, Size};

/// Byte-addressable memory reachable only through a synchronous transport
///
/// Implementations may chunk transfers internally. Calls block for the
/// transport's latency and are not retried by the heap.
pub trait RemoteMemory {
    /// Fill `buf` with the bytes starting at `address`
    fn read_bytes(&mut self, address: Address, buf: &mut [u8]) -> DeviceResult<()>;

    /// Store `data` starting at `address`
    fn write_bytes(&mut self, address: Address, data: &[u8]) -> DeviceResult<()>;

    /// Total addressable bytes
    fn capacity(&self) -> Size;

    /// Release transport resources; later transfers may fail
    fn release(&mut self) {}

    /// Read `len` bytes into a fresh buffer
    fn read_vec(&mut self, address: Address, len: Size) -> DeviceResult<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_bytes(address, &mut buf)?;
        Ok(buf)
    }
}

impl<T: RemoteMemory + ?Sized> RemoteMemory for Box<T> {
    fn read_bytes(&mut self, address: Address, buf: &mut [u8]) -> DeviceResult<()> {
        (**self).read_bytes(address, buf)
    }

    fn write_bytes(&mut self, address: Address, data: &[u8]) -> DeviceResult<()> {
        (**self).write_bytes(address, data)
    }

    fn capacity(&self) -> Size {
        (**self).capacity()
    }

    fn release(&mut self) {
        (**self).release()
    }
}
