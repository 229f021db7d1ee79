/*!
 * Free List
 * First-fit list of reusable ranges below the bump pointer
 */

use crate::core::types::{Address, Size};

/// Free range available for reuse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FreeBlock {
    pub address: Address,
    pub size: Size,
}

impl FreeBlock {
    pub fn new(address: Address, size: Size) -> Self {
        Self { address, size }
    }

    #[inline]
    pub fn end(&self) -> Address {
        Address::new(self.address.get() + self.size)
    }
}

/// Side-table free list
///
/// Entries are kept in insertion order and scanned first-fit. Adjacent
/// entries never coexist: [`FreeList::insert_coalesced`] merges before
/// inserting.
#[derive(Debug, Default)]
pub(crate) struct FreeList {
    blocks: Vec<FreeBlock>,
}

impl FreeList {
    pub fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    /// Carve `size` bytes out of the first entry large enough
    ///
    /// An exact fit consumes the entry; a larger one keeps its remainder in
    /// place so list order is preserved.
    pub fn take_first_fit(&mut self, size: Size) -> Option<Address> {
        let idx = self.blocks.iter().position(|b| b.size >= size)?;
        let block = &mut self.blocks[idx];
        let address = block.address;

        if block.size == size {
            self.blocks.remove(idx);
        } else {
            block.address = Address::new(address.get() + size);
            block.size -= size;
        }
        Some(address)
    }

    /// Insert `block`, merging with any neighbours until none remain
    ///
    /// Returns the final merged block.
    pub fn insert_coalesced(&mut self, block: FreeBlock) -> FreeBlock {
        let mut candidate = block;

        loop {
            let neighbour = self
                .blocks
                .iter()
                .position(|b| b.end() == candidate.address || candidate.end() == b.address);

            match neighbour {
                Some(idx) => {
                    let other = self.blocks.remove(idx);
                    candidate = FreeBlock::new(
                        candidate.address.min(other.address),
                        candidate.size + other.size,
                    );
                }
                None => break,
            }
        }

        self.blocks.push(candidate);
        candidate
    }

    /// Remove and return the entry whose end is exactly `end`
    pub fn take_ending_at(&mut self, end: Address) -> Option<FreeBlock> {
        let idx = self.blocks.iter().position(|b| b.end() == end)?;
        Some(self.blocks.remove(idx))
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FreeBlock> {
        self.blocks.iter()
    }

    pub fn total_bytes(&self) -> Size {
        self.blocks.iter().map(|b| b.size).sum()
    }

    pub fn largest(&self) -> Size {
        self.blocks.iter().map(|b| b.size).max().unwrap_or(0)
    }
}
