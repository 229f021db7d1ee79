/*!
 * Owner Registry
 * Live block table and relocation notification
 */

use crate::core::types::{Address, Size};
use crate::memory::traits::Owner;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Stable identity of a live block across relocations
pub(crate) type BlockId = u64;

/// Registry entry for one live block
pub(crate) struct RegistryEntry {
    pub id: BlockId,
    pub address: Address,
    pub size: Size,
    pub owner: Option<Rc<dyn Owner>>,
}

impl fmt::Debug for RegistryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryEntry")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("size", &self.size)
            .field("owned", &self.owner.is_some())
            .finish()
    }
}

/// Table of every allocated block, with its optional owner
///
/// Lookups are linear; the table is as long as the live allocation count,
/// which free and compaction already walk.
#[derive(Debug, Default)]
pub(crate) struct OwnerRegistry {
    entries: Vec<RegistryEntry>,
    next_id: BlockId,
}

impl OwnerRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    pub fn register(&mut self, address: Address, size: Size, owner: Option<Rc<dyn Owner>>) -> BlockId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(RegistryEntry {
            id,
            address,
            size,
            owner,
        });
        id
    }

    /// Drop the entry at `address`; a missing entry yields `None`
    pub fn unregister(&mut self, address: Address) -> Option<RegistryEntry> {
        let idx = self.position(address)?;
        Some(self.entries.swap_remove(idx))
    }

    pub fn get(&self, address: Address) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.address == address)
    }

    pub fn get_mut(&mut self, address: Address) -> Option<&mut RegistryEntry> {
        self.entries.iter_mut().find(|e| e.address == address)
    }

    /// Current address of the block with identity `id`
    pub fn address_of(&self, id: BlockId) -> Option<Address> {
        self.entries.iter().find(|e| e.id == id).map(|e| e.address)
    }

    /// Find the live block containing `[address, address + len)`
    pub fn containing(&self, address: Address, len: Size) -> Option<&RegistryEntry> {
        let end = address.offset(len)?;
        self.entries
            .iter()
            .find(|e| e.address <= address && end.get() <= e.address.get() + e.size)
    }

    /// Sort entries ascending by address
    pub fn sort_by_address(&mut self) {
        self.entries.sort_unstable_by_key(|e| e.address);
    }

    /// Move the `idx`-th entry to `new_address` and notify its owner
    pub fn relocate(&mut self, idx: usize, new_address: Address) {
        let entry = &mut self.entries[idx];
        entry.address = new_address;
        if let Some(owner) = entry.owner.as_ref() {
            owner.relocate(new_address);
        }
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn total_bytes(&self) -> Size {
        self.entries.iter().map(|e| e.size).sum()
    }

    fn position(&self, address: Address) -> Option<usize> {
        self.entries.iter().position(|e| e.address == address)
    }
}

/// Owner that simply tracks where its block currently lives
///
/// # Example
///
/// ```ignore
/// let handle = Rc::new(TrackedAddress::default());
/// heap.allocate_owned(64, handle.clone())?;
/// heap.collect()?;
/// heap.write(handle.get(), b"still valid")?;
/// ```
#[derive(Debug, Default)]
pub struct TrackedAddress {
    address: Cell<Address>,
    relocations: Cell<usize>,
}

impl TrackedAddress {
    pub fn new(address: Address) -> Self {
        Self {
            address: Cell::new(address),
            relocations: Cell::new(0),
        }
    }

    /// Current address of the tracked block
    pub fn get(&self) -> Address {
        self.address.get()
    }

    /// Number of relocation notices received
    pub fn relocations(&self) -> usize {
        self.relocations.get()
    }
}

impl Owner for TrackedAddress {
    fn relocate(&self, new_address: Address) {
        self.address.set(new_address);
        self.relocations.set(self.relocations.get() + 1);
    }
}
