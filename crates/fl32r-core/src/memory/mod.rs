//! Byte-addressable backing stores and the physical address map.

/// Physical region map derived from the configured ROM and MMIO windows.
pub mod map;

pub use map::{MemoryLayout, MemoryRegion, ADDRESS_SPACE_SIZE};

use thiserror::Error;

/// Caller error on the raw byte store.
///
/// These are host programming errors, distinct from the CPU-visible
/// [`Fault::Memory`](crate::Fault::Memory) raised by the MMU above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AddressSpaceError {
    /// Index at or past the end of the store.
    #[error("address {index:#x} is outside the {len}-byte address space")]
    OutOfRange {
        /// Offending byte index.
        index: u64,
        /// Length of the store.
        len: u64,
    },
    /// Requested length exceeds the 4 GiB physical address range.
    #[error("address space of {len} bytes exceeds the 4 GiB physical range")]
    TooLarge {
        /// Requested length.
        len: u64,
    },
}

/// Fixed-length, zero-initialised, bounds-checked byte store.
#[derive(Clone, PartialEq, Eq)]
pub struct AddressSpace {
    bytes: Box<[u8]>,
}

impl AddressSpace {
    /// Allocates a zeroed store of `len` bytes (`len <= 2^32`).
    ///
    /// # Errors
    ///
    /// Returns [`AddressSpaceError::TooLarge`] when `len` exceeds [`ADDRESS_SPACE_SIZE`]
    /// or cannot be represented on this host.
    pub fn new(len: u64) -> Result<Self, AddressSpaceError> {
        if len > ADDRESS_SPACE_SIZE {
            return Err(AddressSpaceError::TooLarge { len });
        }
        let size = usize::try_from(len).map_err(|_| AddressSpaceError::TooLarge { len })?;
        Ok(Self {
            bytes: vec![0; size].into_boxed_slice(),
        })
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Returns `true` for a zero-length store.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Reads one byte.
    ///
    /// # Errors
    ///
    /// Returns [`AddressSpaceError::OutOfRange`] when `index >= len`.
    pub fn get(&self, index: u64) -> Result<u8, AddressSpaceError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.bytes.get(i).copied())
            .ok_or(AddressSpaceError::OutOfRange {
                index,
                len: self.len(),
            })
    }

    /// Writes one byte.
    ///
    /// # Errors
    ///
    /// Returns [`AddressSpaceError::OutOfRange`] when `index >= len`.
    pub fn set(&mut self, index: u64, value: u8) -> Result<(), AddressSpaceError> {
        let len = self.len();
        let slot = usize::try_from(index)
            .ok()
            .and_then(|i| self.bytes.get_mut(i))
            .ok_or(AddressSpaceError::OutOfRange { index, len })?;
        *slot = value;
        Ok(())
    }

    /// Copies `data` into the store starting at `start`.
    ///
    /// # Errors
    ///
    /// Returns [`AddressSpaceError::OutOfRange`] naming the first byte that does not fit;
    /// nothing is written in that case.
    pub fn write_slice(&mut self, start: u64, data: &[u8]) -> Result<(), AddressSpaceError> {
        let len = self.len();
        let end = start.saturating_add(data.len() as u64);
        if end > len {
            return Err(AddressSpaceError::OutOfRange {
                index: start.max(len),
                len,
            });
        }
        let (Ok(from), Ok(to)) = (usize::try_from(start), usize::try_from(end)) else {
            return Err(AddressSpaceError::OutOfRange { index: start, len });
        };
        self.bytes[from..to].copy_from_slice(data);
        Ok(())
    }

    /// Zeroes every byte.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    /// Borrowed view of the whole store.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressSpace")
            .field("len", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{AddressSpace, AddressSpaceError, ADDRESS_SPACE_SIZE};

    #[test]
    fn new_store_is_zeroed() {
        let space = AddressSpace::new(64).unwrap();
        assert_eq!(space.len(), 64);
        assert!(space.as_slice().iter().all(|byte| *byte == 0));
    }

    #[test]
    fn get_and_set_are_bounds_checked() {
        let mut space = AddressSpace::new(4).unwrap();
        space.set(3, 0xAB).unwrap();
        assert_eq!(space.get(3), Ok(0xAB));
        assert_eq!(
            space.get(4),
            Err(AddressSpaceError::OutOfRange { index: 4, len: 4 })
        );
        assert_eq!(
            space.set(u64::MAX, 1),
            Err(AddressSpaceError::OutOfRange {
                index: u64::MAX,
                len: 4
            })
        );
    }

    #[test]
    fn oversized_store_is_rejected() {
        assert_eq!(
            AddressSpace::new(ADDRESS_SPACE_SIZE + 1),
            Err(AddressSpaceError::TooLarge {
                len: ADDRESS_SPACE_SIZE + 1
            })
        );
    }

    #[test]
    fn write_slice_rejects_overflow_without_writing() {
        let mut space = AddressSpace::new(4).unwrap();
        assert!(space.write_slice(2, &[1, 2, 3]).is_err());
        assert_eq!(space.as_slice(), &[0, 0, 0, 0]);
        space.write_slice(1, &[7, 8]).unwrap();
        assert_eq!(space.as_slice(), &[0, 7, 8, 0]);
    }

    #[test]
    fn empty_store_is_allowed() {
        let space = AddressSpace::new(0).unwrap();
        assert!(space.is_empty());
    }
}
