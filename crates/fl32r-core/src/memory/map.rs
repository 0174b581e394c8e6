//! Physical address map: RAM below ROM below MMIO at the top of the 32-bit range.

use crate::api::ConfigError;

/// Size of the 32-bit physical address range in bytes.
pub const ADDRESS_SPACE_SIZE: u64 = 1 << 32;

/// Default ROM window size (64 KiB).
pub const DEFAULT_ROM_SIZE: u32 = 0x0001_0000;
/// Default MMIO window size (64 KiB).
pub const DEFAULT_MMIO_SIZE: u32 = 0x0001_0000;

/// Region classification for a translated physical address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum MemoryRegion {
    /// `[0, rom_start)`, backed by the main address space.
    Ram,
    /// `[rom_start, mmio_start)`, backed by a read-only store.
    Rom,
    /// `[mmio_start, 2^32)`, routed to the MMIO bus.
    Mmio,
}

/// Region boundaries fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MemoryLayout {
    rom_start: u64,
    mmio_start: u64,
}

impl MemoryLayout {
    /// Places the MMIO window at the top of the address range and ROM directly below.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WindowsTooLarge`] when ROM and MMIO together leave no RAM.
    pub fn new(rom_size: u32, mmio_size: u32) -> Result<Self, ConfigError> {
        let reserved = u64::from(rom_size) + u64::from(mmio_size);
        if reserved >= ADDRESS_SPACE_SIZE {
            return Err(ConfigError::WindowsTooLarge {
                rom_size,
                mmio_size,
            });
        }
        let mmio_start = ADDRESS_SPACE_SIZE - u64::from(mmio_size);
        Ok(Self {
            rom_start: mmio_start - u64::from(rom_size),
            mmio_start,
        })
    }

    /// First ROM address; also one past the last RAM address.
    #[must_use]
    pub const fn rom_start(self) -> u64 {
        self.rom_start
    }

    /// First MMIO address.
    #[must_use]
    pub const fn mmio_start(self) -> u64 {
        self.mmio_start
    }

    /// Size of the RAM window in bytes.
    #[must_use]
    pub const fn ram_window(self) -> u64 {
        self.rom_start
    }

    /// Size of the ROM window in bytes.
    #[must_use]
    pub const fn rom_size(self) -> u64 {
        self.mmio_start - self.rom_start
    }

    /// Size of the MMIO window in bytes.
    #[must_use]
    pub const fn mmio_size(self) -> u64 {
        ADDRESS_SPACE_SIZE - self.mmio_start
    }

    /// Classifies a physical address.
    #[must_use]
    pub const fn classify(self, phys: u32) -> MemoryRegion {
        let addr = phys as u64;
        if addr >= self.mmio_start {
            MemoryRegion::Mmio
        } else if addr >= self.rom_start {
            MemoryRegion::Rom
        } else {
            MemoryRegion::Ram
        }
    }
}

impl Default for MemoryLayout {
    fn default() -> Self {
        let mmio_start = ADDRESS_SPACE_SIZE - DEFAULT_MMIO_SIZE as u64;
        Self {
            rom_start: mmio_start - DEFAULT_ROM_SIZE as u64,
            mmio_start,
        }
    }
}
