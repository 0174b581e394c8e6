//! MMIO device contract and the bus that routes the MMIO window to devices.

/// Thread-safe hardware interrupt line.
pub mod interrupt;

pub use interrupt::InterruptLine;

/// Memory-mapped device.
///
/// Addresses passed to the accessors are offsets relative to
/// [`base`](Self::base). Devices that only implement word access inherit
/// byte access derived from it; devices with real byte registers override
/// [`read_byte`](Self::read_byte)/[`write_byte`](Self::write_byte).
pub trait MmioDevice: Send {
    /// First physical address claimed by this device.
    fn base(&self) -> u32;

    /// Extent of the device window in bytes.
    fn size(&self) -> u32;

    /// Reads the word at `offset`.
    fn read_word(&mut self, offset: u32) -> u32;

    /// Writes the word at `offset`.
    fn write_word(&mut self, offset: u32, value: u32);

    /// Reads the byte at `offset`.
    fn read_byte(&mut self, offset: u32) -> u8 {
        read_byte_via_word(self, offset)
    }

    /// Writes the byte at `offset`.
    fn write_byte(&mut self, offset: u32, value: u8) {
        write_byte_via_word(self, offset, value);
    }

    /// Advances device time by one executed CPU step.
    fn tick(&mut self) {}

    /// Returns `true` when `phys` falls inside this device's window.
    fn contains(&self, phys: u32) -> bool {
        phys.checked_sub(self.base())
            .is_some_and(|offset| offset < self.size())
    }
}

/// Byte offset 0 is the least significant byte of the aligned word.
const fn lane_shift(offset: u32) -> u32 {
    (offset & 3) * 8
}

/// Reads one byte out of the aligned word containing `offset`.
#[allow(clippy::cast_possible_truncation)]
pub fn read_byte_via_word<D: MmioDevice + ?Sized>(device: &mut D, offset: u32) -> u8 {
    let word = device.read_word(offset & !3);
    (word >> lane_shift(offset)) as u8
}

/// Read-modify-writes one byte lane of the aligned word containing `offset`.
pub fn write_byte_via_word<D: MmioDevice + ?Sized>(device: &mut D, offset: u32, value: u8) {
    let aligned = offset & !3;
    let shift = lane_shift(offset);
    let word = device.read_word(aligned);
    let merged = (word & !(0xFF << shift)) | (u32::from(value) << shift);
    device.write_word(aligned, merged);
}

/// Ordered device list covering the MMIO window.
///
/// Lookup is a linear scan; the first device whose range contains the address
/// wins. Unmapped reads return 0 and unmapped writes are dropped, both logged.
#[derive(Default)]
pub struct MmioBus {
    devices: Vec<Box<dyn MmioDevice>>,
}

impl MmioBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a device; earlier registrations win on overlap.
    pub fn register(&mut self, device: Box<dyn MmioDevice>) {
        log::debug!(
            "mmio device registered at {:#010x} (+{:#x})",
            device.base(),
            device.size()
        );
        self.devices.push(device);
    }

    /// Number of registered devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Returns `true` when no device is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    fn find(&mut self, phys: u32) -> Option<(&mut Box<dyn MmioDevice>, u32)> {
        self.devices
            .iter_mut()
            .find(|device| device.contains(phys))
            .map(|device| {
                let offset = phys - device.base();
                (device, offset)
            })
    }

    /// Returns `true` when a single device covers all four bytes of the word at `phys`.
    #[must_use]
    pub fn maps_word(&self, phys: u32) -> bool {
        let Some(last) = phys.checked_add(3) else {
            return false;
        };
        self.devices
            .iter()
            .find(|device| device.contains(phys))
            .is_some_and(|device| device.contains(last))
    }

    /// Reads a word from the device mapped at `phys`.
    pub fn read_word(&mut self, phys: u32) -> u32 {
        if let Some((device, offset)) = self.find(phys) {
            device.read_word(offset)
        } else {
            log::warn!("unmapped mmio word read at {phys:#010x}");
            0
        }
    }

    /// Writes a word to the device mapped at `phys`.
    pub fn write_word(&mut self, phys: u32, value: u32) {
        if let Some((device, offset)) = self.find(phys) {
            device.write_word(offset, value);
        } else {
            log::warn!("unmapped mmio word write of {value:#010x} at {phys:#010x}");
        }
    }

    /// Reads a byte from the device mapped at `phys`.
    pub fn read_byte(&mut self, phys: u32) -> u8 {
        if let Some((device, offset)) = self.find(phys) {
            device.read_byte(offset)
        } else {
            log::warn!("unmapped mmio byte read at {phys:#010x}");
            0
        }
    }

    /// Writes a byte to the device mapped at `phys`.
    pub fn write_byte(&mut self, phys: u32, value: u8) {
        if let Some((device, offset)) = self.find(phys) {
            device.write_byte(offset, value);
        } else {
            log::warn!("unmapped mmio byte write of {value:#04x} at {phys:#010x}");
        }
    }

    /// Ticks every device once, in registration order.
    pub fn tick(&mut self) {
        for device in &mut self.devices {
            device.tick();
        }
    }
}

impl std::fmt::Debug for MmioBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.devices
                    .iter()
                    .map(|device| (device.base(), device.size())),
            )
            .finish()
    }
}
