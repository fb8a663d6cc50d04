//! ATmega328 memory subsystem.
//!
//! The data space follows the AVR unified layout:
//!
//! | Address Range | Content                      |
//! |---------------|------------------------------|
//! | 0x0000–0x001F | General registers R0–R31     |
//! | 0x0020–0x005F | I/O registers                |
//! | 0x0060–0x00FF | Extended I/O registers       |
//! | 0x0100–0x08FF | SRAM (2048 bytes)            |
//!
//! Flash (32 KB) and EEPROM (1 KB) are separate address spaces. The EEPROM
//! image is owned by [`crate::peripherals::EepromCtrl`].
//!
//! Every store into the data space goes through [`AddressSpace::write`], which
//! hands back a [`RegisterChange`] describing the mutation. The caller decides
//! what reacts to it; see [`crate::Atmega328::write`].

use crate::error::{Error, Result};
use crate::{DATA_SIZE, FLASH_SIZE};

/// An inclusive, named sub-range of the data space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub name: &'static str,
    pub start: u16,
    pub end: u16,
}

impl Region {
    pub const fn new(name: &'static str, start: u16, end: u16) -> Self {
        Region { name, start, end }
    }

    #[inline(always)]
    pub fn contains(&self, addr: u16) -> bool {
        addr >= self.start && addr <= self.end
    }

    /// Number of bytes covered, ends included. Zero when `start > end`.
    pub fn size(&self) -> usize {
        (self.end as usize + 1).saturating_sub(self.start as usize)
    }

    fn overlaps(&self, other: &Region) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Named regions of the data space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub registers: Region,
    pub io: Region,
    pub ext_io: Region,
    pub sram: Region,
}

impl Layout {
    /// ATmega328 data-space layout.
    pub const ATMEGA328: Layout = Layout {
        registers: Region::new("registers", 0x0000, 0x001F),
        io: Region::new("io", 0x0020, 0x005F),
        ext_io: Region::new("ext_io", 0x0060, 0x00FF),
        sram: Region::new("sram", 0x0100, 0x08FF),
    };

    pub fn regions(&self) -> [Region; 4] {
        [self.registers, self.io, self.ext_io, self.sram]
    }

    /// Check that every region fits in `size` bytes and no two overlap.
    pub fn validate(&self, size: usize) -> Result<()> {
        let regions = self.regions();
        for r in &regions {
            if r.start > r.end || r.end as usize >= size {
                return Err(Error::RegionOutOfBounds { name: r.name, start: r.start, end: r.end, size });
            }
        }
        for (i, a) in regions.iter().enumerate() {
            for b in &regions[i + 1..] {
                if a.overlaps(b) {
                    return Err(Error::RegionsOverlap { first: a.name, second: b.name });
                }
            }
        }
        Ok(())
    }
}

impl Default for Layout {
    fn default() -> Self {
        Layout::ATMEGA328
    }
}

/// The outcome of a single data-space store.
///
/// Emitted for every write, including ones that store the value already held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterChange {
    pub addr: u16,
    pub old: u8,
    pub new: u8,
}

impl RegisterChange {
    pub fn changed(&self) -> bool {
        self.old != self.new
    }
}

/// A store a peripheral wants committed to the data space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterWrite {
    pub addr: u16,
    pub value: u8,
}

const MAX_WRITES: usize = 4;

/// Ordered, fixed-capacity list of [`RegisterWrite`]s.
///
/// Peripherals never store into the data space themselves. They read it,
/// decide, and return the stores; [`crate::Atmega328`] commits them through
/// its dispatching write so nested side effects fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegisterWrites {
    slots: [RegisterWrite; MAX_WRITES],
    len: usize,
}

impl RegisterWrites {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, addr: u16, value: u8) {
        assert!(self.len < MAX_WRITES, "too many register writes queued by one peripheral update");
        self.slots[self.len] = RegisterWrite { addr, value };
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[RegisterWrite] {
        &self.slots[..self.len]
    }
}

impl IntoIterator for RegisterWrites {
    type Item = RegisterWrite;
    type IntoIter = std::iter::Take<std::array::IntoIter<RegisterWrite, MAX_WRITES>>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots.into_iter().take(self.len)
    }
}

/// Unified data space: registers + I/O + extended I/O + SRAM.
pub struct AddressSpace {
    data: Vec<u8>,
    layout: Layout,
}

impl AddressSpace {
    /// ATmega328 data space, zero-filled.
    pub fn new() -> Self {
        AddressSpace { data: vec![0u8; DATA_SIZE], layout: Layout::ATMEGA328 }
    }

    /// Data space of `size` bytes partitioned by `layout`.
    pub fn with_layout(size: usize, layout: Layout) -> Result<Self> {
        layout.validate(size)?;
        Ok(AddressSpace { data: vec![0u8; size], layout })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read a byte.
    ///
    /// # Panics
    ///
    /// If `addr` lies outside the data space. That is an executor defect, not
    /// emulated hardware behaviour.
    #[inline(always)]
    pub fn read(&self, addr: u16) -> u8 {
        let a = addr as usize;
        assert!(a < self.data.len(), "data-space read at {:#06x} is out of bounds ({:#06x} bytes)", addr, self.data.len());
        self.data[a]
    }

    /// Store a byte and report the change.
    ///
    /// # Panics
    ///
    /// If `addr` lies outside the data space.
    #[inline(always)]
    pub fn write(&mut self, addr: u16, value: u8) -> RegisterChange {
        let a = addr as usize;
        assert!(a < self.data.len(), "data-space write at {:#06x} is out of bounds ({:#06x} bytes)", addr, self.data.len());
        let old = self.data[a];
        self.data[a] = value;
        RegisterChange { addr, old, new: value }
    }

    /// Read a general register R0–R31.
    #[inline(always)]
    pub fn reg(&self, r: u8) -> u8 {
        self.read(self.layout.registers.start + r as u16)
    }

    /// Read a little-endian 16-bit register pair (`lo` at `addr`, `hi` at `addr + 1`).
    pub fn read_word(&self, addr: u16) -> u16 {
        self.read(addr) as u16 | ((self.read(addr + 1) as u16) << 8)
    }

    /// Whole data space, for debugger views and snapshots.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Zero the data space (power-on state). Does not report changes.
    pub(crate) fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Overwrite the data space from a snapshot. Does not report changes.
    pub(crate) fn restore(&mut self, data: &[u8]) -> Result<()> {
        if data.len() != self.data.len() {
            return Err(Error::SnapshotMismatch { what: "data space", expected: self.data.len(), found: data.len() });
        }
        self.data.copy_from_slice(data);
        Ok(())
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

/// Program memory (flash), filled from a flat image by the loader.
pub struct ProgramMemory {
    bytes: Vec<u8>,
}

impl ProgramMemory {
    pub fn new() -> Self {
        ProgramMemory { bytes: vec![0u8; FLASH_SIZE] }
    }

    /// Replace flash contents with `image`; the remainder is zeroed.
    ///
    /// Returns the number of bytes loaded.
    pub fn load(&mut self, image: &[u8]) -> Result<usize> {
        if image.len() > self.bytes.len() {
            return Err(Error::ProgramTooLarge { len: image.len(), capacity: self.bytes.len() });
        }
        self.bytes[..image.len()].copy_from_slice(image);
        self.bytes[image.len()..].fill(0);
        Ok(image.len())
    }

    /// Read 16-bit word from flash at word address
    #[inline(always)]
    pub fn read_program_word(&self, word_addr: usize) -> u16 {
        let byte_addr = word_addr * 2;
        if byte_addr + 1 < self.bytes.len() {
            self.bytes[byte_addr] as u16 | ((self.bytes[byte_addr + 1] as u16) << 8)
        } else {
            0
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl Default for ProgramMemory {
    fn default() -> Self {
        Self::new()
    }
}
