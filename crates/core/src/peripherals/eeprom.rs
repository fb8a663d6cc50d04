//! EEPROM controller emulation.
//!
//! The ATmega328 has 1 KB of EEPROM accessible through registers:
//! EECR (0x3F), EEDR (0x40), EEARL (0x41), EEARH (0x42).
//!
//! A write to EECR runs [`EepromCtrl::update`]:
//!
//! - EERE copies the addressed byte into EEDR and strobes itself off.
//! - EEPE commits EEDR to the image only when EEMPE is also set, then clears
//!   both. Without EEMPE the write is dropped and only EEPE is cleared.
//!
//! The image lives here, outside the data space, and survives CPU reset.

use crate::error::{Error, Result};
use crate::memory::{AddressSpace, RegisterWrites};
use crate::EEPROM_SIZE;

pub const EECR: u16 = 0x3F;
pub const EEDR: u16 = 0x40;
pub const EEARL: u16 = 0x41;
pub const EEARH: u16 = 0x42;

/// Read enable
pub const EERE: u8 = 0x01;
/// Write enable
pub const EEPE: u8 = 0x02;
/// Master write enable (write interlock)
pub const EEMPE: u8 = 0x04;

pub struct EepromCtrl {
    image: Vec<u8>,
    /// Set when a committed write changed the image
    pub dirty: bool,
}

impl EepromCtrl {
    /// 1 KB image in the erased state (all 0xFF).
    pub fn new() -> Self {
        EepromCtrl { image: vec![0xFF; EEPROM_SIZE], dirty: false }
    }

    /// `size` must be a non-zero power of two so EEAR can be masked into range.
    pub fn with_size(size: usize, fill: u8) -> Result<Self> {
        if size == 0 || !size.is_power_of_two() {
            return Err(Error::EepromSizeNotPowerOfTwo(size));
        }
        Ok(EepromCtrl { image: vec![fill; size], dirty: false })
    }

    /// Current EEAR, masked into the image.
    pub fn address(&self, regs: &AddressSpace) -> usize {
        let ea = regs.read(EEARL) as usize | ((regs.read(EEARH) as usize) << 8);
        ea & (self.image.len() - 1)
    }

    /// React to an EECR write. Returns the register stores to commit: EEDR
    /// first when a read happened, then EECR with the strobed bits cleared.
    pub fn update(&mut self, regs: &AddressSpace) -> RegisterWrites {
        let mut writes = RegisterWrites::new();
        let eecr = regs.read(EECR);
        if eecr & (EERE | EEPE) == 0 {
            return writes;
        }
        let addr = self.address(regs);
        let mut control = eecr;
        let mut data = regs.read(EEDR);

        if eecr & EERE != 0 {
            data = self.image[addr];
            writes.push(EEDR, data);
            control &= !EERE;
        }

        if eecr & EEPE != 0 {
            if eecr & EEMPE != 0 {
                if self.image[addr] != data {
                    self.dirty = true;
                }
                self.image[addr] = data;
                tracing::debug!(addr, data, "EEPROM write committed");
                control &= !(EEPE | EEMPE);
            } else {
                control &= !EEPE;
            }
        }

        writes.push(EECR, control);
        writes
    }

    /// Overwrite the start of the image with `data`. The rest keeps its contents.
    pub fn load(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > self.image.len() {
            return Err(Error::EepromImageTooLarge { len: data.len(), capacity: self.image.len() });
        }
        self.image[..data.len()].copy_from_slice(data);
        self.dirty = false;
        Ok(())
    }

    pub(crate) fn restore(&mut self, data: &[u8]) -> Result<()> {
        if data.len() != self.image.len() {
            return Err(Error::SnapshotMismatch { what: "EEPROM", expected: self.image.len(), found: data.len() });
        }
        self.image.copy_from_slice(data);
        Ok(())
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }

    pub fn len(&self) -> usize {
        self.image.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }
}

impl Default for EepromCtrl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(addr: u16, eedr: u8, eecr: u8) -> AddressSpace {
        let mut regs = AddressSpace::new();
        regs.write(EEARL, addr as u8);
        regs.write(EEARH, (addr >> 8) as u8);
        regs.write(EEDR, eedr);
        regs.write(EECR, eecr);
        regs
    }

    fn pairs(w: RegisterWrites) -> Vec<(u16, u8)> {
        w.into_iter().map(|w| (w.addr, w.value)).collect()
    }

    #[test]
    fn test_size_must_be_power_of_two() {
        assert!(EepromCtrl::with_size(4096, 0xFF).is_ok());
        assert!(matches!(EepromCtrl::with_size(1000, 0xFF), Err(Error::EepromSizeNotPowerOfTwo(1000))));
        assert!(EepromCtrl::with_size(0, 0xFF).is_err());
        assert_eq!(EepromCtrl::new().len(), 1024);
    }

    #[test]
    fn test_read_strobe() {
        let mut ee = EepromCtrl::new();
        ee.load(&[0; 0x10]).unwrap();
        ee.image[0x10] = 0x5A;
        let regs = setup(0x10, 0, EERE);
        assert_eq!(pairs(ee.update(&regs)), vec![(EEDR, 0x5A), (EECR, 0)]);
    }

    #[test]
    fn test_address_is_masked() {
        let mut ee = EepromCtrl::with_size(1024, 0).unwrap();
        ee.image[0x001] = 0x77;
        // 0x0401 masks to 0x001 in a 1 KB image
        let regs = setup(0x0401, 0, EERE);
        assert_eq!(ee.address(&regs), 0x001);
        assert_eq!(pairs(ee.update(&regs))[0], (EEDR, 0x77));
    }

    #[test]
    fn test_write_without_interlock_is_dropped() {
        let mut ee = EepromCtrl::new();
        let regs = setup(0x20, 0x12, EEPE | 0x08);
        assert_eq!(pairs(ee.update(&regs)), vec![(EECR, 0x08)]);
        assert_eq!(ee.image()[0x20], 0xFF);
        assert!(!ee.dirty);
    }

    #[test]
    fn test_write_with_interlock() {
        let mut ee = EepromCtrl::new();
        let regs = setup(0x3FF, 0x12, EEPE | EEMPE);
        assert_eq!(pairs(ee.update(&regs)), vec![(EECR, 0)]);
        assert_eq!(ee.image()[0x3FF], 0x12);
        assert!(ee.dirty);
    }

    #[test]
    fn test_read_then_write_in_one_update() {
        let mut ee = EepromCtrl::new();
        ee.image[4] = 0x33;
        let regs = setup(4, 0x99, EERE | EEPE | EEMPE);
        // The read lands in EEDR before the write commits it back
        assert_eq!(pairs(ee.update(&regs)), vec![(EEDR, 0x33), (EECR, 0)]);
        assert_eq!(ee.image()[4], 0x33);
    }

    #[test]
    fn test_no_action_bits_is_inert() {
        let mut ee = EepromCtrl::new();
        let regs = setup(4, 0x99, EEMPE);
        assert!(ee.update(&regs).is_empty());
    }

    #[test]
    fn test_load_too_large() {
        let mut ee = EepromCtrl::with_size(16, 0xFF).unwrap();
        assert!(matches!(ee.load(&[0; 17]), Err(Error::EepromImageTooLarge { len: 17, capacity: 16 })));
        ee.load(&[1, 2]).unwrap();
        assert_eq!(&ee.image()[..3], &[1, 2, 0xFF]);
    }
}
