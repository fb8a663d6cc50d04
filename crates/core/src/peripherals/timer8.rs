//! 8-bit Timer/Counter emulation.
//!
//! Normal mode only: the counter counts up from TCNT to 0xFF, wraps to 0 and
//! raises the overflow flag in TIFR. The clock-select bits of TCCRB pick the
//! prescaler (1/8/64/256/1024); external clock sources are not emulated and
//! leave the timer stalled.
//!
//! The register addresses are supplied through [`Timer8Addrs`] so the same
//! counter logic can back any 8-bit timer in the map.

use crate::memory::{AddressSpace, RegisterWrites};

/// Timer/Counter0 control register B
pub const TCCR0B: u16 = 0x45;
/// Timer/Counter0 counter
pub const TCNT0: u16 = 0x46;
/// Timer/Counter0 interrupt flag register
pub const TIFR0: u16 = 0x35;

/// Overflow flag bit in TIFR
pub const TOV: u8 = 0x01;
/// Clock-select field of TCCRB
const CS_MASK: u8 = 0x07;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer8Addrs {
    pub tccr_b: u16,
    pub tcnt: u16,
    pub tifr: u16,
}

impl Timer8Addrs {
    pub const TIMER0: Timer8Addrs = Timer8Addrs { tccr_b: TCCR0B, tcnt: TCNT0, tifr: TIFR0 };
}

pub struct Timer8 {
    addrs: Timer8Addrs,
    /// Clock cycles not yet worth a full counter tick
    prescaler: u32,
}

impl Timer8 {
    pub fn new(addrs: Timer8Addrs) -> Self {
        Timer8 { addrs, prescaler: 0 }
    }

    pub fn reset(&mut self) {
        *self = Timer8::new(self.addrs);
    }

    pub fn addrs(&self) -> &Timer8Addrs {
        &self.addrs
    }

    /// Prescaler divider for a clock-select value; `None` when the counter
    /// does not run off the system clock.
    pub fn divider(cs: u8) -> Option<u32> {
        match cs & CS_MASK {
            1 => Some(1),
            2 => Some(8),
            3 => Some(64),
            4 => Some(256),
            5 => Some(1024),
            _ => None, // stopped, or external clock (not emulated)
        }
    }

    /// Feed `cycles` system clocks through the prescaler and return how many
    /// counter increments are now due.
    pub fn advance(&mut self, cycles: u32, regs: &AddressSpace) -> u32 {
        let divider = match Self::divider(regs.read(self.addrs.tccr_b)) {
            Some(d) => d,
            None => return 0,
        };
        self.prescaler = self.prescaler.saturating_add(cycles);
        if self.prescaler < divider {
            return 0;
        }
        let ticks = self.prescaler / divider;
        self.prescaler %= divider;
        ticks
    }

    /// Stores for one counter increment, computed from the current TCNT.
    pub fn increment(&self, regs: &AddressSpace) -> RegisterWrites {
        let mut writes = RegisterWrites::new();
        let tcnt = regs.read(self.addrs.tcnt);
        if tcnt == 0xFF {
            writes.push(self.addrs.tcnt, 0);
            writes.push(self.addrs.tifr, regs.read(self.addrs.tifr) | TOV);
        } else {
            writes.push(self.addrs.tcnt, tcnt + 1);
        }
        writes
    }

    pub fn prescaler(&self) -> u32 {
        self.prescaler
    }

    pub(crate) fn set_prescaler(&mut self, value: u32) {
        self.prescaler = value;
    }
}
