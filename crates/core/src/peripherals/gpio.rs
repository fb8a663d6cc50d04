//! GPIO port emulation.
//!
//! Each port is a DDRx/PORTx/PINx register triad in the I/O space. Pins have
//! no storage of their own: [`GpioPort::pin`] recomputes a [`PinState`] from
//! the three registers every time it is called.
//!
//! When PINx or PORTx is written, [`GpioPort::value_changed`] raises one
//! port-level event and, if the value differs, one pin-level event for every
//! pin the port owns. Pins whose bit did not flip are notified as well, with
//! `old == new`.

use crate::memory::AddressSpace;

/// Port identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortId {
    B,
    C,
    D,
}

impl PortId {
    pub const ALL: [PortId; 3] = [PortId::B, PortId::C, PortId::D];

    pub fn letter(self) -> char {
        match self {
            PortId::B => 'B',
            PortId::C => 'C',
            PortId::D => 'D',
        }
    }
}

/// Register addresses for one port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioAddrs {
    pub pin: u16,
    pub ddr: u16,
    pub port: u16,
    /// Pins bonded out on the package
    pub pin_count: u8,
}

impl GpioAddrs {
    pub const PORTB: GpioAddrs = GpioAddrs { pin: 0x23, ddr: 0x24, port: 0x25, pin_count: 8 };
    pub const PORTC: GpioAddrs = GpioAddrs { pin: 0x26, ddr: 0x27, port: 0x28, pin_count: 7 };
    pub const PORTD: GpioAddrs = GpioAddrs { pin: 0x29, ddr: 0x2A, port: 0x2B, pin_count: 8 };

    pub fn for_port(id: PortId) -> GpioAddrs {
        match id {
            PortId::B => Self::PORTB,
            PortId::C => Self::PORTC,
            PortId::D => Self::PORTD,
        }
    }
}

/// Port-level change: old and new value of the PINx or PORTx register written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortChange {
    pub old: u8,
    pub new: u8,
}

/// Pin-level change for the bit selected by `mask`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinChange {
    pub mask: u8,
    pub old: bool,
    pub new: bool,
}

/// Snapshot of one pin, derived from the port registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinState {
    pub mask: u8,
    /// DDRx bit set
    pub is_output: bool,
    /// PORTx bit (drive level or pull-up enable)
    pub output: bool,
    /// PINx bit
    pub input: bool,
}

impl PinState {
    /// Level seen on the pin: the driven value for outputs, the input bit otherwise.
    pub fn level(&self) -> bool {
        if self.is_output { self.output } else { self.input }
    }
}

pub type PortListener = Box<dyn FnMut(PortChange) + Send>;
pub type PinListener = Box<dyn FnMut(PinChange) + Send>;

pub struct GpioPort {
    id: PortId,
    addrs: GpioAddrs,
    port_listeners: Vec<PortListener>,
    pin_listeners: [Vec<PinListener>; 8],
}

impl GpioPort {
    pub fn new(id: PortId) -> Self {
        GpioPort {
            id,
            addrs: GpioAddrs::for_port(id),
            port_listeners: Vec::new(),
            pin_listeners: Default::default(),
        }
    }

    pub fn id(&self) -> PortId {
        self.id
    }

    pub fn addrs(&self) -> &GpioAddrs {
        &self.addrs
    }

    pub fn pin_count(&self) -> u8 {
        self.addrs.pin_count
    }

    /// True for the registers whose writes fan out (PINx and PORTx, not DDRx).
    pub fn watches(&self, addr: u16) -> bool {
        addr == self.addrs.pin || addr == self.addrs.port
    }

    /// Derived view of pin `index`.
    ///
    /// # Panics
    ///
    /// If `index` is not a pin of this port.
    pub fn pin(&self, index: u8, regs: &AddressSpace) -> PinState {
        let mask = self.mask(index);
        PinState {
            mask,
            is_output: regs.read(self.addrs.ddr) & mask != 0,
            output: regs.read(self.addrs.port) & mask != 0,
            input: regs.read(self.addrs.pin) & mask != 0,
        }
    }

    pub fn on_port_change(&mut self, listener: PortListener) {
        self.port_listeners.push(listener);
    }

    /// # Panics
    ///
    /// If `index` is not a pin of this port.
    pub fn on_pin_change(&mut self, index: u8, listener: PinListener) {
        self.mask(index);
        self.pin_listeners[index as usize].push(listener);
    }

    /// Fan a PINx/PORTx change out to port and pin listeners.
    pub fn value_changed(&mut self, old: u8, new: u8) {
        for listener in self.port_listeners.iter_mut() {
            listener(PortChange { old, new });
        }
        if old == new {
            return;
        }
        for index in 0..self.addrs.pin_count {
            let mask = 1u8 << index;
            let change = PinChange { mask, old: old & mask != 0, new: new & mask != 0 };
            for listener in self.pin_listeners[index as usize].iter_mut() {
                listener(change);
            }
        }
    }

    fn mask(&self, index: u8) -> u8 {
        assert!(
            index < self.addrs.pin_count,
            "port {} has no pin {}",
            self.id.letter(),
            index
        );
        1 << index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_pin_view_tracks_registers() {
        let port = GpioPort::new(PortId::B);
        let mut regs = AddressSpace::new();
        regs.write(0x24, 0x20); // DDRB: PB5 output
        regs.write(0x25, 0x21); // PORTB
        regs.write(0x23, 0x01); // PINB
        let pb5 = port.pin(5, &regs);
        assert!(pb5.is_output && pb5.output && !pb5.input);
        assert!(pb5.level());
        let pb0 = port.pin(0, &regs);
        assert!(!pb0.is_output && pb0.output && pb0.input);
        assert!(pb0.level());

        regs.write(0x25, 0x01);
        assert!(!port.pin(5, &regs).level());
    }

    #[test]
    fn test_watches_pin_and_port_not_ddr() {
        let port = GpioPort::new(PortId::D);
        assert!(port.watches(0x29));
        assert!(port.watches(0x2B));
        assert!(!port.watches(0x2A));
    }

    #[test]
    fn test_unchanged_value_only_raises_port_event() {
        let mut port = GpioPort::new(PortId::C);
        let ports = Arc::new(Mutex::new(0));
        let pins = Arc::new(Mutex::new(0));
        let p = ports.clone();
        port.on_port_change(Box::new(move |_| *p.lock().unwrap() += 1));
        for i in 0..7 {
            let p = pins.clone();
            port.on_pin_change(i, Box::new(move |_| *p.lock().unwrap() += 1));
        }
        port.value_changed(0x10, 0x10);
        assert_eq!(*ports.lock().unwrap(), 1);
        assert_eq!(*pins.lock().unwrap(), 0);

        port.value_changed(0x10, 0x11);
        assert_eq!(*ports.lock().unwrap(), 2);
        assert_eq!(*pins.lock().unwrap(), 7);
    }

    #[test]
    #[should_panic(expected = "port C has no pin 7")]
    fn test_port_c_has_seven_pins() {
        let port = GpioPort::new(PortId::C);
        port.pin(7, &AddressSpace::new());
    }
}
