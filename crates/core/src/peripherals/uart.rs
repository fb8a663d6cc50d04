//! USART0 emulation.
//!
//! Transmission is instant: a UDR0 write with TXEN0 set hands the byte to
//! every transmit listener, appends it to the transmit buffer and sets TXC0
//! and UDRE0 in UCSR0A. Reception is driven by the host through
//! [`crate::Atmega328::uart_receive`]; with RXEN0 set the byte lands in UDR0
//! and RXC0 is raised, otherwise it is dropped.
//!
//! The UDR0 store made by reception is dispatched like any other write, so
//! with TXEN0 also set the received byte goes straight back out.

use crate::memory::{AddressSpace, RegisterWrites};

pub const UCSR0A: u16 = 0xC0;
pub const UCSR0B: u16 = 0xC1;
pub const UDR0: u16 = 0xC6;

/// Receive complete (UCSR0A)
pub const RXC0: u8 = 0x80;
/// Transmit complete (UCSR0A)
pub const TXC0: u8 = 0x40;
/// Data register empty (UCSR0A)
pub const UDRE0: u8 = 0x20;
/// Receiver enable (UCSR0B)
pub const RXEN0: u8 = 0x10;
/// Transmitter enable (UCSR0B)
pub const TXEN0: u8 = 0x08;

pub type TransmitListener = Box<dyn FnMut(u8) + Send>;

pub struct Uart {
    listeners: Vec<TransmitListener>,
    /// Bytes transmitted since the last [`Uart::take_transmitted`]
    tx_buf: Vec<u8>,
}

impl Uart {
    pub fn new() -> Self {
        Uart { listeners: Vec::new(), tx_buf: Vec::new() }
    }

    /// Power-on state. Listeners stay subscribed.
    pub fn reset(&mut self) {
        self.tx_buf.clear();
    }

    /// UCSR0A store that marks the transmitter idle.
    pub fn power_on(regs: &AddressSpace) -> RegisterWrites {
        let mut writes = RegisterWrites::new();
        writes.push(UCSR0A, regs.read(UCSR0A) | UDRE0);
        writes
    }

    pub fn subscribe(&mut self, listener: TransmitListener) {
        self.listeners.push(listener);
    }

    /// React to a UDR0 write.
    pub fn on_data_write(&mut self, regs: &AddressSpace) -> RegisterWrites {
        let mut writes = RegisterWrites::new();
        if regs.read(UCSR0B) & TXEN0 == 0 {
            return writes;
        }
        let byte = regs.read(UDR0);
        tracing::trace!(byte, "UART transmit");
        for listener in self.listeners.iter_mut() {
            listener(byte);
        }
        self.tx_buf.push(byte);
        writes.push(UCSR0A, regs.read(UCSR0A) | TXC0 | UDRE0);
        writes
    }

    /// UDR0 store for a byte arriving on RXD0; empty when the receiver is off.
    ///
    /// Once that store has been committed, [`Uart::receive_complete`] raises RXC0.
    pub fn receive(byte: u8, regs: &AddressSpace) -> RegisterWrites {
        let mut writes = RegisterWrites::new();
        if regs.read(UCSR0B) & RXEN0 == 0 {
            return writes;
        }
        tracing::trace!(byte, "UART receive");
        writes.push(UDR0, byte);
        writes
    }

    pub fn receive_complete(regs: &AddressSpace) -> RegisterWrites {
        let mut writes = RegisterWrites::new();
        writes.push(UCSR0A, regs.read(UCSR0A) | RXC0);
        writes
    }

    /// Take and clear accumulated transmitted bytes.
    pub fn take_transmitted(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.tx_buf)
    }
}

impl Default for Uart {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_transmit_gated_by_txen() {
        let mut uart = Uart::new();
        let mut regs = AddressSpace::new();
        regs.write(UDR0, b'A');
        assert!(uart.on_data_write(&regs).is_empty());
        assert!(uart.take_transmitted().is_empty());

        regs.write(UCSR0B, TXEN0);
        let w = uart.on_data_write(&regs);
        assert_eq!(w.as_slice()[0].addr, UCSR0A);
        assert_eq!(w.as_slice()[0].value, TXC0 | UDRE0);
        assert_eq!(uart.take_transmitted(), b"A");
    }

    #[test]
    fn test_listener_sees_byte() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut uart = Uart::new();
        uart.subscribe(Box::new(move |b| sink.lock().unwrap().push(b)));
        let mut regs = AddressSpace::new();
        regs.write(UCSR0B, TXEN0);
        regs.write(UDR0, 0x42);
        uart.on_data_write(&regs);
        assert_eq!(*seen.lock().unwrap(), vec![0x42]);
    }

    #[test]
    fn test_receive_gated_by_rxen() {
        let mut regs = AddressSpace::new();
        regs.write(UCSR0A, UDRE0);
        assert!(Uart::receive(b'x', &regs).is_empty());

        regs.write(UCSR0B, RXEN0);
        let v: Vec<_> = Uart::receive(b'x', &regs).into_iter().map(|w| (w.addr, w.value)).collect();
        assert_eq!(v, vec![(UDR0, b'x')]);
        let w = Uart::receive_complete(&regs);
        assert_eq!((w.as_slice()[0].addr, w.as_slice()[0].value), (UCSR0A, UDRE0 | RXC0));
    }

    #[test]
    fn test_received_byte_is_retransmitted_with_txen() {
        let mut uart = Uart::new();
        let mut regs = AddressSpace::new();
        regs.write(UCSR0B, TXEN0 | RXEN0);
        for w in Uart::receive(b'r', &regs) {
            regs.write(w.addr, w.value);
        }
        let w = uart.on_data_write(&regs);
        assert_eq!(w.as_slice()[0].value, TXC0 | UDRE0);
        assert_eq!(uart.take_transmitted(), b"r");
    }
}
