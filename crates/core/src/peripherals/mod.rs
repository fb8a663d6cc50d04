//! ATmega328 peripheral emulation.
//!
//! Each peripheral reads the shared [`AddressSpace`](crate::memory::AddressSpace)
//! and returns the register stores it wants made as
//! [`RegisterWrites`](crate::memory::RegisterWrites); none of them keeps a
//! private copy of a register. [`crate::Atmega328`] commits the stores through
//! its dispatching write.
//!
//! - [`Timer8`]: 8-bit Timer/Counter0 (prescaler, overflow flag)
//! - [`EepromCtrl`]: EEPROM read/write controller with the EEMPE interlock
//! - [`Adc`]: Analog-to-digital converter fed by a host voltage
//! - [`Uart`]: USART0 transmit/receive handshake
//! - [`GpioPort`]: Ports B, C and D with derived pin views
//! - [`Dac`]: Virtual DAC output register

mod timer8;
mod eeprom;
mod adc;
mod uart;
mod dac;
pub mod gpio;

pub use timer8::{Timer8, Timer8Addrs, TCCR0B, TCNT0, TIFR0, TOV};
pub use eeprom::{EepromCtrl, EEARH, EEARL, EECR, EEDR, EEMPE, EEPE, EERE};
pub use adc::{Adc, ADCH, ADCL, ADCSRA, ADIF, ADLAR, ADMUX, ADSC, VREF};
pub use uart::{Uart, TransmitListener, RXC0, RXEN0, TXC0, TXEN0, UCSR0A, UCSR0B, UDR0, UDRE0};
pub use dac::{Dac, DAC_OUT};
pub use gpio::{GpioAddrs, GpioPort, PinChange, PinListener, PinState, PortChange, PortId, PortListener};
