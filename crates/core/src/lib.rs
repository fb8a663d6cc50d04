//! # avr-periph-core
//!
//! Memory-mapped peripheral emulation for the ATmega328 microcontroller.
//!
//! The core models Timer/Counter0, the ADC, the EEPROM controller, USART0 and
//! GPIO ports B/C/D as independent state machines sharing one data space. It
//! does not decode instructions: an external executor reads and writes the
//! data space through [`Atmega328`] and calls [`Atmega328::step`] once per
//! executed instruction.
//!
//! ## Architecture
//!
//! - [`Atmega328`]: Owns the data space and every peripheral, and dispatches writes
//! - [`memory`]: Data space with named regions, program memory
//! - [`peripherals`]: Timer8, EEPROM, ADC, USART, GPIO, virtual DAC
//! - [`config`]: EEPROM geometry, initial analog input, rewind depth
//! - [`snapshot`]: In-session snapshots and rewind history
//!
//! ## Write dispatch
//!
//! Every store goes through [`Atmega328::write`]. After the byte is stored the
//! resulting [`RegisterChange`] is routed by address:
//!
//! | Address            | Reaction                          |
//! |--------------------|-----------------------------------|
//! | PINx / PORTx (B/C/D) | port and pin change fan-out     |
//! | ADCSRA (0x7A)      | ADC conversion                    |
//! | EECR (0x3F)        | EEPROM read / write               |
//! | 0xFE               | virtual DAC output                |
//! | UDR0 (0xC6)        | USART transmit                    |
//!
//! Peripherals commit their own register updates through the same write, so
//! their stores are dispatched too. Each peripheral clears its action bits in
//! that store, so a peripheral re-entered by its own write does nothing.
//!
//! The core is synchronous and does no locking. `Atmega328` is `Send`; a host
//! that injects UART bytes from another thread wraps it in a mutex.

pub mod config;
pub mod error;
pub mod memory;
pub mod peripherals;
pub mod snapshot;

pub use config::Config;
pub use error::{Error, Result};
pub use memory::{AddressSpace, Layout, ProgramMemory, Region, RegisterChange, RegisterWrite, RegisterWrites};
pub use peripherals::{PinChange, PinState, PortChange, PortId};
pub use snapshot::Snapshot;

use peripherals::{Adc, Dac, EepromCtrl, GpioPort, Timer8, Timer8Addrs, Uart};
use snapshot::RewindBuffer;

// ATmega328 constants
/// Flash memory size: 32 KB
pub const FLASH_SIZE: usize = 32 * 1024;
/// SRAM size: 2 KB
pub const SRAM_SIZE: usize = 2 * 1024;
/// EEPROM size: 1 KB
pub const EEPROM_SIZE: usize = 1024;

/// Number of general-purpose registers (R0–R31)
pub const REG_COUNT: usize = 32;
/// I/O register space size (0x20..0x5F)
pub const IO_SIZE: usize = 64;
/// Extended I/O register space size (0x60..0xFF)
pub const EXT_IO_SIZE: usize = 160;
/// Total data space: registers + I/O + extended I/O + SRAM
pub const DATA_SIZE: usize = REG_COUNT + IO_SIZE + EXT_IO_SIZE + SRAM_SIZE;

// I/O register addresses (data space addresses, not I/O addresses)
pub const SPH_ADDR: u16 = 0x5E;
pub const SPL_ADDR: u16 = 0x5D;

pub type ChangeListener = Box<dyn FnMut(RegisterChange) + Send>;

/// ATmega328 peripheral subsystem: data space, flash and all peripherals.
pub struct Atmega328 {
    mem: AddressSpace,
    flash: ProgramMemory,
    timer0: Timer8,
    eeprom: EepromCtrl,
    adc: Adc,
    uart: Uart,
    dac: Dac,
    port_b: GpioPort,
    port_c: GpioPort,
    port_d: GpioPort,
    change_listeners: Vec<ChangeListener>,
    rewind: RewindBuffer,
}

impl Atmega328 {
    /// Create a machine with the default [`Config`], in power-on state.
    pub fn new() -> Self {
        Self::build(&Config::default(), EepromCtrl::new())
    }

    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        let eeprom = EepromCtrl::with_size(config.eeprom_size, config.eeprom_fill)?;
        Ok(Self::build(&config, eeprom))
    }

    fn build(config: &Config, eeprom: EepromCtrl) -> Self {
        let mut m = Atmega328 {
            mem: AddressSpace::new(),
            flash: ProgramMemory::new(),
            timer0: Timer8::new(Timer8Addrs::TIMER0),
            eeprom,
            adc: Adc { analog_input: config.analog_input },
            uart: Uart::new(),
            dac: Dac::new(),
            port_b: GpioPort::new(PortId::B),
            port_c: GpioPort::new(PortId::C),
            port_d: GpioPort::new(PortId::D),
            change_listeners: Vec::new(),
            rewind: RewindBuffer::new(config.rewind_capacity),
        };
        m.power_on();
        m
    }

    /// Register state the hardware comes out of reset with: SP at the top of
    /// SRAM and the USART transmitter idle.
    fn power_on(&mut self) {
        let sp = self.initial_stack_pointer();
        self.write(SPL_ADDR, sp as u8);
        self.write(SPH_ADDR, (sp >> 8) as u8);
        let writes = Uart::power_on(&self.mem);
        self.commit(writes);
    }

    /// Reset the data space and peripherals to power-on state.
    ///
    /// Flash, the EEPROM image, the analog input, listeners and rewind
    /// checkpoints are preserved. GPIO listeners see the cleared PINx/PORTx
    /// values.
    pub fn reset(&mut self) {
        let before = self.port_levels();
        self.mem.clear();
        self.timer0.reset();
        self.uart.reset();
        self.dac.reset();
        self.power_on();
        self.notify_ports(before);
        tracing::debug!("reset");
    }

    // --- Loader boundary ---

    /// Load a flat program image into flash.
    ///
    /// Returns the number of bytes loaded.
    pub fn load_program(&mut self, image: &[u8]) -> Result<usize> {
        self.flash.load(image)
    }

    /// Preload the start of the EEPROM image.
    pub fn load_eeprom(&mut self, image: &[u8]) -> Result<()> {
        self.eeprom.load(image)
    }

    /// Load flash and, optionally, EEPROM, then reset.
    ///
    /// Both images are checked before either is written, so on error the
    /// machine is unchanged.
    pub fn load(&mut self, program: &[u8], eeprom: Option<&[u8]>) -> Result<usize> {
        if program.len() > FLASH_SIZE {
            return Err(Error::ProgramTooLarge { len: program.len(), capacity: FLASH_SIZE });
        }
        if let Some(image) = eeprom {
            if image.len() > self.eeprom.len() {
                return Err(Error::EepromImageTooLarge { len: image.len(), capacity: self.eeprom.len() });
            }
        }
        let size = self.load_program(program)?;
        if let Some(image) = eeprom {
            self.load_eeprom(image)?;
        }
        self.reset();
        tracing::debug!(program = size, eeprom = eeprom.map_or(0, |e| e.len()), "images loaded");
        Ok(size)
    }

    // --- Executor boundary ---

    pub fn read(&self, addr: u16) -> u8 {
        self.mem.read(addr)
    }

    /// Store a byte in the data space and run every side effect of the store.
    ///
    /// # Panics
    ///
    /// If `addr` lies outside the data space.
    pub fn write(&mut self, addr: u16, value: u8) {
        let change = self.mem.write(addr, value);
        for listener in self.change_listeners.iter_mut() {
            listener(change);
        }
        self.dispatch(change);
    }

    /// Write a bit in data space
    pub fn write_bit(&mut self, addr: u16, bit: u8, bvalue: bool) {
        let val = self.read(addr);
        let new_val = if bvalue {
            val | (1 << bit)
        } else {
            val & !(1 << bit)
        };
        self.write(addr, new_val);
    }

    /// Advance Timer0 by `cycles` system clocks.
    pub fn step(&mut self, cycles: u32) {
        let ticks = self.timer0.advance(cycles, &self.mem);
        for _ in 0..ticks {
            let writes = self.timer0.increment(&self.mem);
            self.commit(writes);
        }
    }

    pub fn memory(&self) -> &AddressSpace {
        &self.mem
    }

    pub fn layout(&self) -> &Layout {
        self.mem.layout()
    }

    /// Top of SRAM, where SP points after reset.
    pub fn initial_stack_pointer(&self) -> u16 {
        self.mem.layout().sram.end
    }

    /// Current SPH:SPL.
    pub fn stack_pointer(&self) -> u16 {
        self.mem.read_word(SPL_ADDR)
    }

    pub fn flash(&self) -> &ProgramMemory {
        &self.flash
    }

    /// Read 16-bit word from flash at word address
    pub fn read_program_word(&self, word_addr: usize) -> u16 {
        self.flash.read_program_word(word_addr)
    }

    fn dispatch(&mut self, change: RegisterChange) {
        if self.mem.layout().io.contains(change.addr) {
            if let Some(port) = self.port_watching(change.addr) {
                port.value_changed(change.old, change.new);
                return;
            }
        }
        match change.addr {
            peripherals::ADCSRA => {
                let writes = self.adc.update(&self.mem);
                self.commit(writes);
            }
            peripherals::EECR => {
                let writes = self.eeprom.update(&self.mem);
                self.commit(writes);
            }
            peripherals::DAC_OUT => {
                self.dac.output = change.new;
            }
            peripherals::UDR0 => {
                let writes = self.uart.on_data_write(&self.mem);
                self.commit(writes);
            }
            _ => {}
        }
    }

    fn commit(&mut self, writes: RegisterWrites) {
        for w in writes {
            self.write(w.addr, w.value);
        }
    }

    fn port_watching(&mut self, addr: u16) -> Option<&mut GpioPort> {
        [&mut self.port_b, &mut self.port_c, &mut self.port_d]
            .into_iter()
            .find(|p| p.watches(addr))
    }

    /// Current PINx and PORTx values of every port.
    fn port_levels(&self) -> [(u16, u8); 6] {
        let mut levels = [(0, 0); 6];
        for (i, id) in PortId::ALL.into_iter().enumerate() {
            let addrs = self.port(id).addrs();
            levels[2 * i] = (addrs.pin, self.read(addrs.pin));
            levels[2 * i + 1] = (addrs.port, self.read(addrs.port));
        }
        levels
    }

    /// Fan out PINx/PORTx values rewritten behind the dispatcher's back.
    fn notify_ports(&mut self, before: [(u16, u8); 6]) {
        for (addr, old) in before {
            let new = self.read(addr);
            if old == new {
                continue;
            }
            if let Some(port) = self.port_watching(addr) {
                port.value_changed(old, new);
            }
        }
    }

    /// Subscribe to every data-space store, before it is dispatched.
    pub fn on_register_change<F>(&mut self, listener: F)
    where
        F: FnMut(RegisterChange) + Send + 'static,
    {
        self.change_listeners.push(Box::new(listener));
    }

    // --- EEPROM ---

    pub fn eeprom(&self) -> &[u8] {
        self.eeprom.image()
    }

    /// True if a committed EEPROM write changed the image since the last load.
    pub fn eeprom_dirty(&self) -> bool {
        self.eeprom.dirty
    }

    // --- ADC / DAC ---

    /// Set the voltage seen by the ADC. Clamped to 0–5 V at conversion time.
    pub fn set_analog_input(&mut self, volts: f64) {
        self.adc.analog_input = volts;
    }

    pub fn analog_input(&self) -> f64 {
        self.adc.analog_input
    }

    pub fn dac_output(&self) -> u8 {
        self.dac.output
    }

    pub fn dac_voltage(&self) -> f64 {
        self.dac.voltage()
    }

    // --- USART ---

    /// Deliver a byte on RXD0. Dropped unless RXEN0 is set.
    ///
    /// The UDR0 store is dispatched, so with TXEN0 set the byte is also
    /// transmitted.
    pub fn uart_receive(&mut self, byte: u8) {
        let writes = Uart::receive(byte, &self.mem);
        if writes.is_empty() {
            return;
        }
        self.commit(writes);
        let writes = Uart::receive_complete(&self.mem);
        self.commit(writes);
    }

    pub fn on_uart_transmit<F>(&mut self, listener: F)
    where
        F: FnMut(u8) + Send + 'static,
    {
        self.uart.subscribe(Box::new(listener));
    }

    /// Take and clear accumulated USART output bytes.
    pub fn take_transmitted(&mut self) -> Vec<u8> {
        self.uart.take_transmitted()
    }

    // --- GPIO ---

    pub fn port(&self, id: PortId) -> &GpioPort {
        match id {
            PortId::B => &self.port_b,
            PortId::C => &self.port_c,
            PortId::D => &self.port_d,
        }
    }

    fn port_mut(&mut self, id: PortId) -> &mut GpioPort {
        match id {
            PortId::B => &mut self.port_b,
            PortId::C => &mut self.port_c,
            PortId::D => &mut self.port_d,
        }
    }

    /// Current state of one pin, computed from DDRx/PORTx/PINx.
    pub fn pin(&self, id: PortId, index: u8) -> PinState {
        self.port(id).pin(index, &self.mem)
    }

    pub fn on_port_change<F>(&mut self, id: PortId, listener: F)
    where
        F: FnMut(PortChange) + Send + 'static,
    {
        self.port_mut(id).on_port_change(Box::new(listener));
    }

    pub fn on_pin_change<F>(&mut self, id: PortId, index: u8, listener: F)
    where
        F: FnMut(PinChange) + Send + 'static,
    {
        self.port_mut(id).on_pin_change(index, Box::new(listener));
    }

    /// Drive an external level onto a pin's PINx bit.
    pub fn drive_input(&mut self, id: PortId, index: u8, high: bool) {
        let state = self.pin(id, index);
        let pin_addr = self.port(id).addrs().pin;
        let current = self.read(pin_addr);
        let value = if high { current | state.mask } else { current & !state.mask };
        self.write(pin_addr, value);
    }

    // --- Snapshots ---

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            data: self.mem.as_slice().to_vec(),
            eeprom: self.eeprom.image().to_vec(),
            timer0_prescaler: self.timer0.prescaler(),
            analog_input: self.adc.analog_input,
            dac_output: self.dac.output,
        }
    }

    /// Restore state from a snapshot. The restored registers are not dispatched.
    ///
    /// On a size mismatch nothing is restored. GPIO listeners see the restored
    /// PINx/PORTx values.
    pub fn restore_snapshot(&mut self, snap: &Snapshot) -> Result<()> {
        if snap.data.len() != self.mem.len() {
            return Err(Error::SnapshotMismatch { what: "data space", expected: self.mem.len(), found: snap.data.len() });
        }
        if snap.eeprom.len() != self.eeprom.len() {
            return Err(Error::SnapshotMismatch { what: "EEPROM", expected: self.eeprom.len(), found: snap.eeprom.len() });
        }
        let before = self.port_levels();
        self.mem.restore(&snap.data)?;
        self.eeprom.restore(&snap.eeprom)?;
        self.timer0.set_prescaler(snap.timer0_prescaler);
        self.adc.analog_input = snap.analog_input;
        self.dac.output = snap.dac_output;
        self.notify_ports(before);
        tracing::debug!("snapshot restored");
        Ok(())
    }

    /// Push a rewind checkpoint. No-op when rewind is disabled.
    pub fn checkpoint(&mut self) {
        if self.rewind.capacity() > 0 {
            let snap = self.snapshot();
            self.rewind.push(snap);
        }
    }

    /// Return to the most recent checkpoint. `Ok(false)` if there is none.
    pub fn rewind(&mut self) -> Result<bool> {
        match self.rewind.pop() {
            Some(snap) => {
                self.restore_snapshot(&snap)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn rewind_depth(&self) -> usize {
        self.rewind.len()
    }
}

impl Default for Atmega328 {
    fn default() -> Self {
        Self::new()
    }
}
