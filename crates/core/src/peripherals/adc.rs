//! Analog-to-digital converter emulation.
//!
//! Converts a host-supplied voltage (nominally 0–5 V) to a 10-bit result.
//! Setting ADSC in ADCSRA triggers an instant conversion: the result lands
//! in ADCH:ADCL (right- or left-adjusted by ADLAR in ADMUX), ADIF is set and
//! ADSC is cleared to signal completion.

use crate::memory::{AddressSpace, RegisterWrites};

/// ADC register addresses
pub const ADCL: u16 = 0x78;
pub const ADCH: u16 = 0x79;
pub const ADCSRA: u16 = 0x7A;
pub const ADMUX: u16 = 0x7C;

/// Start conversion
pub const ADSC: u8 = 0x40;
/// Conversion complete
pub const ADIF: u8 = 0x10;
/// Left-adjust result (ADMUX)
pub const ADLAR: u8 = 0x20;

/// Reference voltage
pub const VREF: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adc {
    /// External voltage on the selected channel. Stored as given, clamped
    /// only at conversion time.
    pub analog_input: f64,
}

impl Adc {
    pub fn new() -> Self {
        Adc { analog_input: 0.0 }
    }

    /// Quantize a voltage to the 10-bit range. NaN converts to 0.
    pub fn quantize(volts: f64) -> u16 {
        let clamped = volts.clamp(0.0, VREF);
        (clamped / VREF * 1023.0).round() as u16
    }

    /// React to an ADCSRA write. Returns ADCL, ADCH and ADCSRA stores when a
    /// conversion was started, nothing otherwise.
    pub fn update(&self, regs: &AddressSpace) -> RegisterWrites {
        let mut writes = RegisterWrites::new();
        let adcsra = regs.read(ADCSRA);
        if adcsra & ADSC == 0 {
            return writes;
        }
        let result = Self::quantize(self.analog_input);
        if regs.read(ADMUX) & ADLAR != 0 {
            writes.push(ADCL, ((result << 6) & 0xFF) as u8);
            writes.push(ADCH, (result >> 2) as u8);
        } else {
            writes.push(ADCL, (result & 0xFF) as u8);
            writes.push(ADCH, (result >> 8) as u8);
        }
        writes.push(ADCSRA, (adcsra | ADIF) & !ADSC);
        tracing::trace!(volts = self.analog_input, result, "ADC conversion");
        writes
    }
}

impl Default for Adc {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert(volts: f64, admux: u8) -> Vec<(u16, u8)> {
        let mut regs = AddressSpace::new();
        regs.write(ADMUX, admux);
        regs.write(ADCSRA, 0x80 | ADSC);
        Adc { analog_input: volts }.update(&regs).into_iter().map(|w| (w.addr, w.value)).collect()
    }

    #[test]
    fn test_quantize() {
        assert_eq!(Adc::quantize(0.0), 0);
        assert_eq!(Adc::quantize(5.0), 1023);
        assert_eq!(Adc::quantize(2.5), 512); // 511.5 rounds up
        assert_eq!(Adc::quantize(-1.0), 0);
        assert_eq!(Adc::quantize(12.0), 1023);
        assert_eq!(Adc::quantize(f64::NAN), 0);
    }

    #[test]
    fn test_right_adjusted() {
        assert_eq!(convert(5.0, 0), vec![(ADCL, 0xFF), (ADCH, 0x03), (ADCSRA, 0x80 | ADIF)]);
        assert_eq!(convert(0.0, 0), vec![(ADCL, 0x00), (ADCH, 0x00), (ADCSRA, 0x80 | ADIF)]);
    }

    #[test]
    fn test_left_adjusted() {
        let w = convert(5.0, ADLAR);
        assert_eq!(w[0], (ADCL, 0xC0));
        assert_eq!(w[1], (ADCH, 0xFF));
    }

    #[test]
    fn test_no_start_bit() {
        let mut regs = AddressSpace::new();
        regs.write(ADCSRA, 0x80);
        assert!(Adc { analog_input: 3.3 }.update(&regs).is_empty());
    }
}
