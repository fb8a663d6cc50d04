//! Virtual DAC.
//!
//! Not an ATmega328 peripheral: a spare extended-I/O address (0xFE) that the
//! host reads back as an 8-bit output level scaled to 0–5 V.

/// Virtual DAC output register
pub const DAC_OUT: u16 = 0xFE;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dac {
    pub output: u8,
}

impl Dac {
    pub fn new() -> Self {
        Dac { output: 0 }
    }

    pub fn reset(&mut self) {
        *self = Dac::new();
    }

    /// Output voltage: `output / 255 * 5.0`.
    pub fn voltage(&self) -> f64 {
        self.output as f64 / 255.0 * 5.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voltage() {
        assert_eq!(Dac { output: 0 }.voltage(), 0.0);
        assert_eq!(Dac { output: 255 }.voltage(), 5.0);
        assert!((Dac { output: 51 }.voltage() - 1.0).abs() < 1e-9);
    }
}
