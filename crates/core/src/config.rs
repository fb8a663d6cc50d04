//! Machine configuration.
//!
//! Register addresses are fixed by the ATmega328 map and are not part of the
//! configuration. What a host may choose is the EEPROM geometry, its erased
//! contents, the initial analog input and how many rewind checkpoints to keep.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::EEPROM_SIZE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// EEPROM size in bytes; must be a non-zero power of two
    pub eeprom_size: usize,
    /// Value of every EEPROM byte before an image is loaded
    pub eeprom_fill: u8,
    /// Voltage on the ADC input at start-up
    pub analog_input: f64,
    /// Checkpoints kept for [`crate::Atmega328::rewind`]; 0 disables rewind
    pub rewind_capacity: usize,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.eeprom_size == 0 || !self.eeprom_size.is_power_of_two() {
            return Err(Error::EepromSizeNotPowerOfTwo(self.eeprom_size));
        }
        if !self.analog_input.is_finite() {
            return Err(Error::InvalidAnalogInput(self.analog_input));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            eeprom_size: EEPROM_SIZE,
            eeprom_fill: 0xFF,
            analog_input: 0.0,
            rewind_capacity: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.eeprom_size, 1024);
    }

    #[test]
    fn test_rejects_bad_values() {
        let cfg = Config { eeprom_size: 600, ..Config::default() };
        assert!(matches!(cfg.validate(), Err(Error::EepromSizeNotPowerOfTwo(600))));
        let cfg = Config { analog_input: f64::INFINITY, ..Config::default() };
        assert!(matches!(cfg.validate(), Err(Error::InvalidAnalogInput(_))));
    }

    #[test]
    fn test_serde_round_trip() {
        let cfg = Config { rewind_capacity: 8, ..Config::default() };
        let bytes = bincode::serialize(&cfg).unwrap();
        let back: Config = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, cfg);
    }
}
