//! Host-facing errors.
//!
//! Only setup operations return these: loading images, building a machine
//! from a [`crate::Config`] and decoding snapshots. Emulated hardware never
//! fails. Out-of-bounds data-space access panics instead.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("program image is {len} bytes but flash holds {capacity}")]
    ProgramTooLarge { len: usize, capacity: usize },
    #[error("EEPROM image is {len} bytes but EEPROM holds {capacity}")]
    EepromImageTooLarge { len: usize, capacity: usize },
    #[error("EEPROM size {0} is not a non-zero power of two")]
    EepromSizeNotPowerOfTwo(usize),
    #[error("analog input {0} is not a finite voltage")]
    InvalidAnalogInput(f64),
    #[error("region {name} ({start:#06x}..={end:#06x}) does not fit in {size:#06x} bytes")]
    RegionOutOfBounds { name: &'static str, start: u16, end: u16, size: usize },
    #[error("regions {first} and {second} overlap")]
    RegionsOverlap { first: &'static str, second: &'static str },
    #[error("snapshot {what} is {found} bytes, expected {expected}")]
    SnapshotMismatch { what: &'static str, expected: usize, found: usize },
    #[error("snapshot encoding: {0}")]
    Snapshot(#[from] bincode::Error),
}
