//! In-session state snapshots for rewind.
//!
//! A [`Snapshot`] captures everything the peripherals depend on: the data
//! space, the EEPROM image and the little hidden state that lives outside
//! registers (timer prescaler, analog input, DAC level). Snapshots can be
//! encoded with bincode and kept in memory; they are not a save-file
//! format and carry no versioning.
//!
//! [`RewindBuffer`] keeps the most recent `capacity` snapshots; older ones
//! fall off the front.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A frozen copy of machine state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Full data space (registers + I/O + SRAM)
    pub data: Vec<u8>,
    /// EEPROM contents
    pub eeprom: Vec<u8>,
    /// Timer0 prescaler remainder
    pub timer0_prescaler: u32,
    pub analog_input: f64,
    pub dac_output: u8,
}

impl Snapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Bounded history of snapshots, newest last.
pub struct RewindBuffer {
    history: VecDeque<Snapshot>,
    capacity: usize,
}

impl RewindBuffer {
    pub fn new(capacity: usize) -> Self {
        RewindBuffer { history: VecDeque::with_capacity(capacity), capacity }
    }

    /// Append a snapshot, evicting the oldest once full. No-op at zero capacity.
    pub fn push(&mut self, snap: Snapshot) {
        if self.capacity == 0 {
            return;
        }
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(snap);
    }

    /// Take the most recent snapshot.
    pub fn pop(&mut self) -> Option<Snapshot> {
        self.history.pop_back()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_snap(dac: u8) -> Snapshot {
        Snapshot {
            data: vec![0; 32], eeprom: vec![0xFF; 16],
            timer0_prescaler: 3, analog_input: 1.5, dac_output: dac,
        }
    }

    #[test]
    fn test_pop_returns_newest_first() {
        let mut rb = RewindBuffer::new(3);
        for dac in 1..=3 {
            rb.push(make_snap(dac));
        }
        assert_eq!(rb.pop().map(|s| s.dac_output), Some(3));
        assert_eq!(rb.pop().map(|s| s.dac_output), Some(2));
        assert_eq!(rb.len(), 1);
    }

    #[test]
    fn test_oldest_is_evicted() {
        let mut rb = RewindBuffer::new(2);
        for dac in 1..=3 {
            rb.push(make_snap(dac));
        }
        assert_eq!(rb.len(), 2);
        let order: Vec<u8> = std::iter::from_fn(|| rb.pop()).map(|s| s.dac_output).collect();
        assert_eq!(order, vec![3, 2]);
    }

    #[test]
    fn test_zero_capacity() {
        let mut rb = RewindBuffer::new(0);
        rb.push(make_snap(1));
        assert!(rb.is_empty());
        assert!(rb.pop().is_none());
    }

    #[test]
    fn test_bytes_round_trip() {
        let snap = make_snap(9);
        let bytes = snap.to_bytes().unwrap();
        assert_eq!(Snapshot::from_bytes(&bytes).unwrap(), snap);
        assert!(Snapshot::from_bytes(&bytes[..4]).is_err());
    }
}
