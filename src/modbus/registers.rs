//! Register tables served over the bus and shared with the application
//! loop.
//!
//! Four independently addressed tables; the same numeric address can exist
//! in more than one table with unrelated meaning. The address set is fixed
//! when the bank is built at startup, only values change afterwards. An
//! unknown address is a caller error: the application treats it as fatal,
//! the engine maps it to an ILLEGAL_DATA_ADDRESS exception.

use std::collections::HashMap;

use crate::utils::error::NodeError;

#[derive(Debug, Default)]
pub struct RegisterBank {
    holding: HashMap<u16, u16>,
    input: HashMap<u16, u16>,
    coils: HashMap<u16, bool>,
    discrete: HashMap<u16, bool>,
}

impl RegisterBank {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Holding registers (16-bit, read/write from the bus) ---

    pub fn add_holding(&mut self, address: u16, value: u16) {
        self.holding.insert(address, value);
    }

    pub fn get_holding(&self, address: u16) -> Result<u16, NodeError> {
        self.holding
            .get(&address)
            .copied()
            .ok_or(NodeError::UnknownRegister { table: "holding", address })
    }

    pub fn set_holding(&mut self, address: u16, value: u16) -> Result<(), NodeError> {
        match self.holding.get_mut(&address) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(NodeError::UnknownRegister { table: "holding", address }),
        }
    }

    pub fn get_holding_many(&self, address: u16, count: u16) -> Result<Vec<u16>, NodeError> {
        (0..count)
            .map(|offset| {
                address
                    .checked_add(offset)
                    .ok_or(NodeError::UnknownRegister { table: "holding", address })
                    .and_then(|target| self.get_holding(target))
            })
            .collect()
    }

    // --- Input registers (16-bit, read-only from the bus) ---

    pub fn add_input(&mut self, address: u16, value: u16) {
        self.input.insert(address, value);
    }

    pub fn get_input(&self, address: u16) -> Result<u16, NodeError> {
        self.input
            .get(&address)
            .copied()
            .ok_or(NodeError::UnknownRegister { table: "input", address })
    }

    pub fn set_input(&mut self, address: u16, value: u16) -> Result<(), NodeError> {
        match self.input.get_mut(&address) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(NodeError::UnknownRegister { table: "input", address }),
        }
    }

    pub fn get_input_many(&self, address: u16, count: u16) -> Result<Vec<u16>, NodeError> {
        (0..count)
            .map(|offset| {
                address
                    .checked_add(offset)
                    .ok_or(NodeError::UnknownRegister { table: "input", address })
                    .and_then(|target| self.get_input(target))
            })
            .collect()
    }

    // --- Coils (single-bit, read/write from the bus) ---

    pub fn add_coil(&mut self, address: u16, value: bool) {
        self.coils.insert(address, value);
    }

    pub fn get_coil(&self, address: u16) -> Result<bool, NodeError> {
        self.coils
            .get(&address)
            .copied()
            .ok_or(NodeError::UnknownRegister { table: "coil", address })
    }

    pub fn set_coil(&mut self, address: u16, value: bool) -> Result<(), NodeError> {
        match self.coils.get_mut(&address) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(NodeError::UnknownRegister { table: "coil", address }),
        }
    }

    pub fn get_coil_many(&self, address: u16, count: u16) -> Result<Vec<bool>, NodeError> {
        (0..count)
            .map(|offset| {
                address
                    .checked_add(offset)
                    .ok_or(NodeError::UnknownRegister { table: "coil", address })
                    .and_then(|target| self.get_coil(target))
            })
            .collect()
    }

    // --- Discrete inputs (single-bit, read-only from the bus) ---

    pub fn add_discrete(&mut self, address: u16, value: bool) {
        self.discrete.insert(address, value);
    }

    pub fn get_discrete(&self, address: u16) -> Result<bool, NodeError> {
        self.discrete
            .get(&address)
            .copied()
            .ok_or(NodeError::UnknownRegister { table: "discrete input", address })
    }

    pub fn set_discrete(&mut self, address: u16, value: bool) -> Result<(), NodeError> {
        match self.discrete.get_mut(&address) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(NodeError::UnknownRegister { table: "discrete input", address }),
        }
    }

    pub fn get_discrete_many(&self, address: u16, count: u16) -> Result<Vec<bool>, NodeError> {
        (0..count)
            .map(|offset| {
                address
                    .checked_add(offset)
                    .ok_or(NodeError::UnknownRegister { table: "discrete input", address })
                    .and_then(|target| self.get_discrete(target))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_round_trip() {
        let mut bank = RegisterBank::new();
        bank.add_holding(100, 0);
        bank.set_holding(100, 0xBEEF).unwrap();
        assert_eq!(bank.get_holding(100).unwrap(), 0xBEEF);
    }

    #[test]
    fn test_tables_are_independent() {
        let mut bank = RegisterBank::new();
        bank.add_holding(5, 42);
        bank.add_input(5, 7);
        bank.add_coil(5, true);
        assert_eq!(bank.get_holding(5).unwrap(), 42);
        assert_eq!(bank.get_input(5).unwrap(), 7);
        assert!(bank.get_coil(5).unwrap());
        // same address, absent from the fourth table
        assert!(bank.get_discrete(5).is_err());
    }

    #[test]
    fn test_unknown_address_is_error() {
        let mut bank = RegisterBank::new();
        bank.add_input(0, 0);
        assert!(matches!(
            bank.get_input(1),
            Err(NodeError::UnknownRegister { table: "input", address: 1 })
        ));
        assert!(bank.set_holding(100, 1).is_err());
    }

    #[test]
    fn test_get_many_contiguous_run() {
        let mut bank = RegisterBank::new();
        for address in 0..4u16 {
            bank.add_input(address, address * 10);
        }
        assert_eq!(bank.get_input_many(0, 4).unwrap(), vec![0, 10, 20, 30]);
        // run crossing a missing address fails
        assert!(bank.get_input_many(2, 3).is_err());
    }

    #[test]
    fn test_get_many_at_address_space_end() {
        let mut bank = RegisterBank::new();
        bank.add_holding(0xFFFE, 1);
        bank.add_holding(0xFFFF, 2);
        assert_eq!(bank.get_holding_many(0xFFFE, 2).unwrap(), vec![1, 2]);
        // a run that would wrap past 0xFFFF is an error, not a panic
        assert!(bank.get_holding_many(0xFFFE, 3).is_err());
    }
}
