//! Node addressing
//!
//! Every satellite is addressed by a string of the form `R{orbit}S{slot}`.
//! A reserved [`NodeAddress::broadcast`] value addresses all current
//! neighbors of the sending node.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AddressError;

/// Reserved address that every neighbor accepts
pub const BROADCAST_ADDRESS: &str = "broadcast";

/// Address of a node in the constellation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeAddress(String);

impl NodeAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Address of the satellite at `orbit`/`slot`
    pub fn satellite(orbit: usize, slot: usize) -> Self {
        Self(format!("R{orbit}S{slot}"))
    }

    /// The broadcast address
    pub fn broadcast() -> Self {
        Self(BROADCAST_ADDRESS.to_string())
    }

    pub fn is_broadcast(&self) -> bool {
        self.0 == BROADCAST_ADDRESS
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the orbit and slot out of a satellite address
    pub fn orbit_slot(&self) -> Result<(usize, usize), AddressError> {
        let invalid = || AddressError::InvalidFormat(self.0.clone());
        let rest = self.0.strip_prefix('R').ok_or_else(invalid)?;
        let (orbit, slot) = rest.split_once('S').ok_or_else(invalid)?;
        let orbit = orbit.parse().map_err(|_| invalid())?;
        let slot = slot.parse().map_err(|_| invalid())?;
        Ok((orbit, slot))
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NodeAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl FromStr for NodeAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(AddressError::InvalidFormat(s.to_string()));
        }
        Ok(Self::new(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_satellite_address_format() {
        let addr = NodeAddress::satellite(3, 11);
        assert_eq!(addr.as_str(), "R3S11");
        assert_eq!(addr.orbit_slot().unwrap(), (3, 11));
    }

    #[test]
    fn test_broadcast() {
        assert!(NodeAddress::broadcast().is_broadcast());
        assert!(!NodeAddress::satellite(0, 0).is_broadcast());
    }

    #[test]
    fn test_orbit_slot_rejects_garbage() {
        assert!(NodeAddress::new("broadcast").orbit_slot().is_err());
        assert!(NodeAddress::new("R1X2").orbit_slot().is_err());
        assert!(NodeAddress::new("RaSb").orbit_slot().is_err());
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        let mut addrs = vec![NodeAddress::from("R1S0"), NodeAddress::from("R0S1")];
        addrs.sort();
        assert_eq!(addrs[0].as_str(), "R0S1");
    }
}
