//! Universe addressing: the net / subnet / universe triple and its packed
//! wire representation.
//!
//! An Art-Net port address is 15 bits: 7 bits of net, 4 of subnet, 4 of
//! universe.  The low byte — `(subnet << 4) | universe` — is called the
//! *sub-universe* and is what actually travels in the ArtDmx header next to
//! the net byte.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors raised when constructing a [`UniverseAddress`].
///
/// Surfaced synchronously to the caller; a failed construction performs no
/// side effects anywhere.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// `net` must fit in 7 bits.
    #[error("net must be 0..=127, got {0}")]
    NetOutOfRange(u8),

    /// `subnet` must fit in 4 bits.
    #[error("subnet must be 0..=15, got {0}")]
    SubnetOutOfRange(u8),

    /// `universe` must fit in 4 bits.
    #[error("universe must be 0..=15, got {0}")]
    UniverseOutOfRange(u8),
}

/// A validated universe address.
///
/// Fields are private so that every value in circulation satisfies the range
/// invariants and the sub-universe consistency rule: `sub_universe` is
/// `(subnet << 4) | universe` unless the caller explicitly overrode it at
/// construction.  The unsigned field types make the negative-input checks of
/// looser-typed implementations unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniverseAddress {
    net: u8,
    subnet: u8,
    universe: u8,
    sub_universe: u8,
}

impl UniverseAddress {
    /// Builds an address from its parts.
    ///
    /// When `sub_universe` is `None` it is derived as `(subnet << 4) | universe`.
    /// An explicit override is accepted verbatim — it is a full byte and every
    /// value is valid on the wire.
    ///
    /// # Errors
    ///
    /// Returns [`AddressError`] when `net > 127`, `subnet > 15`, or
    /// `universe > 15`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use artnet_core::UniverseAddress;
    ///
    /// let addr = UniverseAddress::new(0, 2, 5, None).unwrap();
    /// assert_eq!(addr.sub_universe(), 0x25);
    /// ```
    pub fn new(
        net: u8,
        subnet: u8,
        universe: u8,
        sub_universe: Option<u8>,
    ) -> Result<Self, AddressError> {
        if net > 127 {
            return Err(AddressError::NetOutOfRange(net));
        }
        if subnet > 15 {
            return Err(AddressError::SubnetOutOfRange(subnet));
        }
        if universe > 15 {
            return Err(AddressError::UniverseOutOfRange(universe));
        }
        Ok(Self {
            net,
            subnet,
            universe,
            sub_universe: sub_universe.unwrap_or((subnet << 4) | universe),
        })
    }

    pub fn net(&self) -> u8 {
        self.net
    }

    pub fn subnet(&self) -> u8 {
        self.subnet
    }

    pub fn universe(&self) -> u8 {
        self.universe
    }

    /// The packed low byte of the port address.
    pub fn sub_universe(&self) -> u8 {
        self.sub_universe
    }

    /// The full 16-bit port address as carried in ArtDmx: low byte
    /// sub-universe, high byte net.
    pub fn port_address(&self) -> u16 {
        u16::from(self.sub_universe) | (u16::from(self.net) << 8)
    }
}

impl Default for UniverseAddress {
    /// Net 0, subnet 0, universe 0 — the address every controller ships with.
    fn default() -> Self {
        Self {
            net: 0,
            subnet: 0,
            universe: 0,
            sub_universe: 0,
        }
    }
}

impl std::fmt::Display for UniverseAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.net, self.subnet, self.universe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_universe_defaults_to_packed_nibbles() {
        // Exhaustive over the valid subnet/universe space.
        for subnet in 0u8..=15 {
            for universe in 0u8..=15 {
                let addr = UniverseAddress::new(0, subnet, universe, None).unwrap();
                assert_eq!(addr.sub_universe(), (subnet << 4) | universe);
            }
        }
    }

    #[test]
    fn test_sub_universe_override_is_kept_verbatim() {
        let addr = UniverseAddress::new(1, 2, 3, Some(0xAB)).unwrap();
        assert_eq!(addr.sub_universe(), 0xAB);
        // The nibble fields are untouched by the override.
        assert_eq!(addr.subnet(), 2);
        assert_eq!(addr.universe(), 3);
    }

    #[test]
    fn test_port_address_packs_net_high() {
        let addr = UniverseAddress::new(3, 1, 5, None).unwrap();
        assert_eq!(addr.port_address(), 0x0315);
    }

    #[test]
    fn test_net_out_of_range_is_rejected() {
        assert_eq!(
            UniverseAddress::new(200, 0, 0, None),
            Err(AddressError::NetOutOfRange(200))
        );
        assert_eq!(
            UniverseAddress::new(128, 0, 0, None),
            Err(AddressError::NetOutOfRange(128))
        );
        assert!(UniverseAddress::new(127, 0, 0, None).is_ok());
    }

    #[test]
    fn test_subnet_out_of_range_is_rejected() {
        assert_eq!(
            UniverseAddress::new(0, 16, 0, None),
            Err(AddressError::SubnetOutOfRange(16))
        );
    }

    #[test]
    fn test_universe_out_of_range_is_rejected() {
        assert_eq!(
            UniverseAddress::new(0, 0, 16, None),
            Err(AddressError::UniverseOutOfRange(16))
        );
    }

    #[test]
    fn test_default_address_is_all_zero() {
        let addr = UniverseAddress::default();
        assert_eq!(addr.port_address(), 0);
    }

    #[test]
    fn test_display_renders_triple() {
        let addr = UniverseAddress::new(1, 2, 3, None).unwrap();
        assert_eq!(addr.to_string(), "1:2:3");
    }
}
