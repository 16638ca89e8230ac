//! Local network interface discovery and broadcast-address computation.
//!
//! Interfaces are enumerated **once** at node startup and partitioned by
//! address family.  Only the IPv4 entries drive the poll-reply broadcaster;
//! IPv6 entries are enumerated for diagnostics but otherwise unused.  An
//! interface coming up after startup is not observed — restart the node.
//!
//! # Broadcast addressing (for beginners)
//!
//! Art-Net advertisements are sent to each subnet's *directed broadcast*
//! address rather than the global `255.255.255.255`, so every controller on
//! the local segment sees them without routers forwarding them further.
//! That address is computed per octet as `address | !netmask`:
//! `192.168.1.10` with mask `255.255.255.0` broadcasts to `192.168.1.255`.

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr};

use if_addrs::IfAddr;
use tracing::{debug, warn};

/// One local IPv4 interface address, with everything a poll reply needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Interface {
    /// OS interface name (`eth0`, `en0`, …).
    pub name: String,
    /// The interface address.
    pub addr: Ipv4Addr,
    /// The subnet mask.
    pub netmask: Ipv4Addr,
    /// Hardware address; all zero when the OS did not report one.
    pub mac: [u8; 6],
}

impl Ipv4Interface {
    /// The directed broadcast address of this interface's subnet.
    pub fn broadcast(&self) -> Ipv4Addr {
        broadcast_addr(self.addr, self.netmask)
    }
}

/// One local IPv6 interface address.  Enumerated but not used for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv6Interface {
    pub name: String,
    pub addr: Ipv6Addr,
}

/// All local interface addresses, partitioned by family.
#[derive(Debug, Clone, Default)]
pub struct InterfaceSet {
    pub ipv4: Vec<Ipv4Interface>,
    pub ipv6: Vec<Ipv6Interface>,
}

/// Enumerates all local interface addresses.
///
/// # Errors
///
/// Returns the underlying I/O error when the OS interface query itself
/// fails.  A missing MAC address for an individual interface is not an
/// error — the hardware-address field is zeroed instead.
pub fn discover() -> io::Result<InterfaceSet> {
    let mut set = InterfaceSet::default();

    for iface in if_addrs::get_if_addrs()? {
        match iface.addr {
            IfAddr::V4(ref v4) => {
                let mac = lookup_mac(&iface.name);
                set.ipv4.push(Ipv4Interface {
                    name: iface.name.clone(),
                    addr: v4.ip,
                    netmask: v4.netmask,
                    mac,
                });
            }
            IfAddr::V6(ref v6) => {
                set.ipv6.push(Ipv6Interface {
                    name: iface.name.clone(),
                    addr: v6.ip,
                });
            }
        }
    }

    debug!(
        "discovered {} IPv4 and {} IPv6 interface addresses",
        set.ipv4.len(),
        set.ipv6.len()
    );
    Ok(set)
}

/// Computes the subnet broadcast address: per octet, `address | !mask`.
pub fn broadcast_addr(addr: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Addr {
    let a = addr.octets();
    let m = netmask.octets();
    Ipv4Addr::new(a[0] | !m[0], a[1] | !m[1], a[2] | !m[2], a[3] | !m[3])
}

/// Resolves the hardware address of `name`, zero-filled when unavailable.
fn lookup_mac(name: &str) -> [u8; 6] {
    match mac_address::mac_address_by_name(name) {
        Ok(Some(mac)) => mac.bytes(),
        Ok(None) => [0u8; 6],
        Err(e) => {
            warn!("could not read MAC address of {name}: {e}");
            [0u8; 6]
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_addr_class_c() {
        let result = broadcast_addr(
            Ipv4Addr::new(192, 168, 1, 10),
            Ipv4Addr::new(255, 255, 255, 0),
        );
        assert_eq!(result, Ipv4Addr::new(192, 168, 1, 255));
    }

    #[test]
    fn test_broadcast_addr_wider_mask() {
        let result = broadcast_addr(
            Ipv4Addr::new(10, 20, 130, 5),
            Ipv4Addr::new(255, 255, 128, 0),
        );
        assert_eq!(result, Ipv4Addr::new(10, 20, 255, 255));
    }

    #[test]
    fn test_broadcast_addr_host_mask_is_identity() {
        // A /32 "subnet" broadcasts only to itself.
        let result = broadcast_addr(
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(255, 255, 255, 255),
        );
        assert_eq!(result, Ipv4Addr::new(10, 0, 0, 1));
    }

    #[test]
    fn test_broadcast_addr_zero_mask_is_global_broadcast() {
        let result = broadcast_addr(Ipv4Addr::new(172, 16, 3, 9), Ipv4Addr::new(0, 0, 0, 0));
        assert_eq!(result, Ipv4Addr::new(255, 255, 255, 255));
    }

    #[test]
    fn test_interface_broadcast_uses_own_fields() {
        let iface = Ipv4Interface {
            name: "eth0".to_string(),
            addr: Ipv4Addr::new(192, 168, 1, 10),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            mac: [0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01],
        };
        assert_eq!(iface.broadcast(), Ipv4Addr::new(192, 168, 1, 255));
    }

    #[test]
    fn test_discover_does_not_fail_on_this_host() {
        // Smoke test: enumeration must succeed and loopback normally shows up.
        let set = discover().expect("interface enumeration must succeed");
        // Container environments can be odd, so only assert the call itself
        // and the partition invariant (no family mixing is possible by type).
        let _ = set.ipv4.len() + set.ipv6.len();
    }
}
