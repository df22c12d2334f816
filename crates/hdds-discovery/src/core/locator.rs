// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! RTPS locators: `{kind, port, 16-byte address}` tuples naming a
//! transport endpoint (DDS-RTPS v2.3 Sec.9.3.1, 24 bytes on the wire).

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

pub const LOCATOR_KIND_INVALID: i32 = -1;
pub const LOCATOR_KIND_UDPV4: i32 = 1;
pub const LOCATOR_KIND_UDPV6: i32 = 2;

/// Transport endpoint address.
///
/// IPv4 addresses occupy the last 4 bytes of `address`, the first 12 are
/// zero. The `port` field is 32 bits wide on the wire even though UDP
/// ports fit in 16.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    pub kind: i32,
    pub port: u32,
    pub address: [u8; 16],
}

impl Locator {
    /// Encoded size: kind (4) + port (4) + address (16).
    pub const WIRE_SIZE: usize = 24;

    pub const fn invalid() -> Self {
        Self {
            kind: LOCATOR_KIND_INVALID,
            port: 0,
            address: [0; 16],
        }
    }

    /// UDPv4 locator from address + port.
    pub fn udpv4(addr: Ipv4Addr, port: u16) -> Self {
        let mut address = [0u8; 16];
        address[12..16].copy_from_slice(&addr.octets());
        Self {
            kind: LOCATOR_KIND_UDPV4,
            port: u32::from(port),
            address,
        }
    }

    /// Extract the IPv4 address if this is a UDPv4 locator.
    pub fn ipv4(&self) -> Option<Ipv4Addr> {
        if self.kind == LOCATOR_KIND_UDPV4 {
            Some(Ipv4Addr::new(
                self.address[12],
                self.address[13],
                self.address[14],
                self.address[15],
            ))
        } else {
            None
        }
    }

    pub fn from_socket_addr(addr: &SocketAddr) -> Self {
        match addr.ip() {
            IpAddr::V4(v4) => Self::udpv4(v4, addr.port()),
            IpAddr::V6(v6) => Self {
                kind: LOCATOR_KIND_UDPV6,
                port: u32::from(addr.port()),
                address: v6.octets(),
            },
        }
    }

    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        let ip = self.ipv4()?;
        u16::try_from(self.port)
            .ok()
            .map(|port| SocketAddr::new(IpAddr::V4(ip), port))
    }

    /// True for IPv4 multicast addresses (224.0.0.0/4).
    pub fn is_multicast(&self) -> bool {
        self.ipv4().is_some_and(|ip| ip.is_multicast())
    }

    /// True when every address byte is zero (unset address).
    pub fn has_zero_address(&self) -> bool {
        self.address.iter().all(|&b| b == 0)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ipv4() {
            Some(ip) => write!(f, "udpv4://{}:{}", ip, self.port),
            None => write!(f, "locator(kind={}, port={})", self.kind, self.port),
        }
    }
}

impl fmt::Debug for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Locator({})", self)
    }
}
