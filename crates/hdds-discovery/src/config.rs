// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Discovery configuration - single source of truth for RTPS constants.
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: compile-time constants (port formula, multicast
//!   address, timing defaults).
//! - **Level 2 (Dynamic)**: [`DiscoveryConfig`] chosen by the caller and
//!   the per-participant [`Runtime`] handle derived from it at init.
//!
//! The `Runtime` replaces any process-wide singleton: every port number
//! and the local GUID prefix live on the handle that is passed down into
//! the PDP at construction.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::guid::GuidPrefix;
use crate::core::locator::Locator;
use crate::{DiscoveryError, DiscoveryResult};

// =======================================================================
// RTPS v2.3 Port Mapping (OMG DDS-RTPS spec Sec.9.6.1.1)
// IANA registered: 7400-7469 (UDP/TCP)
// =======================================================================

/// RTPS base port. All other ports are computed from this value.
pub const PORT_BASE: u16 = 7400;

/// Maximum domain id per the DDS specification.
pub const MAX_DOMAIN_ID: u16 = 232;

/// Domain gain: multicast port = `PORT_BASE + DOMAIN_ID_GAIN * domain_id`.
pub const DOMAIN_ID_GAIN: u16 = 250;

/// Participant gain: unicast ports advance by 2 per participant id.
pub const PARTICIPANT_ID_GAIN: u16 = 2;

/// Offset d0: metatraffic multicast.
pub const METATRAFFIC_MULTICAST_OFFSET: u16 = 0;

/// Offset d1: metatraffic unicast.
pub const METATRAFFIC_UNICAST_OFFSET: u16 = 10;

/// Offset d2: user-traffic multicast.
pub const USER_MULTICAST_OFFSET: u16 = 1;

/// Offset d3: user-traffic unicast.
pub const USER_UNICAST_OFFSET: u16 = 11;

/// Well-known discovery multicast address.
pub const MULTICAST_IP: [u8; 4] = [239, 255, 0, 1];

// =======================================================================
// Timing defaults (RTPS v2.3 Sec.8.5.3)
// =======================================================================

/// Participant announcement period.
pub const RESEND_PERIOD_DEFAULT_MS: u64 = 3_000;

/// Lease duration: 10x the announcement period.
pub const LEASE_DURATION_DEFAULT_MS: u64 = 30_000;

/// `PORT_BASE + DOMAIN_ID_GAIN * domain_id + d0`
pub fn metatraffic_multicast_port(domain_id: u16) -> u16 {
    PORT_BASE + DOMAIN_ID_GAIN * domain_id + METATRAFFIC_MULTICAST_OFFSET
}

/// `PORT_BASE + DOMAIN_ID_GAIN * domain_id + d1 + PARTICIPANT_ID_GAIN * participant_id`
pub fn metatraffic_unicast_port(domain_id: u16, participant_id: u8) -> u16 {
    PORT_BASE
        + DOMAIN_ID_GAIN * domain_id
        + METATRAFFIC_UNICAST_OFFSET
        + PARTICIPANT_ID_GAIN * u16::from(participant_id)
}

/// `PORT_BASE + DOMAIN_ID_GAIN * domain_id + d2`
pub fn user_multicast_port(domain_id: u16) -> u16 {
    PORT_BASE + DOMAIN_ID_GAIN * domain_id + USER_MULTICAST_OFFSET
}

/// `PORT_BASE + DOMAIN_ID_GAIN * domain_id + d3 + PARTICIPANT_ID_GAIN * participant_id`
pub fn user_unicast_port(domain_id: u16, participant_id: u8) -> u16 {
    PORT_BASE
        + DOMAIN_ID_GAIN * domain_id
        + USER_UNICAST_OFFSET
        + PARTICIPANT_ID_GAIN * u16::from(participant_id)
}

/// Which endpoint discovery protocol a participant runs.
#[derive(Debug, Clone)]
pub enum EdpConfig {
    /// Descriptor exchange over reliable meta-traffic channels.
    Dynamic {
        /// Create the publications writer + subscriptions reader pair.
        use_pub_writer_sub_reader: bool,
        /// Create the publications reader + subscriptions writer pair.
        use_pub_reader_sub_writer: bool,
    },
    /// Descriptors preloaded from an XML file; no meta-traffic exchange.
    Static { xml_path: PathBuf },
}

impl Default for EdpConfig {
    fn default() -> Self {
        EdpConfig::Dynamic {
            use_pub_writer_sub_reader: true,
            use_pub_reader_sub_writer: true,
        }
    }
}

/// Attributes handed to `Pdp::init`.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub domain_id: u16,
    pub participant_name: String,
    /// Interval between periodic participant announcements.
    pub resend_period: Duration,
    /// How long this participant may stay silent before peers expire it.
    pub lease_duration: Duration,
    pub edp: EdpConfig,
    /// Peer host addresses that receive unicast announcements until their
    /// real locators are learned.
    pub initial_peers: Vec<Ipv4Addr>,
    /// Announcements fan out to initial-peer unicast ports for
    /// participant ids `0..=initial_peer_max_participant_id`.
    pub initial_peer_max_participant_id: u8,
    /// Pinned local unicast addresses; empty means "ask the host".
    pub unicast_addresses: Vec<Ipv4Addr>,
    /// Advertise the participant-message (writer liveliness) built-ins.
    pub use_writer_liveliness_protocol: bool,
    pub expects_inline_qos: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            domain_id: 0,
            participant_name: String::new(),
            resend_period: Duration::from_millis(RESEND_PERIOD_DEFAULT_MS),
            lease_duration: Duration::from_millis(LEASE_DURATION_DEFAULT_MS),
            edp: EdpConfig::default(),
            initial_peers: Vec::new(),
            initial_peer_max_participant_id: 3,
            unicast_addresses: Vec::new(),
            use_writer_liveliness_protocol: false,
            expects_inline_qos: false,
        }
    }
}

/// Per-participant runtime handle: generated GUID prefix plus the
/// resolved port numbers. Built once in `Pdp::init` and passed down;
/// there is no global instance.
#[derive(Debug, Clone)]
pub struct Runtime {
    pub guid_prefix: GuidPrefix,
    pub domain_id: u16,
    pub participant_id: u8,
    pub metatraffic_multicast_port: u16,
    pub metatraffic_unicast_port: u16,
    pub user_unicast_port: u16,
    pub unicast_addresses: Vec<Ipv4Addr>,
}

impl Runtime {
    /// Resolve ports and addresses for one participant.
    ///
    /// # Errors
    /// `DiscoveryError::Config` when the domain id is out of range.
    pub fn new(config: &DiscoveryConfig, participant_id: u8) -> DiscoveryResult<Self> {
        if config.domain_id > MAX_DOMAIN_ID {
            return Err(DiscoveryError::Config {
                reason: format!(
                    "domain id {} out of range (max {})",
                    config.domain_id, MAX_DOMAIN_ID
                ),
            });
        }
        // The combined formula must stay inside the u16 port space.
        let check = |offset: u16, with_participant: bool| -> DiscoveryResult<u16> {
            let port = u32::from(PORT_BASE)
                + u32::from(DOMAIN_ID_GAIN) * u32::from(config.domain_id)
                + u32::from(offset)
                + if with_participant {
                    u32::from(PARTICIPANT_ID_GAIN) * u32::from(participant_id)
                } else {
                    0
                };
            u16::try_from(port).map_err(|_| DiscoveryError::Config {
                reason: format!(
                    "port formula overflows for domain {} participant {}",
                    config.domain_id, participant_id
                ),
            })
        };

        let unicast_addresses = if config.unicast_addresses.is_empty() {
            host_unicast_addresses()
        } else {
            config.unicast_addresses.clone()
        };

        Ok(Self {
            guid_prefix: GuidPrefix::generate(participant_id),
            domain_id: config.domain_id,
            participant_id,
            metatraffic_multicast_port: check(METATRAFFIC_MULTICAST_OFFSET, false)?,
            metatraffic_unicast_port: check(METATRAFFIC_UNICAST_OFFSET, true)?,
            user_unicast_port: check(USER_UNICAST_OFFSET, true)?,
            unicast_addresses,
        })
    }

    /// Well-known multicast locator for this domain.
    pub fn metatraffic_multicast_locator(&self) -> Locator {
        Locator::udpv4(Ipv4Addr::from(MULTICAST_IP), self.metatraffic_multicast_port)
    }

    /// Metatraffic unicast locators across every local address.
    pub fn metatraffic_unicast_locators(&self) -> Vec<Locator> {
        self.unicast_addresses
            .iter()
            .map(|addr| Locator::udpv4(*addr, self.metatraffic_unicast_port))
            .collect()
    }

    /// Default user-traffic unicast locators across every local address.
    pub fn default_unicast_locators(&self) -> Vec<Locator> {
        self.unicast_addresses
            .iter()
            .map(|addr| Locator::udpv4(*addr, self.user_unicast_port))
            .collect()
    }
}

/// Local IPv4 addresses used when the configuration pins none.
fn host_unicast_addresses() -> Vec<Ipv4Addr> {
    match local_ip_address::local_ip() {
        Ok(std::net::IpAddr::V4(addr)) => vec![addr],
        Ok(std::net::IpAddr::V6(addr)) => {
            log::debug!("[config] Host address {} is IPv6, using loopback", addr);
            vec![Ipv4Addr::LOCALHOST]
        }
        Err(err) => {
            log::warn!("[config] Host address lookup failed ({}), using loopback", err);
            vec![Ipv4Addr::LOCALHOST]
        }
    }
}
