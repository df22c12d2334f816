// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # HDDS Discovery
//!
//! RTPS participant and endpoint discovery (SPDP/SEDP) in pure Rust.
//!
//! ## Overview
//!
//! Independent processes on a shared network locate one another, exchange
//! descriptors of the topic endpoints they host, and decide which remote
//! endpoints their local endpoints bind to. Two levels of protocol:
//!
//! - **PDP** (Participant Discovery): periodic announcements on a
//!   well-known multicast locator, lease-based expiry of silent peers.
//! - **EDP** (Endpoint Discovery): writer/reader descriptor exchange and
//!   the matching engine, either dynamically over reliable meta-traffic
//!   or preloaded from a static XML file.
//!
//! Transports, history caches, the RTPS message codec, and the
//! writer/reader reliability machinery are external collaborators; the
//! seams towards them live in [`transport`] and [`endpoint`].
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                        Pdp (pdp::Pdp)                        |
//! |  announce / lease watchdogs / stage+commit inbound           |
//! |  +----------------+  +--------------------+  +------------+ |
//! |  |  ProxyStore    |  |  Edp               |  | EventLoop  | |
//! |  |  (store)       |  |  Dynamic | Static  |  | (scheduler)| |
//! |  +----------------+  +--------------------+  +------------+ |
//! +--------------------------------------------------------------+
//!         |  parameter lists (protocol)   |  cache changes
//!         v                               v
//!   endpoint layer traits          MetaTransport (transport)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hdds_discovery::{DiscoveryConfig, EventLoop, Pdp};
//! use hdds_discovery::transport::NullTransport;
//! use std::sync::Arc;
//!
//! let events = Arc::new(EventLoop::new());
//! let config = DiscoveryConfig {
//!     participant_name: "sensor_node".to_string(),
//!     ..DiscoveryConfig::default()
//! };
//! let pdp = Pdp::init(config, 0, Arc::new(NullTransport), events.clone())?;
//! // ... create endpoints, run, then:
//! pdp.shutdown();
//! events.shutdown();
//! # Ok::<(), hdds_discovery::DiscoveryError>(())
//! ```

pub mod config;
pub mod core;
pub mod edp;
pub mod endpoint;
pub mod pdp;
pub mod protocol;
pub mod qos;
pub mod scheduler;
pub mod store;
pub mod transport;

use std::fmt;

pub use crate::config::{DiscoveryConfig, EdpConfig, Runtime};
pub use crate::core::cache::{CacheChange, ChangeKind, InstanceHandle};
pub use crate::core::guid::{EntityId, GuidPrefix, TopicKind, GUID};
pub use crate::core::locator::Locator;
pub use crate::endpoint::{
    LocalEndpoint, LocalReader, LocalWriter, RemoteReaderProxy, RemoteWriterProxy, StateKind,
};
pub use crate::pdp::Pdp;
pub use crate::qos::Qos;
pub use crate::scheduler::{EventLoop, TimerAction, TimerHandle};
pub use crate::store::{
    DiscoveredReaderData, DiscoveredWriterData, ParticipantProxy, ProxyStore, Upsert,
};
pub use crate::transport::MetaTransport;

/// Result alias for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

/// Discovery subsystem error categorisation.
///
/// Only initialization failures propagate to callers; message-ingestion
/// failures are recovered locally (drop + log) and never cross the
/// transport boundary.
#[derive(Debug, Clone)]
pub enum DiscoveryError {
    /// Decoding a discovery record failed; the change is discarded.
    Malformed(protocol::ParseError),
    /// Endpoint descriptor whose owning participant is not in the store.
    UnknownParticipant { prefix: GuidPrefix },
    /// Remote protocol major version lower than ours; dropped for good.
    IncompatibleProtocol { remote_major: u8, local_major: u8 },
    /// Static endpoint XML could not be loaded; fatal at init.
    XmlParse { reason: String },
    /// Invalid discovery attributes; fatal at init.
    Config { reason: String },
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryError::Malformed(err) => write!(f, "Malformed discovery data: {}", err),
            DiscoveryError::UnknownParticipant { prefix } => {
                write!(f, "Unknown participant: {}", prefix)
            }
            DiscoveryError::IncompatibleProtocol {
                remote_major,
                local_major,
            } => write!(
                f,
                "Incompatible protocol version: remote major {} < local major {}",
                remote_major, local_major
            ),
            DiscoveryError::XmlParse { reason } => {
                write!(f, "Static endpoint XML error: {}", reason)
            }
            DiscoveryError::Config { reason } => write!(f, "Configuration error: {}", reason),
        }
    }
}

impl std::error::Error for DiscoveryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DiscoveryError::Malformed(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_variants() {
        let err = DiscoveryError::Malformed(protocol::ParseError::TruncatedData);
        assert_eq!(
            format!("{}", err),
            "Malformed discovery data: truncated parameter record"
        );

        let err = DiscoveryError::IncompatibleProtocol {
            remote_major: 1,
            local_major: 2,
        };
        assert_eq!(
            format!("{}", err),
            "Incompatible protocol version: remote major 1 < local major 2"
        );

        let err = DiscoveryError::XmlParse {
            reason: "bad root".to_string(),
        };
        assert_eq!(format!("{}", err), "Static endpoint XML error: bad root");
    }
}
