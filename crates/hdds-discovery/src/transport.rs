// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport seam.
//!
//! Discovery never opens sockets. Outbound discovery samples are handed
//! to this trait; the transport layer frames them into RTPS messages and
//! queues them for transmission. Inbound samples enter through
//! [`crate::pdp::Pdp::dispatch_metatraffic`] once the framing layer has
//! unmarshalled the enclosing DATA submessage into a cache change.

use crate::core::cache::CacheChange;
use crate::core::locator::Locator;

/// Sender half of the meta-traffic transport.
pub trait MetaTransport: Send + Sync {
    /// Queue `change` for transmission to `locator`.
    ///
    /// Returns false when the transport cannot accept the sample; the
    /// caller logs and relies on the periodic resend, it never blocks or
    /// retries inline.
    fn send(&self, locator: &Locator, change: &CacheChange) -> bool;
}

/// Transport that drops everything. Useful for purely static setups and
/// tests that only exercise local state.
pub struct NullTransport;

impl MetaTransport for NullTransport {
    fn send(&self, _locator: &Locator, _change: &CacheChange) -> bool {
        true
    }
}
