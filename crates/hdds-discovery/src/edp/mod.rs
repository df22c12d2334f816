// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint Discovery Protocol.
//!
//! Two interchangeable implementations behind one tagged variant:
//! [`DynamicEdp`] exchanges writer/reader descriptors over reliable
//! meta-traffic, [`StaticEdp`] preloads them from an XML file. The
//! pairing predicates are shared; only descriptor acquisition differs.

pub mod dynamic;
pub mod static_edp;

pub use dynamic::DynamicEdp;
pub use static_edp::{StaticEdp, StaticSeed};

use crate::core::guid::GuidPrefix;
use crate::endpoint::{LocalReader, LocalWriter, StateKind};
use crate::qos::ReliabilityKind;
use crate::store::{DiscoveredReaderData, DiscoveredWriterData, ParticipantProxy, ProxyStore};

/// EDP variant chosen at init. Hand-written dispatch keeps the five
/// contract methods exhaustiveness-checked.
pub enum Edp {
    Dynamic(DynamicEdp),
    Static(StaticEdp),
}

impl Edp {
    pub fn local_writer_matching(
        &mut self,
        writer: &dyn LocalWriter,
        first_time: bool,
        store: &mut ProxyStore,
    ) -> bool {
        match self {
            Edp::Dynamic(edp) => edp.local_writer_matching(writer, first_time, store),
            Edp::Static(edp) => edp.local_writer_matching(writer, first_time, store),
        }
    }

    pub fn local_reader_matching(
        &mut self,
        reader: &dyn LocalReader,
        first_time: bool,
        store: &mut ProxyStore,
    ) -> bool {
        match self {
            Edp::Dynamic(edp) => edp.local_reader_matching(reader, first_time, store),
            Edp::Static(edp) => edp.local_reader_matching(reader, first_time, store),
        }
    }

    /// Bootstrap the reliable meta-traffic channels towards a freshly
    /// discovered participant. No-op for the static variant.
    pub fn assign_remote_endpoints(&mut self, proxy: &ParticipantProxy) {
        match self {
            Edp::Dynamic(edp) => edp.assign_remote_endpoints(proxy),
            Edp::Static(_) => {}
        }
    }

    /// Tear down the reliable meta-traffic bindings for a departing
    /// prefix. Safe to call even if none were ever added.
    pub fn remove_remote_endpoints(&mut self, prefix: &GuidPrefix) {
        match self {
            Edp::Dynamic(edp) => edp.remove_remote_endpoints(prefix),
            Edp::Static(_) => {}
        }
    }
}

/// Try to bind a local writer to a discovered reader.
///
/// Topic name, type name and topic kind must all match and the reader
/// must be alive. A stateless writer can only serve best-effort readers
/// and binds by locator; a stateful writer binds by reader proxy. The
/// listener fires only when at least one binding is new, which keeps
/// match callbacks exactly-once per (local, remote) pair.
pub fn pair_local_writer_with_discovered_reader(
    writer: &dyn LocalWriter,
    rdata: &DiscoveredReaderData,
) -> bool {
    if writer.topic_name() != rdata.topic_name
        || writer.type_name() != rdata.type_name
        || writer.topic_kind() != rdata.topic_kind
        || !rdata.is_alive
    {
        return false;
    }

    let mut matched = false;
    match writer.state_kind() {
        StateKind::Stateless => {
            if rdata.qos.reliability.kind == ReliabilityKind::BestEffort {
                for locator in rdata
                    .unicast_locators
                    .iter()
                    .chain(rdata.multicast_locators.iter())
                {
                    if writer.reader_locator_add(*locator, rdata.expects_inline_qos) {
                        matched = true;
                    }
                }
            }
        }
        StateKind::Stateful => {
            if writer.matched_reader_add(rdata.reader_proxy()) {
                matched = true;
            }
        }
    }

    if matched {
        log::info!(
            "[edp] Writer {} matched reader {} on '{}'",
            writer.guid(),
            rdata.guid,
            rdata.topic_name
        );
        writer.on_publication_matched(rdata.guid);
    }
    matched
}

/// Try to bind a local reader to a discovered writer. Symmetric to the
/// writer path; a stateful reader additionally requires the writer to be
/// reliable.
pub fn pair_local_reader_with_discovered_writer(
    reader: &dyn LocalReader,
    wdata: &DiscoveredWriterData,
) -> bool {
    if reader.topic_name() != wdata.topic_name
        || reader.type_name() != wdata.type_name
        || reader.topic_kind() != wdata.topic_kind
        || !wdata.is_alive
    {
        return false;
    }

    let mut matched = false;
    match reader.state_kind() {
        StateKind::Stateless => {
            if reader.matched_writer_add(wdata.writer_proxy()) {
                matched = true;
            }
        }
        StateKind::Stateful => {
            if wdata.qos.reliability.kind == ReliabilityKind::Reliable
                && reader.matched_writer_add(wdata.writer_proxy())
            {
                matched = true;
            }
        }
    }

    if matched {
        log::info!(
            "[edp] Reader {} matched writer {} on '{}'",
            reader.guid(),
            wdata.guid,
            wdata.topic_name
        );
        reader.on_subscription_matched(wdata.guid);
    }
    matched
}
