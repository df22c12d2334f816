// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dynamic endpoint discovery over reliable meta-traffic.
//!
//! Up to four built-in endpoints, controlled by two configuration flags:
//! publications writer + subscriptions reader (announce our writers,
//! learn peers' readers) and publications reader + subscriptions writer
//! (the mirror image). All four are reliable stateful with KEEP_LAST
//! depth 1 and fixed reserved entity ids.

use std::sync::Arc;

use crate::core::cache::{CacheChange, ChangeKind};
use crate::core::guid::{
    GuidPrefix, ENTITYID_PARTICIPANT, ENTITYID_SEDP_PUBLICATIONS_READER,
    ENTITYID_SEDP_PUBLICATIONS_WRITER, ENTITYID_SEDP_SUBSCRIPTIONS_READER,
    ENTITYID_SEDP_SUBSCRIPTIONS_WRITER, GUID,
};
use crate::edp::{pair_local_reader_with_discovered_writer, pair_local_writer_with_discovered_reader};
use crate::endpoint::builtin::{BuiltinReader, BuiltinWriter};
use crate::endpoint::{LocalReader, LocalWriter, RemoteReaderProxy, RemoteWriterProxy};
use crate::protocol::constants::{
    DISC_BUILTIN_ENDPOINT_PUBLICATIONS_ANNOUNCER, DISC_BUILTIN_ENDPOINT_PUBLICATIONS_DETECTOR,
    DISC_BUILTIN_ENDPOINT_SUBSCRIPTIONS_ANNOUNCER, DISC_BUILTIN_ENDPOINT_SUBSCRIPTIONS_DETECTOR,
};
use crate::protocol::parameter::{decapsulate, encapsulate, Endianness};
use crate::protocol::{
    parameters_to_reader_data, parameters_to_writer_data, reader_data_to_parameters,
    writer_data_to_parameters,
};
use crate::qos::{PolicySet, ReliabilityKind};
use crate::store::{DiscoveredReaderData, DiscoveredWriterData, ParticipantProxy, ProxyStore};
use crate::transport::MetaTransport;

/// Outcome of an inbound SEDP descriptor, reported for logging/tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorOutcome {
    Applied { matched: bool },
    Dropped,
}

pub struct DynamicEdp {
    local_prefix: GuidPrefix,
    pub(crate) publications_writer: Option<BuiltinWriter>,
    pub(crate) publications_reader: Option<BuiltinReader>,
    pub(crate) subscriptions_writer: Option<BuiltinWriter>,
    pub(crate) subscriptions_reader: Option<BuiltinReader>,
}

impl DynamicEdp {
    pub fn new(
        local_prefix: GuidPrefix,
        use_pub_writer_sub_reader: bool,
        use_pub_reader_sub_writer: bool,
        transport: &Arc<dyn MetaTransport>,
    ) -> Self {
        let mut edp = Self {
            local_prefix,
            publications_writer: None,
            publications_reader: None,
            subscriptions_writer: None,
            subscriptions_reader: None,
        };
        if use_pub_writer_sub_reader {
            edp.publications_writer = Some(BuiltinWriter::new(
                GUID::new(local_prefix, ENTITYID_SEDP_PUBLICATIONS_WRITER),
                Arc::clone(transport),
            ));
            edp.subscriptions_reader = Some(BuiltinReader::new(
                GUID::new(local_prefix, ENTITYID_SEDP_SUBSCRIPTIONS_READER),
                true,
            ));
        }
        if use_pub_reader_sub_writer {
            edp.publications_reader = Some(BuiltinReader::new(
                GUID::new(local_prefix, ENTITYID_SEDP_PUBLICATIONS_READER),
                true,
            ));
            edp.subscriptions_writer = Some(BuiltinWriter::new(
                GUID::new(local_prefix, ENTITYID_SEDP_SUBSCRIPTIONS_WRITER),
                Arc::clone(transport),
            ));
        }
        edp
    }

    /// Built-in endpoint set bits this EDP contributes to the local
    /// participant announcement.
    pub fn builtin_endpoint_mask(&self) -> u32 {
        let mut mask = 0;
        if self.publications_writer.is_some() {
            mask |= DISC_BUILTIN_ENDPOINT_PUBLICATIONS_ANNOUNCER
                | DISC_BUILTIN_ENDPOINT_SUBSCRIPTIONS_DETECTOR;
        }
        if self.publications_reader.is_some() {
            mask |= DISC_BUILTIN_ENDPOINT_PUBLICATIONS_DETECTOR
                | DISC_BUILTIN_ENDPOINT_SUBSCRIPTIONS_ANNOUNCER;
        }
        mask
    }

    fn local_participant_guid(&self) -> GUID {
        GUID::new(self.local_prefix, ENTITYID_PARTICIPANT)
    }

    /// Descriptor for a local writer, dirty mask derived against the
    /// previously announced profile.
    fn build_writer_data(
        &self,
        writer: &dyn LocalWriter,
        store: &ProxyStore,
    ) -> DiscoveredWriterData {
        let mut wdata = DiscoveredWriterData::new(
            writer.guid(),
            self.local_participant_guid(),
            &writer.topic_name(),
            &writer.type_name(),
        );
        wdata.topic_kind = writer.topic_kind();
        wdata.unicast_locators = writer.unicast_locators();
        wdata.multicast_locators = writer.multicast_locators();
        wdata.qos = writer.qos();
        wdata.user_defined_id = writer.user_defined_id();
        if let Some(previous) = store.local().writer(&writer.guid()) {
            wdata.changed = PolicySet::diff(&previous.qos, &wdata.qos);
        }
        wdata
    }

    fn build_reader_data(
        &self,
        reader: &dyn LocalReader,
        store: &ProxyStore,
    ) -> DiscoveredReaderData {
        let mut rdata = DiscoveredReaderData::new(
            reader.guid(),
            self.local_participant_guid(),
            &reader.topic_name(),
            &reader.type_name(),
        );
        rdata.topic_kind = reader.topic_kind();
        rdata.expects_inline_qos = reader.expects_inline_qos();
        rdata.unicast_locators = reader.unicast_locators();
        rdata.multicast_locators = reader.multicast_locators();
        rdata.qos = reader.qos();
        rdata.user_defined_id = reader.user_defined_id();
        if let Some(previous) = store.local().reader(&reader.guid()) {
            rdata.changed = PolicySet::diff(&previous.qos, &rdata.qos);
        }
        rdata
    }

    /// Announce a local writer and pair it against every known remote
    /// reader. With `first_time == false` the descriptor is re-published
    /// (QoS change) and pairing re-runs in full.
    pub fn local_writer_matching(
        &mut self,
        writer: &dyn LocalWriter,
        first_time: bool,
        store: &mut ProxyStore,
    ) -> bool {
        let mut wdata = self.build_writer_data(writer, store);
        let payload = writer_data_to_parameters(&wdata, Endianness::Little);
        // Dirty mask is consumed by the encode above.
        wdata.changed = PolicySet::EMPTY;

        let prefix = self.local_prefix;
        let key = wdata.key();
        if store.upsert_writer(&prefix, wdata).is_none() && first_time {
            log::warn!(
                "[sedp] Local writer {} rejected by the proxy store",
                writer.guid()
            );
            return false;
        }

        if let Some(pub_writer) = &mut self.publications_writer {
            match encapsulate(&payload, Endianness::Little) {
                Ok(bytes) => {
                    let change = pub_writer.new_change(ChangeKind::Alive, key, bytes);
                    pub_writer.add_change(change.clone());
                    pub_writer.unsent_change_add(&change);
                }
                Err(err) => {
                    log::warn!("[sedp] Writer data encoding failed: {}", err);
                }
            }
        }

        let mut matched = false;
        for proxy in store.remotes() {
            for rdata in &proxy.readers {
                matched |= pair_local_writer_with_discovered_reader(writer, rdata);
            }
        }
        matched
    }

    /// Announce a local reader and pair it against every known remote
    /// writer. Mirror of [`DynamicEdp::local_writer_matching`].
    pub fn local_reader_matching(
        &mut self,
        reader: &dyn LocalReader,
        first_time: bool,
        store: &mut ProxyStore,
    ) -> bool {
        let mut rdata = self.build_reader_data(reader, store);
        let payload = reader_data_to_parameters(&rdata, Endianness::Little);
        rdata.changed = PolicySet::EMPTY;

        let prefix = self.local_prefix;
        let key = rdata.key();
        if store.upsert_reader(&prefix, rdata).is_none() && first_time {
            log::warn!(
                "[sedp] Local reader {} rejected by the proxy store",
                reader.guid()
            );
            return false;
        }

        if let Some(sub_writer) = &mut self.subscriptions_writer {
            match encapsulate(&payload, Endianness::Little) {
                Ok(bytes) => {
                    let change = sub_writer.new_change(ChangeKind::Alive, key, bytes);
                    sub_writer.add_change(change.clone());
                    sub_writer.unsent_change_add(&change);
                }
                Err(err) => {
                    log::warn!("[sedp] Reader data encoding failed: {}", err);
                }
            }
        }

        let mut matched = false;
        for proxy in store.remotes() {
            for wdata in &proxy.writers {
                matched |= pair_local_reader_with_discovered_writer(reader, wdata);
            }
        }
        matched
    }

    /// Bootstrap: walk the peer's advertised built-in endpoint set and
    /// install its built-in GUIDs + meta-traffic locators into our
    /// counterpart endpoints. This establishes the reliable channel over
    /// which all subsequent descriptors flow.
    pub fn assign_remote_endpoints(&mut self, proxy: &ParticipantProxy) {
        let endpoints = proxy.available_builtin_endpoints;
        log::debug!(
            "[sedp] Assigning remote built-ins of {} (mask {:#x})",
            proxy.guid_prefix,
            endpoints
        );

        if endpoints & DISC_BUILTIN_ENDPOINT_PUBLICATIONS_ANNOUNCER != 0 {
            if let Some(pub_reader) = &mut self.publications_reader {
                pub_reader.matched_writer_add(RemoteWriterProxy {
                    guid: GUID::new(proxy.guid_prefix, ENTITYID_SEDP_PUBLICATIONS_WRITER),
                    unicast_locators: proxy.metatraffic_unicast_locators.clone(),
                    multicast_locators: proxy.metatraffic_multicast_locators.clone(),
                });
            }
        }
        if endpoints & DISC_BUILTIN_ENDPOINT_PUBLICATIONS_DETECTOR != 0 {
            if let Some(pub_writer) = &mut self.publications_writer {
                let reader = RemoteReaderProxy {
                    guid: GUID::new(proxy.guid_prefix, ENTITYID_SEDP_PUBLICATIONS_READER),
                    expects_inline_qos: false,
                    reliability: ReliabilityKind::Reliable,
                    unicast_locators: proxy.metatraffic_unicast_locators.clone(),
                    multicast_locators: proxy.metatraffic_multicast_locators.clone(),
                };
                if pub_writer.matched_reader_add(reader.clone()) {
                    // Writers announced before this peer was known.
                    pub_writer.send_history_to(&reader);
                }
            }
        }
        if endpoints & DISC_BUILTIN_ENDPOINT_SUBSCRIPTIONS_ANNOUNCER != 0 {
            if let Some(sub_reader) = &mut self.subscriptions_reader {
                sub_reader.matched_writer_add(RemoteWriterProxy {
                    guid: GUID::new(proxy.guid_prefix, ENTITYID_SEDP_SUBSCRIPTIONS_WRITER),
                    unicast_locators: proxy.metatraffic_unicast_locators.clone(),
                    multicast_locators: proxy.metatraffic_multicast_locators.clone(),
                });
            }
        }
        if endpoints & DISC_BUILTIN_ENDPOINT_SUBSCRIPTIONS_DETECTOR != 0 {
            if let Some(sub_writer) = &mut self.subscriptions_writer {
                let reader = RemoteReaderProxy {
                    guid: GUID::new(proxy.guid_prefix, ENTITYID_SEDP_SUBSCRIPTIONS_READER),
                    expects_inline_qos: false,
                    reliability: ReliabilityKind::Reliable,
                    unicast_locators: proxy.metatraffic_unicast_locators.clone(),
                    multicast_locators: proxy.metatraffic_multicast_locators.clone(),
                };
                if sub_writer.matched_reader_add(reader.clone()) {
                    // Readers announced before this peer was known.
                    sub_writer.send_history_to(&reader);
                }
            }
        }
    }

    pub fn remove_remote_endpoints(&mut self, prefix: &GuidPrefix) {
        if let Some(pub_reader) = &mut self.publications_reader {
            pub_reader
                .matched_writer_remove(&GUID::new(*prefix, ENTITYID_SEDP_PUBLICATIONS_WRITER));
        }
        if let Some(pub_writer) = &mut self.publications_writer {
            pub_writer
                .matched_reader_remove(&GUID::new(*prefix, ENTITYID_SEDP_PUBLICATIONS_READER));
        }
        if let Some(sub_reader) = &mut self.subscriptions_reader {
            sub_reader
                .matched_writer_remove(&GUID::new(*prefix, ENTITYID_SEDP_SUBSCRIPTIONS_WRITER));
        }
        if let Some(sub_writer) = &mut self.subscriptions_writer {
            sub_writer
                .matched_reader_remove(&GUID::new(*prefix, ENTITYID_SEDP_SUBSCRIPTIONS_READER));
        }
    }

    /// Inbound WriterData on the publications reader.
    ///
    /// The change already passed the self-echo gate in the staging phase.
    /// Admission (matched-writer + sequence watermark) happens here under
    /// the discovery lock, then the descriptor is upserted and pairing
    /// re-runs against every local reader.
    pub fn on_publications_data(
        &mut self,
        change: &CacheChange,
        store: &mut ProxyStore,
        local_readers: &[Arc<dyn LocalReader>],
    ) -> DescriptorOutcome {
        let Some(pub_reader) = &mut self.publications_reader else {
            return DescriptorOutcome::Dropped;
        };
        if !pub_reader.accept(change) {
            return DescriptorOutcome::Dropped;
        }

        let wdata = match decapsulate(&change.payload)
            .and_then(|(list, e)| parameters_to_writer_data(&list, e))
        {
            Ok(wdata) => wdata,
            Err(err) => {
                log::warn!("[sedp] Malformed writer data dropped: {}", err);
                return DescriptorOutcome::Dropped;
            }
        };

        if wdata.guid.prefix == self.local_prefix {
            return DescriptorOutcome::Dropped; // own descriptor echoed back
        }

        let prefix = crate::protocol::endpoint::owning_prefix(&wdata.participant_guid, &wdata.guid);
        if store.get(&prefix).is_none() {
            // Announcement raced ahead of PDP; the reliable channel will
            // retransmit once the participant is known.
            log::warn!(
                "[sedp] Writer data from unknown participant {}, dropped",
                prefix
            );
            return DescriptorOutcome::Dropped;
        }

        let guid = wdata.guid;
        if store.upsert_writer(&prefix, wdata).is_none() {
            return DescriptorOutcome::Dropped;
        }

        let mut matched = false;
        if let Some(proxy) = store.get(&prefix) {
            if let Some(stored) = proxy.writer(&guid) {
                for reader in local_readers {
                    matched |= pair_local_reader_with_discovered_writer(reader.as_ref(), stored);
                }
            }
        }
        DescriptorOutcome::Applied { matched }
    }

    /// Inbound ReaderData on the subscriptions reader. Mirror of
    /// [`DynamicEdp::on_publications_data`].
    pub fn on_subscriptions_data(
        &mut self,
        change: &CacheChange,
        store: &mut ProxyStore,
        local_writers: &[Arc<dyn LocalWriter>],
    ) -> DescriptorOutcome {
        let Some(sub_reader) = &mut self.subscriptions_reader else {
            return DescriptorOutcome::Dropped;
        };
        if !sub_reader.accept(change) {
            return DescriptorOutcome::Dropped;
        }

        let rdata = match decapsulate(&change.payload)
            .and_then(|(list, e)| parameters_to_reader_data(&list, e))
        {
            Ok(rdata) => rdata,
            Err(err) => {
                log::warn!("[sedp] Malformed reader data dropped: {}", err);
                return DescriptorOutcome::Dropped;
            }
        };

        if rdata.guid.prefix == self.local_prefix {
            return DescriptorOutcome::Dropped; // own descriptor echoed back
        }

        let prefix = crate::protocol::endpoint::owning_prefix(&rdata.participant_guid, &rdata.guid);
        if store.get(&prefix).is_none() {
            log::warn!(
                "[sedp] Reader data from unknown participant {}, dropped",
                prefix
            );
            return DescriptorOutcome::Dropped;
        }

        let guid = rdata.guid;
        if store.upsert_reader(&prefix, rdata).is_none() {
            return DescriptorOutcome::Dropped;
        }

        let mut matched = false;
        if let Some(proxy) = store.get(&prefix) {
            if let Some(stored) = proxy.reader(&guid) {
                for writer in local_writers {
                    matched |= pair_local_writer_with_discovered_reader(writer.as_ref(), stored);
                }
            }
        }
        DescriptorOutcome::Applied { matched }
    }
}
