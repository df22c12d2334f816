// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory catalogue of discovered participants and their endpoint
//! proxies.
//!
//! The store is a pure container: no matching, no I/O. It enforces the
//! structural invariants (full-GUID uniqueness, participant containment,
//! built-in entity-id separation) on every mutation and leaves everything
//! else to the PDP/EDP. Lookup is a linear scan over the participant
//! vector, which is adequate for the participant counts discovery deals
//! with (tens to low thousands).

use crate::core::cache::InstanceHandle;
use crate::core::guid::{
    GuidPrefix, TopicKind, ENTITYID_PARTICIPANT, GUID, PROTOCOL_VERSION, VENDOR_ID,
};
use crate::core::locator::Locator;
use crate::endpoint::{RemoteReaderProxy, RemoteWriterProxy};
use crate::qos::{PolicySet, Qos, RtpsDuration};

/// Result of an endpoint upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Updated,
}

/// Discovered (or local) writer descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredWriterData {
    pub guid: GUID,
    pub participant_guid: GUID,
    pub topic_name: String,
    pub type_name: String,
    pub topic_kind: TopicKind,
    pub unicast_locators: Vec<Locator>,
    pub multicast_locators: Vec<Locator>,
    pub qos: Qos,
    pub is_alive: bool,
    /// Static-EDP record id; 0 or negative means "not statically declared".
    pub user_defined_id: i16,
    /// Policies mutated since the last successful announcement.
    pub changed: PolicySet,
}

impl DiscoveredWriterData {
    pub fn new(guid: GUID, participant_guid: GUID, topic_name: &str, type_name: &str) -> Self {
        Self {
            guid,
            participant_guid,
            topic_name: topic_name.to_string(),
            type_name: type_name.to_string(),
            topic_kind: TopicKind::NoKey,
            unicast_locators: Vec::new(),
            multicast_locators: Vec::new(),
            qos: Qos::default(),
            is_alive: true,
            user_defined_id: -1,
            changed: PolicySet::EMPTY,
        }
    }

    pub fn key(&self) -> InstanceHandle {
        InstanceHandle::from_guid(&self.guid)
    }

    /// View of this descriptor as the remote-writer proxy handed to local
    /// readers during matching.
    pub fn writer_proxy(&self) -> RemoteWriterProxy {
        RemoteWriterProxy {
            guid: self.guid,
            unicast_locators: self.unicast_locators.clone(),
            multicast_locators: self.multicast_locators.clone(),
        }
    }
}

/// Discovered (or local) reader descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredReaderData {
    pub guid: GUID,
    pub participant_guid: GUID,
    pub topic_name: String,
    pub type_name: String,
    pub topic_kind: TopicKind,
    pub expects_inline_qos: bool,
    pub unicast_locators: Vec<Locator>,
    pub multicast_locators: Vec<Locator>,
    pub qos: Qos,
    pub is_alive: bool,
    pub user_defined_id: i16,
    pub changed: PolicySet,
}

impl DiscoveredReaderData {
    pub fn new(guid: GUID, participant_guid: GUID, topic_name: &str, type_name: &str) -> Self {
        Self {
            guid,
            participant_guid,
            topic_name: topic_name.to_string(),
            type_name: type_name.to_string(),
            topic_kind: TopicKind::NoKey,
            expects_inline_qos: false,
            unicast_locators: Vec::new(),
            multicast_locators: Vec::new(),
            qos: Qos::default(),
            is_alive: true,
            user_defined_id: -1,
            changed: PolicySet::EMPTY,
        }
    }

    pub fn key(&self) -> InstanceHandle {
        InstanceHandle::from_guid(&self.guid)
    }

    /// View of this descriptor as the remote-reader proxy handed to local
    /// writers during matching.
    pub fn reader_proxy(&self) -> RemoteReaderProxy {
        RemoteReaderProxy {
            guid: self.guid,
            expects_inline_qos: self.expects_inline_qos,
            reliability: self.qos.reliability.kind,
            unicast_locators: self.unicast_locators.clone(),
            multicast_locators: self.multicast_locators.clone(),
        }
    }
}

/// One known participant, local or remote, with its nested endpoint
/// proxies.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantProxy {
    pub guid_prefix: GuidPrefix,
    pub protocol_version: (u8, u8),
    pub vendor_id: [u8; 2],
    pub expects_inline_qos: bool,
    pub metatraffic_unicast_locators: Vec<Locator>,
    pub metatraffic_multicast_locators: Vec<Locator>,
    pub default_unicast_locators: Vec<Locator>,
    pub default_multicast_locators: Vec<Locator>,
    pub available_builtin_endpoints: u32,
    pub lease_duration: RtpsDuration,
    pub manual_liveliness_count: i32,
    pub participant_name: String,
    /// Free-form `(key, value)` properties; carries static-EDP entity ids.
    pub properties: Vec<(String, String)>,
    pub is_alive: bool,
    pub writers: Vec<DiscoveredWriterData>,
    pub readers: Vec<DiscoveredReaderData>,
}

impl ParticipantProxy {
    pub fn new(guid_prefix: GuidPrefix) -> Self {
        Self {
            guid_prefix,
            protocol_version: PROTOCOL_VERSION,
            vendor_id: VENDOR_ID,
            expects_inline_qos: false,
            metatraffic_unicast_locators: Vec::new(),
            metatraffic_multicast_locators: Vec::new(),
            default_unicast_locators: Vec::new(),
            default_multicast_locators: Vec::new(),
            available_builtin_endpoints: 0,
            lease_duration: RtpsDuration::from_millis(30_000),
            manual_liveliness_count: 0,
            participant_name: String::new(),
            properties: Vec::new(),
            is_alive: true,
            writers: Vec::new(),
            readers: Vec::new(),
        }
    }

    pub fn guid(&self) -> GUID {
        GUID::new(self.guid_prefix, ENTITYID_PARTICIPANT)
    }

    pub fn key(&self) -> InstanceHandle {
        InstanceHandle::for_participant(&self.guid_prefix)
    }

    /// Overwrite the announcement-carried fields in place, preserving the
    /// endpoint proxies accumulated so far (re-announcement path).
    pub fn update_from(&mut self, other: &ParticipantProxy) {
        self.protocol_version = other.protocol_version;
        self.vendor_id = other.vendor_id;
        self.expects_inline_qos = other.expects_inline_qos;
        self.metatraffic_unicast_locators = other.metatraffic_unicast_locators.clone();
        self.metatraffic_multicast_locators = other.metatraffic_multicast_locators.clone();
        self.default_unicast_locators = other.default_unicast_locators.clone();
        self.default_multicast_locators = other.default_multicast_locators.clone();
        self.available_builtin_endpoints = other.available_builtin_endpoints;
        self.lease_duration = other.lease_duration;
        self.manual_liveliness_count = other.manual_liveliness_count;
        self.participant_name = other.participant_name.clone();
        self.properties = other.properties.clone();
    }

    /// Look up a writer proxy by full GUID.
    pub fn writer(&self, guid: &GUID) -> Option<&DiscoveredWriterData> {
        self.writers.iter().find(|w| w.guid == *guid)
    }

    /// Look up a reader proxy by full GUID.
    pub fn reader(&self, guid: &GUID) -> Option<&DiscoveredReaderData> {
        self.readers.iter().find(|r| r.guid == *guid)
    }
}

/// Live set of participant proxies, the local one included.
///
/// The proxy with the prefix passed to [`ProxyStore::new`] is the local
/// participant; it can never be removed.
#[derive(Debug)]
pub struct ProxyStore {
    local_prefix: GuidPrefix,
    participants: Vec<ParticipantProxy>,
}

impl ProxyStore {
    pub fn new(local: ParticipantProxy) -> Self {
        Self {
            local_prefix: local.guid_prefix,
            participants: vec![local],
        }
    }

    pub fn local_prefix(&self) -> GuidPrefix {
        self.local_prefix
    }

    pub fn local(&self) -> &ParticipantProxy {
        // The constructor guarantees the local proxy exists and remove()
        // refuses to take it out.
        self.get(&self.local_prefix).expect("local proxy present")
    }

    pub fn local_mut(&mut self) -> &mut ParticipantProxy {
        let prefix = self.local_prefix;
        self.get_mut(&prefix).expect("local proxy present")
    }

    pub fn get(&self, prefix: &GuidPrefix) -> Option<&ParticipantProxy> {
        self.participants.iter().find(|p| p.guid_prefix == *prefix)
    }

    pub fn get_mut(&mut self, prefix: &GuidPrefix) -> Option<&mut ParticipantProxy> {
        self.participants
            .iter_mut()
            .find(|p| p.guid_prefix == *prefix)
    }

    /// Fetch the proxy for `prefix`, inserting an empty one when unknown.
    /// The boolean is true when the proxy was just created.
    pub fn get_or_insert(&mut self, prefix: GuidPrefix) -> (&mut ParticipantProxy, bool) {
        if let Some(idx) = self
            .participants
            .iter()
            .position(|p| p.guid_prefix == prefix)
        {
            (&mut self.participants[idx], false)
        } else {
            self.participants.push(ParticipantProxy::new(prefix));
            let idx = self.participants.len() - 1;
            (&mut self.participants[idx], true)
        }
    }

    /// Insert a fully formed proxy. Rejects duplicate prefixes.
    pub fn insert(&mut self, proxy: ParticipantProxy) -> bool {
        if self.get(&proxy.guid_prefix).is_some() {
            log::warn!(
                "[store] Duplicate participant prefix {} rejected",
                proxy.guid_prefix
            );
            return false;
        }
        self.participants.push(proxy);
        true
    }

    /// Detach and return the proxy so the caller can iterate its
    /// endpoints for cascade cleanup. The local proxy is never removed.
    pub fn remove(&mut self, prefix: &GuidPrefix) -> Option<ParticipantProxy> {
        if *prefix == self.local_prefix {
            log::warn!("[store] Refusing to remove the local participant proxy");
            return None;
        }
        let idx = self
            .participants
            .iter()
            .position(|p| p.guid_prefix == *prefix)?;
        Some(self.participants.remove(idx))
    }

    /// Upsert a writer under its owning participant.
    ///
    /// Returns `None` (with a warning) when the participant is unknown or
    /// the descriptor violates a store invariant.
    pub fn upsert_writer(
        &mut self,
        prefix: &GuidPrefix,
        wdata: DiscoveredWriterData,
    ) -> Option<Upsert> {
        if !self.check_endpoint(prefix, &wdata.guid) {
            return None;
        }
        let in_use = self.guid_in_use_elsewhere(&wdata.guid, prefix);
        let proxy = self.get_mut(prefix)?;
        if let Some(existing) = proxy.writers.iter_mut().find(|w| w.guid == wdata.guid) {
            *existing = wdata;
            Some(Upsert::Updated)
        } else {
            if in_use || proxy.readers.iter().any(|r| r.guid == wdata.guid) {
                log::warn!("[store] Writer GUID {} already in use, rejected", wdata.guid);
                return None;
            }
            proxy.writers.push(wdata);
            Some(Upsert::Inserted)
        }
    }

    /// Upsert a reader under its owning participant. Same contract as
    /// [`ProxyStore::upsert_writer`].
    pub fn upsert_reader(
        &mut self,
        prefix: &GuidPrefix,
        rdata: DiscoveredReaderData,
    ) -> Option<Upsert> {
        if !self.check_endpoint(prefix, &rdata.guid) {
            return None;
        }
        let in_use = self.guid_in_use_elsewhere(&rdata.guid, prefix);
        let proxy = self.get_mut(prefix)?;
        if let Some(existing) = proxy.readers.iter_mut().find(|r| r.guid == rdata.guid) {
            *existing = rdata;
            Some(Upsert::Updated)
        } else {
            if in_use || proxy.writers.iter().any(|w| w.guid == rdata.guid) {
                log::warn!("[store] Reader GUID {} already in use, rejected", rdata.guid);
                return None;
            }
            proxy.readers.push(rdata);
            Some(Upsert::Inserted)
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParticipantProxy> {
        self.participants.iter()
    }

    /// Endpoint proxies of one participant. Callers hold the discovery
    /// lock across iteration.
    pub fn endpoints_of(
        &self,
        prefix: &GuidPrefix,
    ) -> Option<(&[DiscoveredWriterData], &[DiscoveredReaderData])> {
        self.get(prefix)
            .map(|p| (p.writers.as_slice(), p.readers.as_slice()))
    }

    /// All proxies except the local one.
    pub fn remotes(&self) -> impl Iterator<Item = &ParticipantProxy> {
        let local = self.local_prefix;
        self.participants.iter().filter(move |p| p.guid_prefix != local)
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Containment + built-in separation checks shared by both upserts.
    fn check_endpoint(&self, prefix: &GuidPrefix, guid: &GUID) -> bool {
        if guid.prefix != *prefix {
            log::warn!(
                "[store] Endpoint {} does not belong to participant {}, rejected",
                guid,
                prefix
            );
            return false;
        }
        if guid.entity_id.is_builtin() {
            log::warn!(
                "[store] Built-in entity id {} cannot be stored as a user endpoint",
                guid.entity_id
            );
            return false;
        }
        true
    }

    /// Full-GUID uniqueness across *other* participants. Containment
    /// (checked before) makes cross-participant duplicates impossible in
    /// practice, but a corrupted announcement must not corrupt the store.
    fn guid_in_use_elsewhere(&self, guid: &GUID, prefix: &GuidPrefix) -> bool {
        self.participants
            .iter()
            .filter(|p| p.guid_prefix != *prefix)
            .any(|p| {
                p.writers.iter().any(|w| w.guid == *guid)
                    || p.readers.iter().any(|r| r.guid == *guid)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::guid::{EntityId, ENTITYID_SEDP_PUBLICATIONS_WRITER};

    fn prefix(byte: u8) -> GuidPrefix {
        GuidPrefix([byte; 12])
    }

    fn writer(p: GuidPrefix, entity: [u8; 4]) -> DiscoveredWriterData {
        DiscoveredWriterData::new(
            GUID::new(p, EntityId(entity)),
            GUID::new(p, ENTITYID_PARTICIPANT),
            "T",
            "Data",
        )
    }

    fn store_with_remote(remote: GuidPrefix) -> ProxyStore {
        let mut store = ProxyStore::new(ParticipantProxy::new(prefix(1)));
        store.insert(ParticipantProxy::new(remote));
        store
    }

    #[test]
    fn test_local_proxy_always_present() {
        let store = ProxyStore::new(ParticipantProxy::new(prefix(1)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.local().guid_prefix, prefix(1));
        assert_eq!(store.remotes().count(), 0);
    }

    #[test]
    fn test_local_proxy_cannot_be_removed() {
        let mut store = ProxyStore::new(ParticipantProxy::new(prefix(1)));
        assert!(store.remove(&prefix(1)).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_or_insert_is_idempotent() {
        let mut store = ProxyStore::new(ParticipantProxy::new(prefix(1)));
        let (_, is_new) = store.get_or_insert(prefix(2));
        assert!(is_new);
        let (_, is_new) = store.get_or_insert(prefix(2));
        assert!(!is_new);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_upsert_writer_insert_then_update() {
        let remote = prefix(2);
        let mut store = store_with_remote(remote);

        let mut wdata = writer(remote, [0, 0, 1, 0x02]);
        assert_eq!(
            store.upsert_writer(&remote, wdata.clone()),
            Some(Upsert::Inserted)
        );

        wdata.type_name = "Data2".to_string();
        assert_eq!(store.upsert_writer(&remote, wdata), Some(Upsert::Updated));

        let proxy = store.get(&remote).expect("remote present");
        assert_eq!(proxy.writers.len(), 1);
        assert_eq!(proxy.writers[0].type_name, "Data2");
    }

    #[test]
    fn test_upsert_rejects_foreign_prefix() {
        let remote = prefix(2);
        let mut store = store_with_remote(remote);
        // Writer whose GUID belongs to a different participant.
        let wdata = writer(prefix(3), [0, 0, 1, 0x02]);
        assert_eq!(store.upsert_writer(&remote, wdata), None);
    }

    #[test]
    fn test_upsert_rejects_builtin_entity_id() {
        let remote = prefix(2);
        let mut store = store_with_remote(remote);
        let wdata = writer(remote, ENTITYID_SEDP_PUBLICATIONS_WRITER.0);
        assert_eq!(store.upsert_writer(&remote, wdata), None);
    }

    #[test]
    fn test_upsert_rejects_guid_collision_with_reader() {
        let remote = prefix(2);
        let mut store = store_with_remote(remote);
        let guid = GUID::new(remote, EntityId([0, 0, 1, 0x04]));
        let rdata =
            DiscoveredReaderData::new(guid, GUID::new(remote, ENTITYID_PARTICIPANT), "T", "Data");
        assert_eq!(
            store.upsert_reader(&remote, rdata),
            Some(Upsert::Inserted)
        );

        let wdata = DiscoveredWriterData::new(
            guid,
            GUID::new(remote, ENTITYID_PARTICIPANT),
            "T",
            "Data",
        );
        assert_eq!(store.upsert_writer(&remote, wdata), None);
    }

    #[test]
    fn test_remove_returns_proxy_for_cascade() {
        let remote = prefix(2);
        let mut store = store_with_remote(remote);
        store
            .upsert_writer(&remote, writer(remote, [0, 0, 1, 0x02]))
            .expect("insert succeeds");

        let (writers, readers) = store.endpoints_of(&remote).expect("remote present");
        assert_eq!(writers.len(), 1);
        assert!(readers.is_empty());

        let detached = store.remove(&remote).expect("proxy detached");
        assert_eq!(detached.writers.len(), 1);
        assert!(store.get(&remote).is_none());
        assert!(store.endpoints_of(&remote).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_update_from_preserves_endpoints() {
        let remote = prefix(2);
        let mut store = store_with_remote(remote);
        store
            .upsert_writer(&remote, writer(remote, [0, 0, 1, 0x02]))
            .expect("insert succeeds");

        let mut announcement = ParticipantProxy::new(remote);
        announcement.participant_name = "peer".to_string();
        announcement.lease_duration = RtpsDuration::from_millis(5_000);

        let proxy = store.get_mut(&remote).expect("remote present");
        proxy.update_from(&announcement);
        assert_eq!(proxy.participant_name, "peer");
        assert_eq!(proxy.writers.len(), 1);
    }
}
