// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Participant Discovery Protocol.
//!
//! Owns the proxy store, the SPDP built-in endpoints, the chosen EDP
//! variant, and every discovery timer. One `parking_lot::Mutex` protects
//! the whole discovery state; inbound processing is split into a
//! lock-free decode/stage phase and a commit phase under the lock, so no
//! callback ever re-enters it.
//!
//! Locking order, never reversed: discovery lock, then built-in endpoint
//! state, then user endpoint locks (through the `LocalWriter` /
//! `LocalReader` traits). Timer callbacks acquire only the discovery
//! lock and hold a weak handle to the PDP: shutdown cancels every timer
//! before the PDP can drop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::{metatraffic_unicast_port, DiscoveryConfig, EdpConfig, Runtime};
use crate::core::cache::{CacheChange, ChangeKind};
use crate::core::guid::{
    EntityId, GuidPrefix, ENTITYID_PARTICIPANT, ENTITYID_SEDP_PUBLICATIONS_WRITER,
    ENTITYID_SEDP_SUBSCRIPTIONS_WRITER, ENTITYID_SPDP_PARTICIPANT_READER,
    ENTITYID_SPDP_PARTICIPANT_WRITER, GUID,
};
use crate::core::locator::Locator;
use crate::edp::{DynamicEdp, Edp, StaticEdp};
use crate::endpoint::builtin::{BuiltinReader, BuiltinWriter};
use crate::endpoint::{LocalReader, LocalWriter, StateKind};
use crate::protocol::constants::{
    BUILTIN_ENDPOINT_PARTICIPANT_MESSAGE_DATA_READER,
    BUILTIN_ENDPOINT_PARTICIPANT_MESSAGE_DATA_WRITER,
    DISC_BUILTIN_ENDPOINT_PARTICIPANT_ANNOUNCER, DISC_BUILTIN_ENDPOINT_PARTICIPANT_DETECTOR,
    STATICEDP_READER_PROPERTY_PREFIX, STATICEDP_WRITER_PROPERTY_PREFIX,
};
use crate::protocol::parameter::{decapsulate, encapsulate, Endianness};
use crate::protocol::{parameters_to_participant, participant_to_parameters};
use crate::qos::RtpsDuration;
use crate::scheduler::{EventLoop, TimerAction, TimerHandle};
use crate::store::{ParticipantProxy, ProxyStore};
use crate::transport::MetaTransport;
use crate::{DiscoveryError, DiscoveryResult};

/// Lease intervals are clamped so `Instant + interval` can never
/// overflow on an infinite announced lease.
const MAX_LEASE_INTERVAL: Duration = Duration::from_secs(24 * 3600);

/// Participant discovery entry point.
///
/// Cheap to clone; all clones share one discovery state.
#[derive(Clone)]
pub struct Pdp {
    inner: Arc<PdpInner>,
}

struct PdpInner {
    config: DiscoveryConfig,
    runtime: Runtime,
    events: Arc<EventLoop>,
    state: Mutex<PdpState>,
}

struct PdpState {
    store: ProxyStore,
    spdp_writer: BuiltinWriter,
    spdp_reader: BuiltinReader,
    edp: Edp,
    local_writers: Vec<Arc<dyn LocalWriter>>,
    local_readers: Vec<Arc<dyn LocalReader>>,
    local_has_changed: bool,
    lease_timers: HashMap<GuidPrefix, TimerHandle>,
    resend_timer: Option<TimerHandle>,
}

impl Pdp {
    /// Bring up participant discovery.
    ///
    /// Derives the well-known ports, constructs the local participant
    /// proxy, creates the SPDP built-ins, loads/creates the configured
    /// EDP, sends the first announcement, and starts the periodic resend
    /// timer.
    ///
    /// # Errors
    /// Configuration problems and (static EDP) XML load failures are
    /// fatal and surface here; everything later is recovered in-band.
    pub fn init(
        config: DiscoveryConfig,
        participant_id: u8,
        transport: Arc<dyn MetaTransport>,
        events: Arc<EventLoop>,
    ) -> DiscoveryResult<Self> {
        let runtime = Runtime::new(&config, participant_id)?;
        let prefix = runtime.guid_prefix;
        log::info!(
            "[spdp] Initializing participant discovery ({}, domain {}, participant {})",
            prefix,
            runtime.domain_id,
            participant_id
        );

        let mut local = ParticipantProxy::new(prefix);
        local.participant_name = config.participant_name.clone();
        local.expects_inline_qos = config.expects_inline_qos;
        local.lease_duration = RtpsDuration::from_std(config.lease_duration);
        local.metatraffic_multicast_locators = vec![runtime.metatraffic_multicast_locator()];
        local.metatraffic_unicast_locators = runtime.metatraffic_unicast_locators();
        local.default_unicast_locators = runtime.default_unicast_locators();
        local.available_builtin_endpoints = DISC_BUILTIN_ENDPOINT_PARTICIPANT_ANNOUNCER
            | DISC_BUILTIN_ENDPOINT_PARTICIPANT_DETECTOR;
        if config.use_writer_liveliness_protocol {
            local.available_builtin_endpoints |= BUILTIN_ENDPOINT_PARTICIPANT_MESSAGE_DATA_WRITER
                | BUILTIN_ENDPOINT_PARTICIPANT_MESSAGE_DATA_READER;
        }

        let mut static_remotes = Vec::new();
        let edp = match &config.edp {
            EdpConfig::Dynamic {
                use_pub_writer_sub_reader,
                use_pub_reader_sub_writer,
            } => {
                let edp = DynamicEdp::new(
                    prefix,
                    *use_pub_writer_sub_reader,
                    *use_pub_reader_sub_writer,
                    &transport,
                );
                local.available_builtin_endpoints |= edp.builtin_endpoint_mask();
                Edp::Dynamic(edp)
            }
            EdpConfig::Static { xml_path } => {
                let (edp, seed) =
                    StaticEdp::from_file(xml_path, &config.participant_name, prefix)?;
                local.writers = seed.local_writers;
                local.readers = seed.local_readers;
                static_remotes = seed.remotes;
                Edp::Static(edp)
            }
        };

        let mut spdp_writer = BuiltinWriter::new(
            GUID::new(prefix, ENTITYID_SPDP_PARTICIPANT_WRITER),
            Arc::clone(&transport),
        );
        spdp_writer.reader_locator_add(runtime.metatraffic_multicast_locator());
        for peer in &config.initial_peers {
            for peer_participant in 0..=config.initial_peer_max_participant_id {
                let port = metatraffic_unicast_port(runtime.domain_id, peer_participant);
                if port == runtime.metatraffic_unicast_port
                    && runtime.unicast_addresses.contains(peer)
                {
                    continue; // never announce to ourselves in unicast
                }
                spdp_writer.reader_locator_add(Locator::udpv4(*peer, port));
            }
        }

        let spdp_reader =
            BuiltinReader::new(GUID::new(prefix, ENTITYID_SPDP_PARTICIPANT_READER), false);

        let mut store = ProxyStore::new(local);
        for remote in static_remotes {
            store.insert(remote);
        }

        let pdp = Self {
            inner: Arc::new(PdpInner {
                config,
                runtime,
                events,
                state: Mutex::new(PdpState {
                    store,
                    spdp_writer,
                    spdp_reader,
                    edp,
                    local_writers: Vec::new(),
                    local_readers: Vec::new(),
                    local_has_changed: true,
                    lease_timers: HashMap::new(),
                    resend_timer: None,
                }),
            }),
        };

        pdp.announce(true);
        pdp.inner.install_resend_timer();
        Ok(pdp)
    }

    /// GUID prefix of the local participant.
    pub fn guid_prefix(&self) -> GuidPrefix {
        self.inner.runtime.guid_prefix
    }

    /// Locators on which this participant expects meta-traffic.
    pub fn metatraffic_listen_locators(&self) -> Vec<Locator> {
        let mut locators = self.inner.runtime.metatraffic_unicast_locators();
        locators.push(self.inner.runtime.metatraffic_multicast_locator());
        locators
    }

    /// Build-and-send of the local participant data (spec of the SPDP
    /// writer). With `new_change == false` the cached change is reused
    /// unless local data is dirty.
    pub fn announce(&self, new_change: bool) {
        self.inner.announce(new_change);
    }

    /// Route an inbound discovery sample to the right built-in reader,
    /// based on the writer entity id the framing layer extracted.
    pub fn dispatch_metatraffic(&self, change: CacheChange) {
        match change.writer_guid.entity_id {
            ENTITYID_SPDP_PARTICIPANT_WRITER => self.inner.on_participant_data(&change),
            ENTITYID_SEDP_PUBLICATIONS_WRITER => self.inner.on_publications_data(&change),
            ENTITYID_SEDP_SUBSCRIPTIONS_WRITER => self.inner.on_subscriptions_data(&change),
            other => {
                log::debug!("[spdp] Meta-traffic from unhandled entity {}, dropped", other);
            }
        }
    }

    /// Register a local writer and run endpoint matching for it.
    pub fn local_writer_matching(&self, writer: &Arc<dyn LocalWriter>, first_time: bool) -> bool {
        self.inner.local_writer_matching(writer, first_time)
    }

    /// Register a local reader and run endpoint matching for it.
    pub fn local_reader_matching(&self, reader: &Arc<dyn LocalReader>, first_time: bool) -> bool {
        self.inner.local_reader_matching(reader, first_time)
    }

    /// Mark the local participant data dirty; the next announcement is
    /// rebuilt from the live proxy fields.
    pub fn local_participant_has_changed(&self) {
        self.inner.state.lock().local_has_changed = true;
    }

    /// Remove a remote participant and unbind everything that was
    /// matched against its endpoints.
    pub fn remove_remote_participant(&self, prefix: &GuidPrefix) -> bool {
        let mut state = self.inner.state.lock();
        remove_remote_locked(&mut state, prefix)
    }

    /// Stop periodic announcements (test hook).
    pub fn stop_announcement(&self) {
        if let Some(timer) = self.inner.state.lock().resend_timer.take() {
            timer.cancel();
        }
    }

    /// Restart periodic announcements (test hook).
    pub fn reset_announcement(&self) {
        let mut state = self.inner.state.lock();
        match &state.resend_timer {
            Some(timer) => timer.restart(self.inner.config.resend_period),
            None => {
                drop(state);
                self.inner.install_resend_timer();
            }
        }
    }

    /// Cancel every discovery timer. The caller drains/joins the shared
    /// event loop afterwards; only then may the PDP drop.
    pub fn shutdown(&self) {
        let mut state = self.inner.state.lock();
        if let Some(timer) = state.resend_timer.take() {
            timer.cancel();
        }
        for (_, timer) in state.lease_timers.drain() {
            timer.cancel();
        }
        log::info!("[spdp] Participant discovery stopped ({})", self.guid_prefix());
    }

    // ---- introspection (used by tests and tooling) ----

    /// Snapshot of every known participant proxy.
    pub fn participants(&self) -> Vec<ParticipantProxy> {
        self.inner.state.lock().store.iter().cloned().collect()
    }

    /// Snapshot of one remote participant.
    pub fn participant(&self, prefix: &GuidPrefix) -> Option<ParticipantProxy> {
        self.inner.state.lock().store.get(prefix).cloned()
    }

    /// Snapshot of the local participant proxy.
    pub fn local_participant(&self) -> ParticipantProxy {
        self.inner.state.lock().store.local().clone()
    }
}

impl PdpInner {
    fn install_resend_timer(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let handle = self.events.schedule(
            self.config.resend_period,
            Box::new(move || match weak.upgrade() {
                Some(inner) => {
                    inner.announce(false);
                    TimerAction::Repeat
                }
                None => TimerAction::Stop,
            }),
        );
        self.state.lock().resend_timer = Some(handle);
    }

    fn announce(&self, new_change: bool) {
        let mut state = self.state.lock();
        let st = &mut *state;

        let change = if new_change || st.local_has_changed {
            refresh_local_participant(st);
            let list = participant_to_parameters(st.store.local(), Endianness::Little);
            let payload = match encapsulate(&list, Endianness::Little) {
                Ok(payload) => payload,
                Err(err) => {
                    log::warn!("[spdp] Participant data encoding failed: {}", err);
                    return;
                }
            };
            if st.spdp_writer.history_size() > 0 {
                st.spdp_writer.remove_min_seq_change();
            }
            let key = st.store.local().key();
            let change = st.spdp_writer.new_change(ChangeKind::Alive, key, payload);
            st.spdp_writer.add_change(change.clone());
            st.local_has_changed = false;
            change
        } else {
            match st.spdp_writer.get_last_added() {
                Some(change) => change.clone(),
                None => {
                    log::warn!("[spdp] No cached participant data to announce");
                    return;
                }
            }
        };

        st.spdp_writer.unsent_change_add(&change);
    }

    /// Inbound participant data. Decode and the self-echo/protocol gates
    /// run without the lock; the store commit takes it.
    fn on_participant_data(self: &Arc<Self>, change: &CacheChange) {
        let incoming = match decapsulate(&change.payload)
            .map_err(DiscoveryError::Malformed)
            .and_then(|(list, e)| parameters_to_participant(&list, e))
        {
            Ok(incoming) => incoming,
            Err(DiscoveryError::IncompatibleProtocol {
                remote_major,
                local_major,
            }) => {
                log::warn!(
                    "[spdp] Participant with protocol {} < {} dropped",
                    remote_major,
                    local_major
                );
                return;
            }
            Err(err) => {
                log::warn!("[spdp] Malformed participant data dropped: {}", err);
                return;
            }
        };

        if incoming.guid_prefix == self.runtime.guid_prefix {
            return; // own announcement echoed back
        }

        let mut state = self.state.lock();
        let st = &mut *state;
        st.spdp_reader.accept(change);

        let prefix = incoming.guid_prefix;
        if st.store.get(&prefix).is_none() {
            log::info!(
                "[spdp] Discovered participant {} ('{}')",
                prefix,
                incoming.participant_name
            );
            let mut proxy = incoming;
            proxy.is_alive = true;
            let lease = proxy.lease_duration;
            if !st.store.insert(proxy) {
                return;
            }

            // Future re-announcements reach the peer directly in unicast.
            let learned = st.store.get(&prefix).map(|p| {
                (
                    p.metatraffic_unicast_locators.clone(),
                    p.metatraffic_multicast_locators.clone(),
                    p.clone(),
                )
            });
            if let Some((unicast, multicast, proxy_copy)) = learned {
                for locator in unicast.iter().chain(multicast.iter()) {
                    st.spdp_writer.reader_locator_add(*locator);
                }
                st.edp.assign_remote_endpoints(&proxy_copy);
            }

            adopt_static_declared(st, prefix);
            self.start_lease_watchdog(st, prefix, lease);
        } else {
            let lease = incoming.lease_duration;
            if let Some(proxy) = st.store.get_mut(&prefix) {
                proxy.update_from(&incoming);
                proxy.is_alive = true;
            }
            if let Some(timer) = st.lease_timers.get(&prefix) {
                timer.restart(lease_interval(lease));
            }
            adopt_static_declared(st, prefix);
        }
    }

    /// Two-strike lease watchdog: the first silent period clears
    /// `is_alive`, the second removes the participant.
    fn start_lease_watchdog(
        self: &Arc<Self>,
        st: &mut PdpState,
        prefix: GuidPrefix,
        lease: RtpsDuration,
    ) {
        let weak = Arc::downgrade(self);
        let handle = self.events.schedule(
            lease_interval(lease),
            Box::new(move || {
                let Some(inner) = weak.upgrade() else {
                    return TimerAction::Stop;
                };
                let mut state = inner.state.lock();
                let st = &mut *state;
                match st.store.get_mut(&prefix) {
                    None => TimerAction::Stop,
                    Some(proxy) if proxy.is_alive => {
                        proxy.is_alive = false;
                        TimerAction::Repeat
                    }
                    Some(_) => {
                        log::warn!("[spdp] Lease of {} expired, removing participant", prefix);
                        remove_remote_locked(st, &prefix);
                        TimerAction::Stop
                    }
                }
            }),
        );
        st.lease_timers.insert(prefix, handle);
    }

    fn on_publications_data(&self, change: &CacheChange) {
        if change.writer_guid.prefix == self.runtime.guid_prefix {
            return;
        }
        let mut state = self.state.lock();
        let st = &mut *state;
        match &mut st.edp {
            Edp::Dynamic(edp) => {
                edp.on_publications_data(change, &mut st.store, &st.local_readers);
            }
            Edp::Static(_) => {
                log::debug!("[sedp] Publications data ignored in static mode");
            }
        }
    }

    fn on_subscriptions_data(&self, change: &CacheChange) {
        if change.writer_guid.prefix == self.runtime.guid_prefix {
            return;
        }
        let mut state = self.state.lock();
        let st = &mut *state;
        match &mut st.edp {
            Edp::Dynamic(edp) => {
                edp.on_subscriptions_data(change, &mut st.store, &st.local_writers);
            }
            Edp::Static(_) => {
                log::debug!("[sedp] Subscriptions data ignored in static mode");
            }
        }
    }

    fn local_writer_matching(&self, writer: &Arc<dyn LocalWriter>, first_time: bool) -> bool {
        let mut state = self.state.lock();
        let st = &mut *state;

        if let Edp::Static(edp) = &st.edp {
            // Static participant data carries the endpoint id properties.
            st.local_has_changed = true;
            if writer.user_defined_id() > 0 {
                edp.check_local_writer(writer.as_ref(), st.store.local());
            }
        }
        if first_time
            && !st
                .local_writers
                .iter()
                .any(|w| w.guid() == writer.guid())
        {
            st.local_writers.push(Arc::clone(writer));
        }
        st.edp
            .local_writer_matching(writer.as_ref(), first_time, &mut st.store)
    }

    fn local_reader_matching(&self, reader: &Arc<dyn LocalReader>, first_time: bool) -> bool {
        let mut state = self.state.lock();
        let st = &mut *state;

        if let Edp::Static(edp) = &st.edp {
            st.local_has_changed = true;
            if reader.user_defined_id() > 0 {
                edp.check_local_reader(reader.as_ref(), st.store.local());
            }
        }
        if first_time
            && !st
                .local_readers
                .iter()
                .any(|r| r.guid() == reader.guid())
        {
            st.local_readers.push(Arc::clone(reader));
        }
        st.edp
            .local_reader_matching(reader.as_ref(), first_time, &mut st.store)
    }
}

fn lease_interval(lease: RtpsDuration) -> Duration {
    lease.to_std().min(MAX_LEASE_INTERVAL)
}

/// Rebuild the announcement-relevant local proxy fields. Only the
/// static-EDP property list is derived state today; locators and names
/// are fixed at init.
fn refresh_local_participant(st: &mut PdpState) {
    if !matches!(st.edp, Edp::Static(_)) {
        return;
    }
    let mut properties = Vec::new();
    for writer in &st.local_writers {
        if writer.user_defined_id() > 0 {
            properties.push((
                format!("{}{}", STATICEDP_WRITER_PROPERTY_PREFIX, writer.user_defined_id()),
                dotted_entity_id(&writer.guid().entity_id),
            ));
        }
    }
    for reader in &st.local_readers {
        if reader.user_defined_id() > 0 {
            properties.push((
                format!("{}{}", STATICEDP_READER_PROPERTY_PREFIX, reader.user_defined_id()),
                dotted_entity_id(&reader.guid().entity_id),
            ));
        }
    }
    st.store.local_mut().properties = properties;
}

/// `b0.b1.b2.b3` rendering used inside the static-EDP property list.
fn dotted_entity_id(entity_id: &EntityId) -> String {
    format!(
        "{}.{}.{}.{}",
        entity_id.0[0], entity_id.0[1], entity_id.0[2], entity_id.0[3]
    )
}

fn entity_id_from_properties(
    properties: &[(String, String)],
    key_prefix: &str,
    user_id: i16,
) -> Option<EntityId> {
    let key = format!("{}{}", key_prefix, user_id);
    let value = properties.iter().find(|(k, _)| *k == key).map(|(_, v)| v)?;
    let mut bytes = [0u8; 4];
    let mut parts = value.split('.');
    for byte in &mut bytes {
        *byte = parts.next()?.trim().parse().ok()?;
    }
    Some(EntityId(bytes))
}

/// Re-key the XML-declared proxy of a participant onto the real prefix
/// reported by SPDP, replacing synthesized entity ids with the
/// advertised ones, then re-run matching for the adopted endpoints.
fn adopt_static_declared(st: &mut PdpState, prefix: GuidPrefix) {
    if !matches!(st.edp, Edp::Static(_)) {
        return;
    }
    let Some(incoming) = st.store.get(&prefix) else {
        return;
    };
    let name = incoming.participant_name.clone();
    let properties = incoming.properties.clone();
    if name.is_empty() {
        return;
    }
    let declared_prefix = st
        .store
        .iter()
        .find(|p| p.guid_prefix.is_synthetic() && p.participant_name == name)
        .map(|p| p.guid_prefix);
    let Some(declared_prefix) = declared_prefix else {
        return;
    };
    let Some(declared) = st.store.get(&declared_prefix).cloned() else {
        return;
    };
    // Unbind anything matched against the synthetic GUIDs before they
    // are replaced by the real ones.
    remove_remote_locked(st, &declared_prefix);
    log::info!(
        "[static-edp] Adopting declared endpoints of '{}' onto {}",
        name,
        prefix
    );

    for mut wdata in declared.writers {
        let entity_id = entity_id_from_properties(
            &properties,
            STATICEDP_WRITER_PROPERTY_PREFIX,
            wdata.user_defined_id,
        )
        .unwrap_or(wdata.guid.entity_id);
        wdata.guid = GUID::new(prefix, entity_id);
        wdata.participant_guid = GUID::new(prefix, ENTITYID_PARTICIPANT);
        st.store.upsert_writer(&prefix, wdata);
    }
    for mut rdata in declared.readers {
        let entity_id = entity_id_from_properties(
            &properties,
            STATICEDP_READER_PROPERTY_PREFIX,
            rdata.user_defined_id,
        )
        .unwrap_or(rdata.guid.entity_id);
        rdata.guid = GUID::new(prefix, entity_id);
        rdata.participant_guid = GUID::new(prefix, ENTITYID_PARTICIPANT);
        st.store.upsert_reader(&prefix, rdata);
    }

    // The adopted endpoints are new GUIDs; give every registered local
    // endpoint a chance to bind to them.
    let writers = st.local_writers.clone();
    let readers = st.local_readers.clone();
    for writer in &writers {
        st.edp
            .local_writer_matching(writer.as_ref(), false, &mut st.store);
    }
    for reader in &readers {
        st.edp
            .local_reader_matching(reader.as_ref(), false, &mut st.store);
    }
}

/// Cascade removal under the discovery lock.
///
/// The proxy is detached first so its endpoint lists can be walked, then
/// every local endpoint unbinds, then the EDP drops its reliable
/// meta-traffic bindings. Handlers running on transport threads resolve
/// prefixes through the store, so nothing dangles once this returns.
fn remove_remote_locked(st: &mut PdpState, prefix: &GuidPrefix) -> bool {
    let Some(proxy) = st.store.remove(prefix) else {
        return false;
    };

    for wdata in &proxy.writers {
        for reader in &st.local_readers {
            reader.matched_writer_remove(&wdata.guid);
        }
    }
    for rdata in &proxy.readers {
        for writer in &st.local_writers {
            match writer.state_kind() {
                StateKind::Stateless => {
                    for locator in rdata
                        .unicast_locators
                        .iter()
                        .chain(rdata.multicast_locators.iter())
                    {
                        writer.reader_locator_remove(locator);
                    }
                }
                StateKind::Stateful => {
                    writer.matched_reader_remove(&rdata.guid);
                }
            }
        }
    }

    st.edp.remove_remote_endpoints(prefix);
    if let Some(timer) = st.lease_timers.remove(prefix) {
        timer.cancel();
    }
    log::info!("[spdp] Removed remote participant {}", prefix);
    true
}
