// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Built-in discovery endpoints.
//!
//! These carry discovery records only; the heavy reliability machinery
//! (heartbeat/acknack/gap) lives in the writer/reader subsystems. What
//! discovery needs locally is the history bookkeeping, the destination
//! sets, and a per-remote-writer sequence watermark so re-deliveries and
//! stale retransmissions never reorder proxy state.

use std::sync::Arc;

use crate::core::cache::{CacheChange, ChangeKind, InstanceHandle};
use crate::core::guid::GUID;
use crate::core::locator::Locator;
use crate::endpoint::{RemoteReaderProxy, RemoteWriterProxy};
use crate::transport::MetaTransport;

/// Writer side of a built-in endpoint pair.
///
/// KEEP_LAST semantics with a per-instance depth of 1: one live change
/// per announced record, replaced on re-announcement.
pub struct BuiltinWriter {
    guid: GUID,
    history: Vec<CacheChange>,
    next_sequence: i64,
    reader_locators: Vec<Locator>,
    matched_readers: Vec<RemoteReaderProxy>,
    transport: Arc<dyn MetaTransport>,
}

impl BuiltinWriter {
    pub fn new(guid: GUID, transport: Arc<dyn MetaTransport>) -> Self {
        Self {
            guid,
            history: Vec::new(),
            next_sequence: 1,
            reader_locators: Vec::new(),
            matched_readers: Vec::new(),
            transport,
        }
    }

    pub fn guid(&self) -> GUID {
        self.guid
    }

    /// Allocate a change with the next sequence number.
    pub fn new_change(
        &mut self,
        kind: ChangeKind,
        instance_handle: InstanceHandle,
        payload: Vec<u8>,
    ) -> CacheChange {
        let sequence_number = self.next_sequence;
        self.next_sequence += 1;
        CacheChange {
            kind,
            writer_guid: self.guid,
            sequence_number,
            instance_handle,
            payload,
        }
    }

    /// Store a change, evicting the previous change of the same instance.
    pub fn add_change(&mut self, change: CacheChange) {
        self.history
            .retain(|c| c.instance_handle != change.instance_handle);
        self.history.push(change);
    }

    pub fn history_size(&self) -> usize {
        self.history.len()
    }

    /// Drop the oldest change by sequence number.
    pub fn remove_min_seq_change(&mut self) {
        if let Some(idx) = self
            .history
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| c.sequence_number)
            .map(|(idx, _)| idx)
        {
            self.history.remove(idx);
        }
    }

    pub fn get_last_added(&self) -> Option<&CacheChange> {
        self.history
            .iter()
            .max_by_key(|c| c.sequence_number)
    }

    pub fn reader_locator_add(&mut self, locator: Locator) -> bool {
        if self.reader_locators.contains(&locator) {
            return false;
        }
        self.reader_locators.push(locator);
        true
    }

    pub fn reader_locator_remove(&mut self, locator: &Locator) -> bool {
        let before = self.reader_locators.len();
        self.reader_locators.retain(|l| l != locator);
        self.reader_locators.len() != before
    }

    pub fn reader_locators(&self) -> &[Locator] {
        &self.reader_locators
    }

    pub fn matched_reader_add(&mut self, proxy: RemoteReaderProxy) -> bool {
        if self.matched_readers.iter().any(|r| r.guid == proxy.guid) {
            return false;
        }
        self.matched_readers.push(proxy);
        true
    }

    pub fn matched_reader_remove(&mut self, guid: &GUID) -> bool {
        let before = self.matched_readers.len();
        self.matched_readers.retain(|r| r.guid != *guid);
        self.matched_readers.len() != before
    }

    /// Push the whole history to one reader. Used when a reliable
    /// channel is bootstrapped towards a freshly discovered peer, so
    /// descriptors announced before the peer was known still reach it.
    pub fn send_history_to(&self, reader: &RemoteReaderProxy) {
        let locators: &[Locator] = if reader.unicast_locators.is_empty() {
            &reader.multicast_locators
        } else {
            &reader.unicast_locators
        };
        for change in &self.history {
            for locator in locators {
                if !self.transport.send(locator, change) {
                    log::debug!(
                        "[builtin] catch-up send to {} failed (writer {}, seq {})",
                        locator,
                        self.guid,
                        change.sequence_number
                    );
                }
            }
        }
    }

    /// Queue a change for transmission to every destination: the plain
    /// reader locators plus each matched reader (unicast first, multicast
    /// as fallback). Send failures are logged; the periodic resend
    /// retries.
    pub fn unsent_change_add(&self, change: &CacheChange) {
        for locator in &self.reader_locators {
            if !self.transport.send(locator, change) {
                log::debug!(
                    "[builtin] send to {} failed (writer {}, seq {})",
                    locator,
                    self.guid,
                    change.sequence_number
                );
            }
        }
        for reader in &self.matched_readers {
            let locators: &[Locator] = if reader.unicast_locators.is_empty() {
                &reader.multicast_locators
            } else {
                &reader.unicast_locators
            };
            for locator in locators {
                if !self.transport.send(locator, change) {
                    log::debug!(
                        "[builtin] send to {} failed (writer {}, reader {})",
                        locator,
                        self.guid,
                        reader.guid
                    );
                }
            }
        }
    }
}

struct RemoteWriterState {
    proxy: RemoteWriterProxy,
    highest_sequence: i64,
}

/// Reader side of a built-in endpoint pair.
///
/// SEDP readers accept only matched remote writers and enforce in-order
/// delivery per writer; the SPDP reader accepts from anyone (participant
/// data is last-writer-wins by arrival order).
pub struct BuiltinReader {
    guid: GUID,
    require_matched_writer: bool,
    matched_writers: Vec<RemoteWriterState>,
    last_added: Option<CacheChange>,
}

impl BuiltinReader {
    pub fn new(guid: GUID, require_matched_writer: bool) -> Self {
        Self {
            guid,
            require_matched_writer,
            matched_writers: Vec::new(),
            last_added: None,
        }
    }

    pub fn guid(&self) -> GUID {
        self.guid
    }

    pub fn matched_writer_add(&mut self, proxy: RemoteWriterProxy) -> bool {
        if self
            .matched_writers
            .iter()
            .any(|w| w.proxy.guid == proxy.guid)
        {
            return false;
        }
        self.matched_writers.push(RemoteWriterState {
            proxy,
            highest_sequence: 0,
        });
        true
    }

    pub fn matched_writer_remove(&mut self, guid: &GUID) -> bool {
        let before = self.matched_writers.len();
        self.matched_writers.retain(|w| w.proxy.guid != *guid);
        self.matched_writers.len() != before
    }

    pub fn matched_writer_count(&self) -> usize {
        self.matched_writers.len()
    }

    /// Admission check for an inbound change.
    ///
    /// Returns false for changes from unmatched writers (when matching is
    /// required) and for sequence numbers at or below the per-writer
    /// watermark, so retransmissions in any arrival permutation collapse
    /// to the newest state.
    pub fn accept(&mut self, change: &CacheChange) -> bool {
        if let Some(state) = self
            .matched_writers
            .iter_mut()
            .find(|w| w.proxy.guid == change.writer_guid)
        {
            if change.sequence_number <= state.highest_sequence {
                log::debug!(
                    "[builtin] reader {} dropping stale seq {} from {} (watermark {})",
                    self.guid,
                    change.sequence_number,
                    change.writer_guid,
                    state.highest_sequence
                );
                return false;
            }
            state.highest_sequence = change.sequence_number;
        } else if self.require_matched_writer {
            log::debug!(
                "[builtin] reader {} dropping change from unmatched writer {}",
                self.guid,
                change.writer_guid
            );
            return false;
        }
        self.last_added = Some(change.clone());
        true
    }

    pub fn get_last_added(&self) -> Option<&CacheChange> {
        self.last_added.as_ref()
    }
}
