// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Seam to the writer/reader subsystems.
//!
//! Discovery never owns user endpoints; it drives them through these
//! traits. Implementations live in the endpoint layer and use interior
//! mutability: the matching engine calls them while holding the discovery
//! lock, and the lock order is discovery lock, then built-in endpoint
//! state, then the user endpoint's own lock.

pub mod builtin;

use crate::core::guid::{TopicKind, GUID};
use crate::core::locator::Locator;
use crate::qos::{Qos, ReliabilityKind};

/// Whether an endpoint runs the stateless or stateful RTPS machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKind {
    Stateless,
    Stateful,
}

/// Remote writer handed to a local reader when a match is established.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteWriterProxy {
    pub guid: GUID,
    pub unicast_locators: Vec<Locator>,
    pub multicast_locators: Vec<Locator>,
}

/// Remote reader handed to a local writer when a match is established.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteReaderProxy {
    pub guid: GUID,
    pub expects_inline_qos: bool,
    pub reliability: ReliabilityKind,
    pub unicast_locators: Vec<Locator>,
    pub multicast_locators: Vec<Locator>,
}

/// Descriptor surface every user endpoint exposes to discovery.
pub trait LocalEndpoint: Send + Sync {
    fn guid(&self) -> GUID;
    fn topic_name(&self) -> String;
    fn type_name(&self) -> String;
    fn topic_kind(&self) -> TopicKind;
    fn state_kind(&self) -> StateKind;
    fn qos(&self) -> Qos;
    fn unicast_locators(&self) -> Vec<Locator>;
    fn multicast_locators(&self) -> Vec<Locator>;

    /// Static-EDP record id; anything <= 0 means "not statically declared".
    fn user_defined_id(&self) -> i16 {
        -1
    }
}

/// Operations discovery invokes on a local writer.
///
/// The `add` operations return true only when the binding is new; the
/// matching engine relies on that to fire listeners exactly once per
/// (local, remote) pair.
pub trait LocalWriter: LocalEndpoint {
    /// Stateless path: register a destination locator.
    fn reader_locator_add(&self, locator: Locator, expects_inline_qos: bool) -> bool;

    /// Stateless path: drop a destination locator.
    fn reader_locator_remove(&self, locator: &Locator) -> bool;

    /// Stateful path: register a matched remote reader.
    fn matched_reader_add(&self, proxy: RemoteReaderProxy) -> bool;

    /// Stateful path: drop a matched remote reader.
    fn matched_reader_remove(&self, guid: &GUID) -> bool;

    /// Listener hook, invoked after at least one binding was added.
    fn on_publication_matched(&self, _remote: GUID) {}
}

/// Operations discovery invokes on a local reader.
pub trait LocalReader: LocalEndpoint {
    fn expects_inline_qos(&self) -> bool {
        false
    }

    fn matched_writer_add(&self, proxy: RemoteWriterProxy) -> bool;

    fn matched_writer_remove(&self, guid: &GUID) -> bool;

    /// Listener hook, invoked after the binding was added.
    fn on_subscription_matched(&self, _remote: GUID) {}
}
