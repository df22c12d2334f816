// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Static endpoint discovery from an XML file.
//!
//! The file declares, per participant name, the endpoints that
//! participant hosts. Endpoints of the participant whose name equals the
//! local one merge into the local proxy; every other participant becomes
//! a pre-populated remote proxy, keyed by a deterministic synthetic
//! prefix until SPDP reports the real one. No descriptor meta-traffic is
//! exchanged in this mode.
//!
//! # File format
//!
//! ```xml
//! <staticdiscovery>
//!   <participant>
//!     <name>participantA</name>
//!     <endpoint type="WRITER">
//!       <id>1</id>
//!       <topicName>SensorTopic</topicName>
//!       <topicDataType>SensorData</topicDataType>
//!       <topicKind>WITH_KEY</topicKind>
//!       <reliabilityKind>RELIABLE</reliabilityKind>
//!       <unicastLocator address="192.168.0.4" port="7411"/>
//!     </endpoint>
//!   </participant>
//! </staticdiscovery>
//! ```

use std::net::Ipv4Addr;
use std::path::Path;

use roxmltree::{Document, Node};

use crate::core::guid::{EntityId, GuidPrefix, TopicKind, GUID};
use crate::core::locator::Locator;
use crate::edp::{pair_local_reader_with_discovered_writer, pair_local_writer_with_discovered_reader};
use crate::endpoint::{LocalReader, LocalWriter, StateKind};
use crate::qos::{ReliabilityKind, RtpsDuration};
use crate::store::{DiscoveredReaderData, DiscoveredWriterData, ParticipantProxy, ProxyStore};
use crate::{DiscoveryError, DiscoveryResult};

/// Everything the XML file contributes at init time.
pub struct StaticSeed {
    /// Endpoints declared for the local participant name.
    pub local_writers: Vec<DiscoveredWriterData>,
    pub local_readers: Vec<DiscoveredReaderData>,
    /// Pre-populated remote proxies (synthetic prefixes, `is_alive`).
    pub remotes: Vec<ParticipantProxy>,
}

pub struct StaticEdp {
    /// Declared endpoint ids, kept for duplicate detection and logs.
    endpoint_ids: Vec<i16>,
}

impl StaticEdp {
    /// Load the static discovery file.
    ///
    /// # Errors
    /// `DiscoveryError::XmlParse` on unreadable files, malformed XML, a
    /// wrong root element, or duplicate endpoint ids. Unknown tags are
    /// logged and skipped.
    pub fn from_file(
        path: &Path,
        local_name: &str,
        local_prefix: GuidPrefix,
    ) -> DiscoveryResult<(Self, StaticSeed)> {
        let content = std::fs::read_to_string(path).map_err(|err| DiscoveryError::XmlParse {
            reason: format!("{}: {}", path.display(), err),
        })?;
        Self::parse_xml(&content, local_name, local_prefix)
    }

    /// Parse static discovery XML content.
    pub fn parse_xml(
        content: &str,
        local_name: &str,
        local_prefix: GuidPrefix,
    ) -> DiscoveryResult<(Self, StaticSeed)> {
        let doc = Document::parse(content).map_err(|err| DiscoveryError::XmlParse {
            reason: err.to_string(),
        })?;
        let root = doc.root_element();
        if root.tag_name().name() != "staticdiscovery" {
            return Err(DiscoveryError::XmlParse {
                reason: format!("expected <staticdiscovery> root, got <{}>", root.tag_name().name()),
            });
        }

        let mut edp = Self {
            endpoint_ids: Vec::new(),
        };
        let mut seed = StaticSeed {
            local_writers: Vec::new(),
            local_readers: Vec::new(),
            remotes: Vec::new(),
        };

        for participant in root
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "participant")
        {
            edp.load_participant(&participant, local_name, local_prefix, &mut seed)?;
        }

        log::info!(
            "[static-edp] Loaded {} local writer(s), {} local reader(s), {} remote participant(s)",
            seed.local_writers.len(),
            seed.local_readers.len(),
            seed.remotes.len()
        );
        Ok((edp, seed))
    }

    fn load_participant(
        &mut self,
        node: &Node,
        local_name: &str,
        local_prefix: GuidPrefix,
        seed: &mut StaticSeed,
    ) -> DiscoveryResult<()> {
        let name = node
            .children()
            .find(|n| n.is_element() && n.tag_name().name() == "name")
            .and_then(|n| n.text())
            .unwrap_or("")
            .trim()
            .to_string();
        if name.is_empty() {
            return Err(DiscoveryError::XmlParse {
                reason: "participant without <name>".to_string(),
            });
        }

        let is_local = name == local_name;
        let prefix = if is_local {
            local_prefix
        } else {
            GuidPrefix::from_name(&name)
        };

        let mut writers = Vec::new();
        let mut readers = Vec::new();
        for endpoint in node
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "endpoint")
        {
            match endpoint.attribute("type") {
                Some("WRITER") => {
                    writers.push(self.load_endpoint_writer(&endpoint, prefix, &name)?);
                }
                Some("READER") => {
                    readers.push(self.load_endpoint_reader(&endpoint, prefix, &name)?);
                }
                other => {
                    log::warn!(
                        "[static-edp] Endpoint of participant '{}' must be READER or WRITER, got {:?}",
                        name,
                        other
                    );
                }
            }
        }

        if is_local {
            seed.local_writers.extend(writers);
            seed.local_readers.extend(readers);
        } else {
            let mut proxy = ParticipantProxy::new(prefix);
            proxy.participant_name = name;
            proxy.lease_duration = RtpsDuration::INFINITE;
            proxy.is_alive = true;
            proxy.writers = writers;
            proxy.readers = readers;
            seed.remotes.push(proxy);
        }
        Ok(())
    }

    fn claim_id(&mut self, id: i16, participant: &str) -> DiscoveryResult<()> {
        if self.endpoint_ids.contains(&id) {
            return Err(DiscoveryError::XmlParse {
                reason: format!("repeated endpoint id {} (participant '{}')", id, participant),
            });
        }
        self.endpoint_ids.push(id);
        Ok(())
    }

    fn load_endpoint_writer(
        &mut self,
        node: &Node,
        prefix: GuidPrefix,
        participant: &str,
    ) -> DiscoveryResult<DiscoveredWriterData> {
        let common = self.load_endpoint_common(node, participant, true)?;
        let guid = GUID::new(
            prefix,
            EntityId::from_user_id(
                common.id as u16,
                EntityId::user_kind(true, common.topic_kind),
            ),
        );
        let mut wdata = DiscoveredWriterData::new(
            guid,
            GUID::new(prefix, crate::core::guid::ENTITYID_PARTICIPANT),
            &common.topic_name,
            &common.type_name,
        );
        wdata.topic_kind = common.topic_kind;
        wdata.qos.reliability.kind = common.reliability;
        wdata.unicast_locators = common.unicast_locators;
        wdata.multicast_locators = common.multicast_locators;
        wdata.user_defined_id = common.id;
        Ok(wdata)
    }

    fn load_endpoint_reader(
        &mut self,
        node: &Node,
        prefix: GuidPrefix,
        participant: &str,
    ) -> DiscoveryResult<DiscoveredReaderData> {
        let common = self.load_endpoint_common(node, participant, false)?;
        let guid = GUID::new(
            prefix,
            EntityId::from_user_id(
                common.id as u16,
                EntityId::user_kind(false, common.topic_kind),
            ),
        );
        let mut rdata = DiscoveredReaderData::new(
            guid,
            GUID::new(prefix, crate::core::guid::ENTITYID_PARTICIPANT),
            &common.topic_name,
            &common.type_name,
        );
        rdata.topic_kind = common.topic_kind;
        rdata.expects_inline_qos = common.expects_inline_qos;
        rdata.qos.reliability.kind = common.reliability;
        rdata.unicast_locators = common.unicast_locators;
        rdata.multicast_locators = common.multicast_locators;
        rdata.user_defined_id = common.id;
        Ok(rdata)
    }

    fn load_endpoint_common(
        &mut self,
        node: &Node,
        participant: &str,
        is_writer: bool,
    ) -> DiscoveryResult<EndpointRecord> {
        let mut record = EndpointRecord::default();
        let mut have_id = false;

        for child in node.children().filter(Node::is_element) {
            let text = child.text().unwrap_or("").trim();
            match child.tag_name().name() {
                "id" => {
                    let id = text.parse::<i16>().map_err(|_| DiscoveryError::XmlParse {
                        reason: format!("invalid endpoint id '{}'", text),
                    })?;
                    self.claim_id(id, participant)?;
                    record.id = id;
                    have_id = true;
                }
                "topicName" => record.topic_name = text.to_string(),
                "topicDataType" => record.type_name = text.to_string(),
                "topicKind" => record.topic_kind = parse_topic_kind(text)?,
                "reliabilityKind" => record.reliability = parse_reliability_kind(text)?,
                "expectsInlineQos" => {
                    if is_writer {
                        log::warn!("[static-edp] Writers do not use expectsInlineQos, ignoring");
                    } else {
                        record.expects_inline_qos = match text {
                            "true" => true,
                            "false" => false,
                            other => {
                                return Err(DiscoveryError::XmlParse {
                                    reason: format!("invalid expectsInlineQos '{}'", other),
                                })
                            }
                        };
                    }
                }
                "unicastLocator" => {
                    record.unicast_locators.push(parse_locator_attrs(&child)?);
                }
                "multicastLocator" => {
                    record.multicast_locators.push(parse_locator_attrs(&child)?);
                }
                "topic" => {
                    // Compact form combining name, data type, and kind.
                    record.topic_name = child.attribute("name").unwrap_or("").to_string();
                    record.type_name = child.attribute("dataType").unwrap_or("").to_string();
                    record.topic_kind = parse_topic_kind(child.attribute("kind").unwrap_or(""))?;
                }
                other => {
                    log::warn!("[static-edp] Unknown endpoint tag <{}>, ignoring", other);
                }
            }
        }

        if !have_id {
            return Err(DiscoveryError::XmlParse {
                reason: format!("endpoint without <id> (participant '{}')", participant),
            });
        }
        Ok(record)
    }

    /// Matching in static mode: identical predicates to the dynamic EDP,
    /// gated on the remote side being an XML-declared endpoint
    /// (`user_defined_id > 0`).
    pub fn local_writer_matching(
        &mut self,
        writer: &dyn LocalWriter,
        _first_time: bool,
        store: &mut ProxyStore,
    ) -> bool {
        let mut matched = false;
        for proxy in store.remotes() {
            for rdata in proxy.readers.iter().filter(|r| r.user_defined_id > 0) {
                matched |= pair_local_writer_with_discovered_reader(writer, rdata);
            }
        }
        matched
    }

    pub fn local_reader_matching(
        &mut self,
        reader: &dyn LocalReader,
        _first_time: bool,
        store: &mut ProxyStore,
    ) -> bool {
        let mut matched = false;
        for proxy in store.remotes() {
            for wdata in proxy.writers.iter().filter(|w| w.user_defined_id > 0) {
                matched |= pair_local_reader_with_discovered_writer(reader, wdata);
            }
        }
        matched
    }

    /// Best-effort compatibility log: compare a created local writer
    /// against the XML record with the same user-defined id. Mismatches
    /// warn and never fail creation.
    pub fn check_local_writer(&self, writer: &dyn LocalWriter, local: &ParticipantProxy) {
        let id = writer.user_defined_id();
        let Some(declared) = local.writers.iter().find(|w| w.user_defined_id == id) else {
            log::warn!(
                "[static-edp] Writer with id {} not declared in the XML file",
                id
            );
            return;
        };
        check_endpoint_consistency(
            "writer",
            declared.topic_kind,
            &declared.topic_name,
            &declared.type_name,
            declared.qos.reliability.kind,
            &declared.unicast_locators,
            &declared.multicast_locators,
            writer.topic_kind(),
            &writer.topic_name(),
            &writer.type_name(),
            writer.state_kind(),
            &writer.unicast_locators(),
            &writer.multicast_locators(),
        );
    }

    /// Reader-side counterpart of [`StaticEdp::check_local_writer`].
    pub fn check_local_reader(&self, reader: &dyn LocalReader, local: &ParticipantProxy) {
        let id = reader.user_defined_id();
        let Some(declared) = local.readers.iter().find(|r| r.user_defined_id == id) else {
            log::warn!(
                "[static-edp] Reader with id {} not declared in the XML file",
                id
            );
            return;
        };
        check_endpoint_consistency(
            "reader",
            declared.topic_kind,
            &declared.topic_name,
            &declared.type_name,
            declared.qos.reliability.kind,
            &declared.unicast_locators,
            &declared.multicast_locators,
            reader.topic_kind(),
            &reader.topic_name(),
            &reader.type_name(),
            reader.state_kind(),
            &reader.unicast_locators(),
            &reader.multicast_locators(),
        );
    }
}

#[derive(Default)]
struct EndpointRecord {
    id: i16,
    topic_name: String,
    type_name: String,
    topic_kind: TopicKind,
    reliability: ReliabilityKind,
    expects_inline_qos: bool,
    unicast_locators: Vec<Locator>,
    multicast_locators: Vec<Locator>,
}

fn parse_topic_kind(text: &str) -> DiscoveryResult<TopicKind> {
    match text {
        "NO_KEY" => Ok(TopicKind::NoKey),
        "WITH_KEY" => Ok(TopicKind::WithKey),
        other => Err(DiscoveryError::XmlParse {
            reason: format!("topic kind '{}' is not valid", other),
        }),
    }
}

fn parse_reliability_kind(text: &str) -> DiscoveryResult<ReliabilityKind> {
    match text {
        "RELIABLE" => Ok(ReliabilityKind::Reliable),
        "BEST_EFFORT" => Ok(ReliabilityKind::BestEffort),
        other => Err(DiscoveryError::XmlParse {
            reason: format!("reliability kind '{}' is not valid", other),
        }),
    }
}

fn parse_locator_attrs(node: &Node) -> DiscoveryResult<Locator> {
    let address = node
        .attribute("address")
        .unwrap_or("0.0.0.0")
        .parse::<Ipv4Addr>()
        .map_err(|_| DiscoveryError::XmlParse {
            reason: format!(
                "invalid locator address '{}'",
                node.attribute("address").unwrap_or("")
            ),
        })?;
    let port = node
        .attribute("port")
        .unwrap_or("0")
        .parse::<u16>()
        .map_err(|_| DiscoveryError::XmlParse {
            reason: format!(
                "invalid locator port '{}'",
                node.attribute("port").unwrap_or("")
            ),
        })?;
    Ok(Locator::udpv4(address, port))
}

#[allow(clippy::too_many_arguments)]
fn check_endpoint_consistency(
    what: &str,
    declared_kind: TopicKind,
    declared_topic: &str,
    declared_type: &str,
    declared_reliability: ReliabilityKind,
    declared_unicast: &[Locator],
    declared_multicast: &[Locator],
    kind: TopicKind,
    topic: &str,
    type_name: &str,
    state: StateKind,
    unicast: &[Locator],
    multicast: &[Locator],
) {
    if declared_kind != kind {
        log::warn!("[static-edp] Topic kind of {} differs from the XML record", what);
    }
    if declared_topic != topic {
        log::warn!(
            "[static-edp] Topic name of {} differs from XML: '{}' vs '{}'",
            what,
            topic,
            declared_topic
        );
    }
    if declared_type != type_name {
        log::warn!(
            "[static-edp] Topic data type of {} differs from XML: '{}' vs '{}'",
            what,
            type_name,
            declared_type
        );
    }
    let state_ok = match state {
        StateKind::Stateless => declared_reliability == ReliabilityKind::BestEffort,
        StateKind::Stateful => declared_reliability == ReliabilityKind::Reliable,
    };
    if !state_ok {
        log::warn!(
            "[static-edp] State kind of {} is incompatible with the declared reliability",
            what
        );
    }
    for locator in unicast {
        if !declared_unicast.contains(locator) {
            log::warn!(
                "[static-edp] Unicast locator {} of {} not found in the XML file",
                locator,
                what
            );
        }
    }
    for locator in multicast {
        if !declared_multicast.contains(locator) {
            log::warn!(
                "[static-edp] Multicast locator {} of {} not found in the XML file",
                locator,
                what
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<staticdiscovery>
  <participant>
    <name>participantA</name>
    <endpoint type="WRITER">
      <id>1</id>
      <topicName>SensorTopic</topicName>
      <topicDataType>SensorData</topicDataType>
      <topicKind>WITH_KEY</topicKind>
      <reliabilityKind>RELIABLE</reliabilityKind>
      <unicastLocator address="192.168.0.4" port="7411"/>
    </endpoint>
  </participant>
  <participant>
    <name>participantB</name>
    <endpoint type="READER">
      <id>2</id>
      <expectsInlineQos>true</expectsInlineQos>
      <topic name="SensorTopic" dataType="SensorData" kind="WITH_KEY"/>
      <reliabilityKind>RELIABLE</reliabilityKind>
      <unicastLocator address="192.168.0.5" port="7413"/>
      <multicastLocator address="239.255.0.1" port="7401"/>
    </endpoint>
  </participant>
</staticdiscovery>"#;

    fn load(local: &str) -> (StaticEdp, StaticSeed) {
        StaticEdp::parse_xml(SAMPLE, local, GuidPrefix([1; 12])).expect("valid XML")
    }

    #[test]
    fn test_local_participant_endpoints_merge_locally() {
        let (_, seed) = load("participantA");
        assert_eq!(seed.local_writers.len(), 1);
        assert!(seed.local_readers.is_empty());
        assert_eq!(seed.remotes.len(), 1);

        let writer = &seed.local_writers[0];
        assert_eq!(writer.topic_name, "SensorTopic");
        assert_eq!(writer.topic_kind, TopicKind::WithKey);
        assert_eq!(writer.qos.reliability.kind, ReliabilityKind::Reliable);
        assert_eq!(writer.user_defined_id, 1);
        assert_eq!(writer.guid.prefix, GuidPrefix([1; 12]));
    }

    #[test]
    fn test_remote_participant_prepopulated() {
        let (_, seed) = load("participantA");
        let remote = &seed.remotes[0];
        assert_eq!(remote.participant_name, "participantB");
        assert!(remote.guid_prefix.is_synthetic());
        assert!(remote.is_alive);
        assert_eq!(remote.readers.len(), 1);

        let reader = &remote.readers[0];
        assert!(reader.expects_inline_qos);
        assert_eq!(reader.user_defined_id, 2);
        assert_eq!(reader.unicast_locators.len(), 1);
        assert_eq!(reader.multicast_locators.len(), 1);
        // Entity id synthesized from id 2 + keyed-reader kind byte.
        assert_eq!(reader.guid.entity_id.0, [0x00, 0x00, 0x02, 0x07]);
    }

    #[test]
    fn test_compact_topic_element() {
        let (_, seed) = load("participantB");
        assert_eq!(seed.local_readers.len(), 1);
        assert_eq!(seed.local_readers[0].topic_name, "SensorTopic");
        assert_eq!(seed.local_readers[0].type_name, "SensorData");
    }

    #[test]
    fn test_duplicate_id_is_fatal() {
        let xml = r#"<staticdiscovery>
  <participant>
    <name>p</name>
    <endpoint type="WRITER"><id>1</id><topicName>T</topicName><topicDataType>D</topicDataType><topicKind>NO_KEY</topicKind><reliabilityKind>BEST_EFFORT</reliabilityKind></endpoint>
    <endpoint type="WRITER"><id>1</id><topicName>T</topicName><topicDataType>D</topicDataType><topicKind>NO_KEY</topicKind><reliabilityKind>BEST_EFFORT</reliabilityKind></endpoint>
  </participant>
</staticdiscovery>"#;
        let result = StaticEdp::parse_xml(xml, "p", GuidPrefix([1; 12]));
        assert!(matches!(result, Err(DiscoveryError::XmlParse { .. })));
    }

    #[test]
    fn test_bad_root_is_fatal() {
        let result = StaticEdp::parse_xml("<foo/>", "p", GuidPrefix([1; 12]));
        assert!(matches!(result, Err(DiscoveryError::XmlParse { .. })));
    }

    #[test]
    fn test_bad_topic_kind_is_fatal() {
        let xml = r#"<staticdiscovery>
  <participant>
    <name>p</name>
    <endpoint type="WRITER"><id>1</id><topicKind>SOME_KEY</topicKind></endpoint>
  </participant>
</staticdiscovery>"#;
        let result = StaticEdp::parse_xml(xml, "p", GuidPrefix([1; 12]));
        assert!(matches!(result, Err(DiscoveryError::XmlParse { .. })));
    }

    #[test]
    fn test_matching_gated_on_user_defined_id() {
        let (mut edp, seed) = load("participantA");
        let mut store = ProxyStore::new(ParticipantProxy::new(GuidPrefix([1; 12])));
        for remote in seed.remotes {
            store.insert(remote);
        }
        // Zero the declared reader's id: it must no longer match.
        {
            let prefix = GuidPrefix::from_name("participantB");
            let proxy = store.get_mut(&prefix).expect("remote seeded");
            proxy.readers[0].user_defined_id = 0;
        }

        struct W;
        impl crate::endpoint::LocalEndpoint for W {
            fn guid(&self) -> GUID {
                GUID::new(GuidPrefix([1; 12]), EntityId([0, 0, 1, 0x02]))
            }
            fn topic_name(&self) -> String {
                "SensorTopic".to_string()
            }
            fn type_name(&self) -> String {
                "SensorData".to_string()
            }
            fn topic_kind(&self) -> TopicKind {
                TopicKind::WithKey
            }
            fn state_kind(&self) -> StateKind {
                StateKind::Stateful
            }
            fn qos(&self) -> crate::qos::Qos {
                crate::qos::Qos::reliable()
            }
            fn unicast_locators(&self) -> Vec<Locator> {
                Vec::new()
            }
            fn multicast_locators(&self) -> Vec<Locator> {
                Vec::new()
            }
        }
        impl LocalWriter for W {
            fn reader_locator_add(&self, _l: Locator, _q: bool) -> bool {
                false
            }
            fn reader_locator_remove(&self, _l: &Locator) -> bool {
                false
            }
            fn matched_reader_add(&self, _p: crate::endpoint::RemoteReaderProxy) -> bool {
                true
            }
            fn matched_reader_remove(&self, _g: &GUID) -> bool {
                false
            }
        }

        assert!(!edp.local_writer_matching(&W, true, &mut store));
    }
}
