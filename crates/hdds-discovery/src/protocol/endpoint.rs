// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WriterData/ReaderData record codec.
//!
//! The emission order is fixed so receivers can reconstruct keying
//! identity before interpreting QoS: locators first, then participant
//! GUID, topic name, type name, key hash, endpoint GUID, then each QoS
//! policy that is send-always or dirty. QoS-only re-announcements thus
//! stay small.

use crate::core::guid::{GuidPrefix, TopicKind, GUID};
use crate::protocol::constants::{
    PID_ENDPOINT_GUID, PID_EXPECTS_INLINE_QOS, PID_KEY_HASH, PID_MULTICAST_LOCATOR,
    PID_PARTICIPANT_GUID, PID_TOPIC_NAME, PID_TYPE_NAME, PID_UNICAST_LOCATOR,
};
use crate::protocol::parameter::{
    guid_value, locator_value, parse_guid, parse_locator, parse_string, string_value, Endianness,
    ParameterList,
};
use crate::protocol::policy::{apply_qos_parameter, push_qos_policies};
use crate::protocol::ParseError;
use crate::store::{DiscoveredReaderData, DiscoveredWriterData};

/// Serialize a writer descriptor.
pub fn writer_data_to_parameters(wdata: &DiscoveredWriterData, e: Endianness) -> ParameterList {
    let mut list = ParameterList::new();

    for loc in &wdata.unicast_locators {
        list.push(PID_UNICAST_LOCATOR, locator_value(loc, e));
    }
    for loc in &wdata.multicast_locators {
        list.push(PID_MULTICAST_LOCATOR, locator_value(loc, e));
    }
    list.push(PID_PARTICIPANT_GUID, guid_value(&wdata.participant_guid));
    list.push(PID_TOPIC_NAME, string_value(&wdata.topic_name, e));
    list.push(PID_TYPE_NAME, string_value(&wdata.type_name, e));
    list.push(PID_KEY_HASH, wdata.key().0.to_vec());
    list.push(PID_ENDPOINT_GUID, guid_value(&wdata.guid));

    push_qos_policies(&mut list, &wdata.qos, wdata.changed, true, e);
    list
}

/// Serialize a reader descriptor. Identical to the writer layout with the
/// inline-QoS expectation inserted after the locators and no ownership
/// strength.
pub fn reader_data_to_parameters(rdata: &DiscoveredReaderData, e: Endianness) -> ParameterList {
    let mut list = ParameterList::new();

    for loc in &rdata.unicast_locators {
        list.push(PID_UNICAST_LOCATOR, locator_value(loc, e));
    }
    for loc in &rdata.multicast_locators {
        list.push(PID_MULTICAST_LOCATOR, locator_value(loc, e));
    }
    list.push(
        PID_EXPECTS_INLINE_QOS,
        vec![u8::from(rdata.expects_inline_qos), 0, 0, 0],
    );
    list.push(PID_PARTICIPANT_GUID, guid_value(&rdata.participant_guid));
    list.push(PID_TOPIC_NAME, string_value(&rdata.topic_name, e));
    list.push(PID_TYPE_NAME, string_value(&rdata.type_name, e));
    list.push(PID_KEY_HASH, rdata.key().0.to_vec());
    list.push(PID_ENDPOINT_GUID, guid_value(&rdata.guid));

    push_qos_policies(&mut list, &rdata.qos, rdata.changed, false, e);
    list
}

/// Reconstruct a writer descriptor.
///
/// Unknown PIDs are skipped with a warning, never fatal. When
/// ENDPOINT_GUID is absent the GUID is derived from KEY_HASH. The topic
/// kind is classified from the entity kind byte; an unexpected kind byte
/// is logged and processing continues.
pub fn parameters_to_writer_data(
    list: &ParameterList,
    e: Endianness,
) -> Result<DiscoveredWriterData, ParseError> {
    let mut wdata = DiscoveredWriterData::new(GUID::zero(), GUID::zero(), "", "");
    let mut have_guid = false;

    for param in list.iter() {
        let value = param.value.as_slice();
        match param.pid {
            PID_UNICAST_LOCATOR => {
                if let Some(loc) = parse_locator(value, e) {
                    wdata.unicast_locators.push(loc);
                }
            }
            PID_MULTICAST_LOCATOR => {
                if let Some(loc) = parse_locator(value, e) {
                    wdata.multicast_locators.push(loc);
                }
            }
            PID_PARTICIPANT_GUID => {
                if let Some(guid) = parse_guid(value) {
                    wdata.participant_guid = guid;
                }
            }
            PID_TOPIC_NAME => {
                if let Some(name) = parse_string(value, e) {
                    wdata.topic_name = name;
                }
            }
            PID_TYPE_NAME => {
                if let Some(name) = parse_string(value, e) {
                    wdata.type_name = name;
                }
            }
            PID_KEY_HASH => {
                // Key hash is the endpoint GUID for discovery records;
                // only used when ENDPOINT_GUID itself is missing.
                if !have_guid {
                    if let Some(guid) = parse_guid(value) {
                        wdata.guid = guid;
                        have_guid = true;
                    }
                }
            }
            PID_ENDPOINT_GUID => {
                if let Some(guid) = parse_guid(value) {
                    wdata.guid = guid;
                    have_guid = true;
                }
            }
            pid => {
                if !apply_qos_parameter(&mut wdata.qos, pid, value, e) {
                    log::debug!("[sedp] Unknown PID {:#06x} in writer data, skipping", pid);
                }
            }
        }
    }

    if !have_guid {
        return Err(ParseError::InvalidFormat);
    }
    wdata.topic_kind = classify_topic_kind(&wdata.guid, true);
    Ok(wdata)
}

/// Reconstruct a reader descriptor. Same tolerance rules as the writer
/// path.
pub fn parameters_to_reader_data(
    list: &ParameterList,
    e: Endianness,
) -> Result<DiscoveredReaderData, ParseError> {
    let mut rdata = DiscoveredReaderData::new(GUID::zero(), GUID::zero(), "", "");
    let mut have_guid = false;

    for param in list.iter() {
        let value = param.value.as_slice();
        match param.pid {
            PID_UNICAST_LOCATOR => {
                if let Some(loc) = parse_locator(value, e) {
                    rdata.unicast_locators.push(loc);
                }
            }
            PID_MULTICAST_LOCATOR => {
                if let Some(loc) = parse_locator(value, e) {
                    rdata.multicast_locators.push(loc);
                }
            }
            PID_EXPECTS_INLINE_QOS => {
                if !value.is_empty() {
                    rdata.expects_inline_qos = value[0] != 0;
                }
            }
            PID_PARTICIPANT_GUID => {
                if let Some(guid) = parse_guid(value) {
                    rdata.participant_guid = guid;
                }
            }
            PID_TOPIC_NAME => {
                if let Some(name) = parse_string(value, e) {
                    rdata.topic_name = name;
                }
            }
            PID_TYPE_NAME => {
                if let Some(name) = parse_string(value, e) {
                    rdata.type_name = name;
                }
            }
            PID_KEY_HASH => {
                if !have_guid {
                    if let Some(guid) = parse_guid(value) {
                        rdata.guid = guid;
                        have_guid = true;
                    }
                }
            }
            PID_ENDPOINT_GUID => {
                if let Some(guid) = parse_guid(value) {
                    rdata.guid = guid;
                    have_guid = true;
                }
            }
            pid => {
                if !apply_qos_parameter(&mut rdata.qos, pid, value, e) {
                    log::debug!("[sedp] Unknown PID {:#06x} in reader data, skipping", pid);
                }
            }
        }
    }

    if !have_guid {
        return Err(ParseError::InvalidFormat);
    }
    rdata.topic_kind = classify_topic_kind(&rdata.guid, false);
    Ok(rdata)
}

/// Topic kind from the entity kind byte (writer 0x03 / reader 0x04 ->
/// NO_KEY, writer 0x02 / reader 0x07 -> WITH_KEY). A kind byte outside
/// the user-endpoint range is logged and treated as NO_KEY.
fn classify_topic_kind(guid: &GUID, is_writer: bool) -> TopicKind {
    match guid.entity_id.topic_kind() {
        Some(kind) => kind,
        None => {
            log::warn!(
                "[sedp] Unexpected entity kind {:#04x} on {} {}, assuming NO_KEY",
                guid.entity_id.kind(),
                if is_writer { "writer" } else { "reader" },
                guid
            );
            TopicKind::NoKey
        }
    }
}

/// Owning-participant prefix of a decoded endpoint descriptor.
pub fn owning_prefix(participant_guid: &GUID, endpoint_guid: &GUID) -> GuidPrefix {
    if participant_guid.is_zero() {
        endpoint_guid.prefix
    } else {
        participant_guid.prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::guid::{EntityId, GuidPrefix, ENTITYID_PARTICIPANT};
    use crate::core::locator::Locator;
    use crate::qos::{PolicySet, Qos};
    use std::net::Ipv4Addr;

    fn prefix() -> GuidPrefix {
        GuidPrefix([7; 12])
    }

    fn sample_writer() -> DiscoveredWriterData {
        let mut wdata = DiscoveredWriterData::new(
            GUID::new(prefix(), EntityId([0, 0, 1, 0x02])),
            GUID::new(prefix(), ENTITYID_PARTICIPANT),
            "SensorTopic",
            "SensorData",
        );
        wdata.topic_kind = TopicKind::WithKey;
        wdata.qos = Qos::reliable();
        wdata
            .unicast_locators
            .push(Locator::udpv4(Ipv4Addr::new(10, 0, 0, 2), 7411));
        wdata
            .multicast_locators
            .push(Locator::udpv4(Ipv4Addr::new(239, 255, 0, 1), 7401));
        wdata
    }

    fn sample_reader() -> DiscoveredReaderData {
        let mut rdata = DiscoveredReaderData::new(
            GUID::new(prefix(), EntityId([0, 0, 2, 0x07])),
            GUID::new(prefix(), ENTITYID_PARTICIPANT),
            "SensorTopic",
            "SensorData",
        );
        rdata.topic_kind = TopicKind::WithKey;
        rdata.expects_inline_qos = true;
        rdata.qos = Qos::reliable();
        rdata
            .unicast_locators
            .push(Locator::udpv4(Ipv4Addr::new(10, 0, 0, 3), 7413));
        rdata
    }

    #[test]
    fn test_writer_data_round_trip() {
        for e in [Endianness::Little, Endianness::Big] {
            let wdata = sample_writer();
            let list = writer_data_to_parameters(&wdata, e);
            let decoded = parameters_to_writer_data(&list, e).expect("parse succeeds");
            assert_eq!(decoded, wdata);
        }
    }

    #[test]
    fn test_reader_data_round_trip() {
        for e in [Endianness::Little, Endianness::Big] {
            let rdata = sample_reader();
            let list = reader_data_to_parameters(&rdata, e);
            let decoded = parameters_to_reader_data(&list, e).expect("parse succeeds");
            assert_eq!(decoded, rdata);
        }
    }

    #[test]
    fn test_dirty_qos_round_trip() {
        let mut wdata = sample_writer();
        wdata.qos.partition.names = vec!["cell4".to_string()];
        wdata.changed = PolicySet::diff(&Qos::reliable(), &wdata.qos);

        let list = writer_data_to_parameters(&wdata, Endianness::Little);
        let decoded =
            parameters_to_writer_data(&list, Endianness::Little).expect("parse succeeds");
        assert_eq!(decoded.qos.partition.names, vec!["cell4".to_string()]);
    }

    #[test]
    fn test_key_hash_fallback_derives_guid() {
        let wdata = sample_writer();
        let full = writer_data_to_parameters(&wdata, Endianness::Little);
        let mut list = ParameterList::new();
        for param in full.iter() {
            if param.pid != PID_ENDPOINT_GUID {
                list.push(param.pid, param.value.clone());
            }
        }
        let decoded =
            parameters_to_writer_data(&list, Endianness::Little).expect("parse succeeds");
        assert_eq!(decoded.guid, wdata.guid);
        assert_eq!(decoded.topic_kind, TopicKind::WithKey);
    }

    #[test]
    fn test_missing_identity_is_invalid() {
        let mut list = ParameterList::new();
        list.push(PID_TOPIC_NAME, string_value("T", Endianness::Little));
        assert_eq!(
            parameters_to_writer_data(&list, Endianness::Little),
            Err(ParseError::InvalidFormat)
        );
    }

    #[test]
    fn test_unknown_kind_byte_warns_and_continues() {
        let mut wdata = sample_writer();
        wdata.guid = GUID::new(prefix(), EntityId([0, 0, 1, 0x55]));
        let list = writer_data_to_parameters(&wdata, Endianness::Little);
        let decoded =
            parameters_to_writer_data(&list, Endianness::Little).expect("parse succeeds");
        assert_eq!(decoded.topic_kind, TopicKind::NoKey);
    }

    #[test]
    fn test_owning_prefix_prefers_participant_guid() {
        let wdata = sample_writer();
        assert_eq!(
            owning_prefix(&wdata.participant_guid, &wdata.guid),
            prefix()
        );
        assert_eq!(owning_prefix(&GUID::zero(), &wdata.guid), prefix());
    }
}
