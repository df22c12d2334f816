// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! ParticipantData record codec.
//!
//! Emission order follows the announcement builder of the wire format:
//! protocol version, vendor, inline-QoS flag, GUID, locator lists, lease,
//! built-in endpoint set, entity name, optional property list.

use crate::core::guid::{GuidPrefix, PROTOCOL_VERSION};
use crate::protocol::constants::{
    PID_BUILTIN_ENDPOINT_SET, PID_DEFAULT_MULTICAST_LOCATOR, PID_DEFAULT_UNICAST_LOCATOR,
    PID_ENTITY_NAME, PID_EXPECTS_INLINE_QOS, PID_METATRAFFIC_MULTICAST_LOCATOR,
    PID_METATRAFFIC_UNICAST_LOCATOR, PID_PARTICIPANT_GUID, PID_PARTICIPANT_LEASE_DURATION,
    PID_PROTOCOL_VERSION, PID_VENDOR_ID,
};
use crate::protocol::parameter::{
    duration_value, guid_value, locator_value, parse_duration, parse_guid, parse_locator,
    parse_string, read_u32, string_value, write_u32, Endianness, ParameterList,
};
use crate::protocol::ParseError;
use crate::store::ParticipantProxy;
use crate::{DiscoveryError, DiscoveryResult};

/// Build the parameter list announcing `proxy`.
pub fn participant_to_parameters(proxy: &ParticipantProxy, e: Endianness) -> ParameterList {
    let mut list = ParameterList::new();

    list.push(
        PID_PROTOCOL_VERSION,
        vec![proxy.protocol_version.0, proxy.protocol_version.1, 0, 0],
    );
    list.push(
        PID_VENDOR_ID,
        vec![proxy.vendor_id[0], proxy.vendor_id[1], 0, 0],
    );
    list.push(
        PID_EXPECTS_INLINE_QOS,
        vec![u8::from(proxy.expects_inline_qos), 0, 0, 0],
    );
    list.push(PID_PARTICIPANT_GUID, guid_value(&proxy.guid()));

    for loc in &proxy.metatraffic_multicast_locators {
        list.push(PID_METATRAFFIC_MULTICAST_LOCATOR, locator_value(loc, e));
    }
    for loc in &proxy.metatraffic_unicast_locators {
        list.push(PID_METATRAFFIC_UNICAST_LOCATOR, locator_value(loc, e));
    }
    for loc in &proxy.default_unicast_locators {
        list.push(PID_DEFAULT_UNICAST_LOCATOR, locator_value(loc, e));
    }
    for loc in &proxy.default_multicast_locators {
        list.push(PID_DEFAULT_MULTICAST_LOCATOR, locator_value(loc, e));
    }

    list.push(
        PID_PARTICIPANT_LEASE_DURATION,
        duration_value(&proxy.lease_duration, e),
    );

    let mut endpoint_set = Vec::with_capacity(4);
    write_u32(&mut endpoint_set, proxy.available_builtin_endpoints, e);
    list.push(PID_BUILTIN_ENDPOINT_SET, endpoint_set);

    list.push(PID_ENTITY_NAME, string_value(&proxy.participant_name, e));

    if !proxy.properties.is_empty() {
        list.push(
            crate::protocol::constants::PID_PROPERTY_LIST,
            property_list_value(&proxy.properties, e),
        );
    }

    list
}

/// Reconstruct a participant proxy from an announcement.
///
/// # Errors
/// - `IncompatibleProtocol` when the remote major version is lower than
///   ours (the caller drops the participant, no retry).
/// - `Malformed` when the mandatory participant GUID is absent.
pub fn parameters_to_participant(
    list: &ParameterList,
    e: Endianness,
) -> DiscoveryResult<ParticipantProxy> {
    let mut proxy = ParticipantProxy::new(GuidPrefix::zero());
    let mut have_guid = false;

    for param in list.iter() {
        let value = param.value.as_slice();
        match param.pid {
            PID_PROTOCOL_VERSION => {
                if value.len() >= 2 {
                    if value[0] < PROTOCOL_VERSION.0 {
                        return Err(DiscoveryError::IncompatibleProtocol {
                            remote_major: value[0],
                            local_major: PROTOCOL_VERSION.0,
                        });
                    }
                    proxy.protocol_version = (value[0], value[1]);
                }
            }
            PID_VENDOR_ID => {
                if value.len() >= 2 {
                    proxy.vendor_id = [value[0], value[1]];
                }
            }
            PID_EXPECTS_INLINE_QOS => {
                if !value.is_empty() {
                    proxy.expects_inline_qos = value[0] != 0;
                }
            }
            PID_PARTICIPANT_GUID => {
                if let Some(guid) = parse_guid(value) {
                    proxy.guid_prefix = guid.prefix;
                    have_guid = true;
                }
            }
            PID_METATRAFFIC_MULTICAST_LOCATOR => {
                if let Some(loc) = parse_locator(value, e) {
                    proxy.metatraffic_multicast_locators.push(loc);
                }
            }
            PID_METATRAFFIC_UNICAST_LOCATOR => {
                if let Some(loc) = parse_locator(value, e) {
                    proxy.metatraffic_unicast_locators.push(loc);
                }
            }
            PID_DEFAULT_UNICAST_LOCATOR => {
                if let Some(loc) = parse_locator(value, e) {
                    proxy.default_unicast_locators.push(loc);
                }
            }
            PID_DEFAULT_MULTICAST_LOCATOR => {
                if let Some(loc) = parse_locator(value, e) {
                    proxy.default_multicast_locators.push(loc);
                }
            }
            PID_PARTICIPANT_LEASE_DURATION => {
                if let Some(d) = parse_duration(value, e) {
                    proxy.lease_duration = d;
                }
            }
            PID_BUILTIN_ENDPOINT_SET => {
                if value.len() >= 4 {
                    proxy.available_builtin_endpoints = read_u32(value, 0, e);
                }
            }
            PID_ENTITY_NAME => {
                if let Some(name) = parse_string(value, e) {
                    proxy.participant_name = name;
                }
            }
            crate::protocol::constants::PID_PROPERTY_LIST => {
                if let Some(props) = parse_property_list(value, e) {
                    proxy.properties = props;
                }
            }
            other => {
                log::debug!("[spdp] Unknown PID {:#06x} in participant data, skipping", other);
            }
        }
    }

    if !have_guid {
        return Err(DiscoveryError::Malformed(ParseError::InvalidFormat));
    }
    Ok(proxy)
}

/// Property list: count (u32) + `count` pairs of CDR strings.
pub(crate) fn property_list_value(pairs: &[(String, String)], e: Endianness) -> Vec<u8> {
    let mut out = Vec::new();
    write_u32(&mut out, pairs.len() as u32, e);
    for (key, value) in pairs {
        out.extend_from_slice(&string_value(key, e));
        out.extend_from_slice(&string_value(value, e));
    }
    out
}

pub(crate) fn parse_property_list(value: &[u8], e: Endianness) -> Option<Vec<(String, String)>> {
    if value.len() < 4 {
        return None;
    }
    let count = read_u32(value, 0, e) as usize;
    let mut pairs = Vec::with_capacity(count.min(32));
    let mut offset = 4;

    let mut next_string = |offset: &mut usize| -> Option<String> {
        if *offset + 4 > value.len() {
            return None;
        }
        let len = read_u32(value, *offset, e) as usize;
        if len == 0 || *offset + 4 + len > value.len() {
            return None;
        }
        let bytes = &value[*offset + 4..*offset + 4 + len - 1];
        let s = std::str::from_utf8(bytes).ok()?.to_string();
        *offset += 4 + ((len + 3) & !3);
        Some(s)
    };

    for _ in 0..count {
        let key = next_string(&mut offset)?;
        let val = next_string(&mut offset)?;
        pairs.push((key, val));
    }
    Some(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::locator::Locator;
    use crate::protocol::constants::{
        DISC_BUILTIN_ENDPOINT_PARTICIPANT_ANNOUNCER, DISC_BUILTIN_ENDPOINT_PARTICIPANT_DETECTOR,
    };
    use crate::qos::RtpsDuration;
    use std::net::Ipv4Addr;

    fn sample_proxy() -> ParticipantProxy {
        let mut proxy = ParticipantProxy::new(GuidPrefix([3; 12]));
        proxy.participant_name = "node_a".to_string();
        proxy.lease_duration = RtpsDuration::from_millis(12_000);
        proxy.available_builtin_endpoints = DISC_BUILTIN_ENDPOINT_PARTICIPANT_ANNOUNCER
            | DISC_BUILTIN_ENDPOINT_PARTICIPANT_DETECTOR;
        proxy
            .metatraffic_multicast_locators
            .push(Locator::udpv4(Ipv4Addr::new(239, 255, 0, 1), 7400));
        proxy
            .metatraffic_unicast_locators
            .push(Locator::udpv4(Ipv4Addr::new(192, 168, 0, 4), 7410));
        proxy
            .default_unicast_locators
            .push(Locator::udpv4(Ipv4Addr::new(192, 168, 0, 4), 7411));
        proxy
    }

    #[test]
    fn test_participant_round_trip() {
        for e in [Endianness::Little, Endianness::Big] {
            let proxy = sample_proxy();
            let list = participant_to_parameters(&proxy, e);
            let decoded = parameters_to_participant(&list, e).expect("parse succeeds");
            assert_eq!(decoded, proxy);
        }
    }

    #[test]
    fn test_participant_round_trip_with_properties() {
        let mut proxy = sample_proxy();
        proxy
            .properties
            .push(("staticedp_writer_1".to_string(), "0.0.1.2".to_string()));
        proxy
            .properties
            .push(("staticedp_reader_2".to_string(), "0.0.2.7".to_string()));

        let list = participant_to_parameters(&proxy, Endianness::Little);
        let decoded =
            parameters_to_participant(&list, Endianness::Little).expect("parse succeeds");
        assert_eq!(decoded.properties, proxy.properties);
    }

    #[test]
    fn test_lower_major_version_is_rejected() {
        let proxy = sample_proxy();
        let mut list = ParameterList::new();
        list.push(PID_PROTOCOL_VERSION, vec![1, 9, 0, 0]);
        for param in participant_to_parameters(&proxy, Endianness::Little).iter() {
            if param.pid != PID_PROTOCOL_VERSION {
                list.push(param.pid, param.value.clone());
            }
        }
        let result = parameters_to_participant(&list, Endianness::Little);
        assert!(matches!(
            result,
            Err(DiscoveryError::IncompatibleProtocol { remote_major: 1, .. })
        ));
    }

    #[test]
    fn test_missing_guid_is_malformed() {
        let mut list = ParameterList::new();
        list.push(PID_ENTITY_NAME, string_value("anon", Endianness::Little));
        let result = parameters_to_participant(&list, Endianness::Little);
        assert!(matches!(result, Err(DiscoveryError::Malformed(_))));
    }

    #[test]
    fn test_unknown_pid_is_skipped() {
        let proxy = sample_proxy();
        let mut list = participant_to_parameters(&proxy, Endianness::Little);
        list.push(0x7f01, vec![0xde, 0xad, 0xbe, 0xef]);
        let decoded =
            parameters_to_participant(&list, Endianness::Little).expect("parse succeeds");
        assert_eq!(decoded, proxy);
    }
}
