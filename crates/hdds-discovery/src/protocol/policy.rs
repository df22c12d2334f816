// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire layouts of the QoS policies carried in endpoint discovery
//! records (DDS v1.4 Sec.2.2.3, RTPS v2.3 Table 9.12).

use crate::protocol::constants::{
    PID_DEADLINE, PID_DESTINATION_ORDER, PID_DURABILITY, PID_DURABILITY_SERVICE, PID_GROUP_DATA,
    PID_LATENCY_BUDGET, PID_LIFESPAN, PID_LIVELINESS, PID_OWNERSHIP, PID_OWNERSHIP_STRENGTH,
    PID_PARTITION, PID_PRESENTATION, PID_RELIABILITY, PID_TIME_BASED_FILTER, PID_TOPIC_DATA,
    PID_USER_DATA,
};
use crate::protocol::parameter::{
    duration_value, parse_duration, read_u32, write_u32, Endianness, ParameterList,
};
use crate::qos::{
    send_always, DestinationOrder, DestinationOrderKind, Durability, DurabilityKind,
    DurabilityService, HistoryKind, Liveliness, LivelinessKind, Ownership, OwnershipKind,
    PolicySet, Presentation, PresentationAccessScope, Qos, Reliability, ReliabilityKind,
};

fn kind_value(kind: u32, e: Endianness) -> Vec<u8> {
    let mut out = Vec::with_capacity(4);
    write_u32(&mut out, kind, e);
    out
}

fn durability_value(d: &Durability, e: Endianness) -> Vec<u8> {
    let kind = match d.kind {
        DurabilityKind::Volatile => 0,
        DurabilityKind::TransientLocal => 1,
        DurabilityKind::Transient => 2,
        DurabilityKind::Persistent => 3,
    };
    kind_value(kind, e)
}

fn parse_durability(value: &[u8], e: Endianness) -> Option<Durability> {
    if value.len() < 4 {
        return None;
    }
    let kind = match read_u32(value, 0, e) {
        0 => DurabilityKind::Volatile,
        1 => DurabilityKind::TransientLocal,
        2 => DurabilityKind::Transient,
        3 => DurabilityKind::Persistent,
        _ => return None,
    };
    Some(Durability { kind })
}

/// Reliability: kind (u32, BEST_EFFORT=1 / RELIABLE=2) + max blocking time.
fn reliability_value(r: &Reliability, e: Endianness) -> Vec<u8> {
    let kind = match r.kind {
        ReliabilityKind::BestEffort => 1,
        ReliabilityKind::Reliable => 2,
    };
    let mut out = kind_value(kind, e);
    out.extend_from_slice(&duration_value(&r.max_blocking_time, e));
    out
}

fn parse_reliability(value: &[u8], e: Endianness) -> Option<Reliability> {
    if value.len() < 4 {
        return None;
    }
    let kind = match read_u32(value, 0, e) {
        1 => ReliabilityKind::BestEffort,
        2 => ReliabilityKind::Reliable,
        _ => return None,
    };
    let max_blocking_time = if value.len() >= 12 {
        parse_duration(&value[4..12], e)?
    } else {
        Reliability::default().max_blocking_time
    };
    Some(Reliability {
        kind,
        max_blocking_time,
    })
}

fn liveliness_value(l: &Liveliness, e: Endianness) -> Vec<u8> {
    let kind = match l.kind {
        LivelinessKind::Automatic => 0,
        LivelinessKind::ManualByParticipant => 1,
        LivelinessKind::ManualByTopic => 2,
    };
    let mut out = kind_value(kind, e);
    out.extend_from_slice(&duration_value(&l.lease_duration, e));
    out
}

fn parse_liveliness(value: &[u8], e: Endianness) -> Option<Liveliness> {
    if value.len() < 12 {
        return None;
    }
    let kind = match read_u32(value, 0, e) {
        0 => LivelinessKind::Automatic,
        1 => LivelinessKind::ManualByParticipant,
        2 => LivelinessKind::ManualByTopic,
        _ => return None,
    };
    Some(Liveliness {
        kind,
        lease_duration: parse_duration(&value[4..12], e)?,
    })
}

fn ownership_value(o: &Ownership, e: Endianness) -> Vec<u8> {
    let kind = match o.kind {
        OwnershipKind::Shared => 0,
        OwnershipKind::Exclusive => 1,
    };
    kind_value(kind, e)
}

fn parse_ownership(value: &[u8], e: Endianness) -> Option<Ownership> {
    if value.len() < 4 {
        return None;
    }
    let kind = match read_u32(value, 0, e) {
        0 => OwnershipKind::Shared,
        1 => OwnershipKind::Exclusive,
        _ => return None,
    };
    Some(Ownership { kind })
}

fn destination_order_value(d: &DestinationOrder, e: Endianness) -> Vec<u8> {
    let kind = match d.kind {
        DestinationOrderKind::ByReceptionTimestamp => 0,
        DestinationOrderKind::BySourceTimestamp => 1,
    };
    kind_value(kind, e)
}

fn parse_destination_order(value: &[u8], e: Endianness) -> Option<DestinationOrder> {
    if value.len() < 4 {
        return None;
    }
    let kind = match read_u32(value, 0, e) {
        0 => DestinationOrderKind::ByReceptionTimestamp,
        1 => DestinationOrderKind::BySourceTimestamp,
        _ => return None,
    };
    Some(DestinationOrder { kind })
}

/// Presentation: access scope (u32) + coherent (u8) + ordered (u8) + pad.
fn presentation_value(p: &Presentation, e: Endianness) -> Vec<u8> {
    let scope = match p.access_scope {
        PresentationAccessScope::Instance => 0,
        PresentationAccessScope::Topic => 1,
        PresentationAccessScope::Group => 2,
    };
    let mut out = kind_value(scope, e);
    out.push(u8::from(p.coherent_access));
    out.push(u8::from(p.ordered_access));
    out.extend_from_slice(&[0, 0]);
    out
}

fn parse_presentation(value: &[u8], e: Endianness) -> Option<Presentation> {
    if value.len() < 8 {
        return None;
    }
    let access_scope = match read_u32(value, 0, e) {
        0 => PresentationAccessScope::Instance,
        1 => PresentationAccessScope::Topic,
        2 => PresentationAccessScope::Group,
        _ => return None,
    };
    Some(Presentation {
        access_scope,
        coherent_access: value[4] != 0,
        ordered_access: value[5] != 0,
    })
}

/// Partition: string sequence (count + length-prefixed padded strings).
fn partition_value(names: &[String], e: Endianness) -> Vec<u8> {
    let mut out = Vec::new();
    write_u32(&mut out, names.len() as u32, e);
    for name in names {
        out.extend_from_slice(&crate::protocol::parameter::string_value(name, e));
    }
    out
}

fn parse_partition(value: &[u8], e: Endianness) -> Option<Vec<String>> {
    if value.len() < 4 {
        return None;
    }
    let count = read_u32(value, 0, e) as usize;
    let mut names = Vec::with_capacity(count.min(16));
    let mut offset = 4;
    for _ in 0..count {
        if offset + 4 > value.len() {
            return None;
        }
        let len = read_u32(value, offset, e) as usize;
        if len == 0 || offset + 4 + len > value.len() {
            return None;
        }
        let bytes = &value[offset + 4..offset + 4 + len - 1];
        names.push(std::str::from_utf8(bytes).ok()?.to_string());
        offset += 4 + ((len + 3) & !3);
    }
    Some(names)
}

/// Octet sequence (user/topic/group data): length + bytes, padded.
fn octets_value(data: &[u8], e: Endianness) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + data.len());
    write_u32(&mut out, data.len() as u32, e);
    out.extend_from_slice(data);
    while out.len() % 4 != 0 {
        out.push(0);
    }
    out
}

fn parse_octets(value: &[u8], e: Endianness) -> Option<Vec<u8>> {
    if value.len() < 4 {
        return None;
    }
    let len = read_u32(value, 0, e) as usize;
    if 4 + len > value.len() {
        return None;
    }
    Some(value[4..4 + len].to_vec())
}

/// Durability service: cleanup delay (8) + history kind (4) + depth (4) +
/// max samples (4) + max instances (4) + max samples per instance (4).
fn durability_service_value(d: &DurabilityService, e: Endianness) -> Vec<u8> {
    let mut out = duration_value(&d.service_cleanup_delay, e);
    let kind = match d.history_kind {
        HistoryKind::KeepLast => 0,
        HistoryKind::KeepAll => 1,
    };
    write_u32(&mut out, kind, e);
    crate::protocol::parameter::write_i32(&mut out, d.history_depth, e);
    crate::protocol::parameter::write_i32(&mut out, d.max_samples, e);
    crate::protocol::parameter::write_i32(&mut out, d.max_instances, e);
    crate::protocol::parameter::write_i32(&mut out, d.max_samples_per_instance, e);
    out
}

fn parse_durability_service(value: &[u8], e: Endianness) -> Option<DurabilityService> {
    use crate::protocol::parameter::read_i32;
    if value.len() < 28 {
        return None;
    }
    let history_kind = match read_u32(value, 8, e) {
        0 => HistoryKind::KeepLast,
        1 => HistoryKind::KeepAll,
        _ => return None,
    };
    Some(DurabilityService {
        service_cleanup_delay: parse_duration(&value[0..8], e)?,
        history_kind,
        history_depth: read_i32(value, 12, e),
        max_samples: read_i32(value, 16, e),
        max_instances: read_i32(value, 20, e),
        max_samples_per_instance: read_i32(value, 24, e),
    })
}

/// Append every QoS policy that is send-always or marked dirty, in the
/// canonical emission order.
pub(crate) fn push_qos_policies(
    list: &mut ParameterList,
    qos: &Qos,
    changed: PolicySet,
    include_strength: bool,
    e: Endianness,
) {
    let wanted = |pid: u16| send_always(pid) || changed.contains(pid);

    if wanted(PID_DURABILITY) {
        list.push(PID_DURABILITY, durability_value(&qos.durability, e));
    }
    if wanted(PID_DURABILITY_SERVICE) {
        list.push(
            PID_DURABILITY_SERVICE,
            durability_service_value(&qos.durability_service, e),
        );
    }
    if wanted(PID_DEADLINE) {
        list.push(PID_DEADLINE, duration_value(&qos.deadline.period, e));
    }
    if wanted(PID_LATENCY_BUDGET) {
        list.push(
            PID_LATENCY_BUDGET,
            duration_value(&qos.latency_budget.duration, e),
        );
    }
    if wanted(PID_LIVELINESS) {
        list.push(PID_LIVELINESS, liveliness_value(&qos.liveliness, e));
    }
    if wanted(PID_RELIABILITY) {
        list.push(PID_RELIABILITY, reliability_value(&qos.reliability, e));
    }
    if wanted(PID_LIFESPAN) {
        list.push(PID_LIFESPAN, duration_value(&qos.lifespan.duration, e));
    }
    if wanted(PID_USER_DATA) {
        list.push(PID_USER_DATA, octets_value(&qos.user_data.value, e));
    }
    if wanted(PID_TIME_BASED_FILTER) {
        list.push(
            PID_TIME_BASED_FILTER,
            duration_value(&qos.time_based_filter.minimum_separation, e),
        );
    }
    if wanted(PID_OWNERSHIP) {
        list.push(PID_OWNERSHIP, ownership_value(&qos.ownership, e));
    }
    if include_strength && wanted(PID_OWNERSHIP_STRENGTH) {
        let mut value = Vec::with_capacity(4);
        write_u32(&mut value, qos.ownership_strength.value, e);
        list.push(PID_OWNERSHIP_STRENGTH, value);
    }
    if wanted(PID_DESTINATION_ORDER) {
        list.push(
            PID_DESTINATION_ORDER,
            destination_order_value(&qos.destination_order, e),
        );
    }
    if wanted(PID_PRESENTATION) {
        list.push(PID_PRESENTATION, presentation_value(&qos.presentation, e));
    }
    if wanted(PID_PARTITION) {
        list.push(PID_PARTITION, partition_value(&qos.partition.names, e));
    }
    if wanted(PID_TOPIC_DATA) {
        list.push(PID_TOPIC_DATA, octets_value(&qos.topic_data.value, e));
    }
    if wanted(PID_GROUP_DATA) {
        list.push(PID_GROUP_DATA, octets_value(&qos.group_data.value, e));
    }
}

/// Apply one QoS parameter onto the profile under construction.
///
/// Returns true when the pid named a QoS policy (even if its value failed
/// to decode and was skipped with a warning).
pub(crate) fn apply_qos_parameter(qos: &mut Qos, pid: u16, value: &[u8], e: Endianness) -> bool {
    let mut applied = true;
    match pid {
        PID_DURABILITY => {
            if let Some(v) = parse_durability(value, e) {
                qos.durability = v;
            }
        }
        PID_DURABILITY_SERVICE => {
            if let Some(v) = parse_durability_service(value, e) {
                qos.durability_service = v;
            }
        }
        PID_DEADLINE => {
            if let Some(v) = parse_duration(value, e) {
                qos.deadline.period = v;
            }
        }
        PID_LATENCY_BUDGET => {
            if let Some(v) = parse_duration(value, e) {
                qos.latency_budget.duration = v;
            }
        }
        PID_LIVELINESS => {
            if let Some(v) = parse_liveliness(value, e) {
                qos.liveliness = v;
            }
        }
        PID_RELIABILITY => {
            if let Some(v) = parse_reliability(value, e) {
                qos.reliability = v;
            }
        }
        PID_LIFESPAN => {
            if let Some(v) = parse_duration(value, e) {
                qos.lifespan.duration = v;
            }
        }
        PID_USER_DATA => {
            if let Some(v) = parse_octets(value, e) {
                qos.user_data.value = v;
            }
        }
        PID_TIME_BASED_FILTER => {
            if let Some(v) = parse_duration(value, e) {
                qos.time_based_filter.minimum_separation = v;
            }
        }
        PID_OWNERSHIP => {
            if let Some(v) = parse_ownership(value, e) {
                qos.ownership = v;
            }
        }
        PID_OWNERSHIP_STRENGTH => {
            if value.len() >= 4 {
                qos.ownership_strength.value = read_u32(value, 0, e);
            }
        }
        PID_DESTINATION_ORDER => {
            if let Some(v) = parse_destination_order(value, e) {
                qos.destination_order = v;
            }
        }
        PID_PRESENTATION => {
            if let Some(v) = parse_presentation(value, e) {
                qos.presentation = v;
            }
        }
        PID_PARTITION => {
            if let Some(v) = parse_partition(value, e) {
                qos.partition.names = v;
            }
        }
        PID_TOPIC_DATA => {
            if let Some(v) = parse_octets(value, e) {
                qos.topic_data.value = v;
            }
        }
        PID_GROUP_DATA => {
            if let Some(v) = parse_octets(value, e) {
                qos.group_data.value = v;
            }
        }
        _ => applied = false,
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qos::RtpsDuration;

    fn round_trip(qos: &Qos, include_strength: bool) -> Qos {
        let mut list = ParameterList::new();
        push_qos_policies(
            &mut list,
            qos,
            PolicySet::ALL,
            include_strength,
            Endianness::Little,
        );
        let mut decoded = Qos::default();
        for param in list.iter() {
            assert!(apply_qos_parameter(
                &mut decoded,
                param.pid,
                &param.value,
                Endianness::Little
            ));
        }
        decoded
    }

    #[test]
    fn test_full_qos_round_trip() {
        let mut qos = Qos::reliable().transient_local();
        qos.deadline.period = RtpsDuration::from_millis(500);
        qos.liveliness.kind = LivelinessKind::ManualByTopic;
        qos.liveliness.lease_duration = RtpsDuration::from_millis(2_000);
        qos.ownership.kind = OwnershipKind::Exclusive;
        qos.ownership_strength.value = 42;
        qos.destination_order.kind = DestinationOrderKind::BySourceTimestamp;
        qos.presentation.access_scope = PresentationAccessScope::Topic;
        qos.presentation.coherent_access = true;
        qos.partition.names = vec!["room1".to_string(), "room2".to_string()];
        qos.user_data.value = vec![1, 2, 3];
        qos.topic_data.value = vec![4, 5];
        qos.group_data.value = vec![6];
        qos.time_based_filter.minimum_separation = RtpsDuration::from_millis(10);
        qos.durability_service.history_depth = 7;

        assert_eq!(round_trip(&qos, true), qos);
    }

    #[test]
    fn test_reader_encoding_skips_ownership_strength() {
        let mut qos = Qos::default();
        qos.ownership_strength.value = 9;
        let mut list = ParameterList::new();
        push_qos_policies(&mut list, &qos, PolicySet::ALL, false, Endianness::Little);
        assert!(list.find(PID_OWNERSHIP_STRENGTH).is_none());
        assert!(list.find(PID_OWNERSHIP).is_some());
    }

    #[test]
    fn test_empty_dirty_mask_emits_send_always_only() {
        let qos = Qos::reliable();
        let mut list = ParameterList::new();
        push_qos_policies(&mut list, &qos, PolicySet::EMPTY, true, Endianness::Little);
        let pids: Vec<u16> = list.iter().map(|p| p.pid).collect();
        assert_eq!(
            pids,
            vec![PID_DURABILITY, PID_LIVELINESS, PID_RELIABILITY, PID_OWNERSHIP]
        );
    }

    #[test]
    fn test_apply_rejects_non_qos_pid() {
        let mut qos = Qos::default();
        assert!(!apply_qos_parameter(
            &mut qos,
            crate::protocol::constants::PID_TOPIC_NAME,
            &[0; 8],
            Endianness::Little
        ));
    }

    #[test]
    fn test_big_endian_round_trip() {
        let mut qos = Qos::reliable();
        qos.partition.names = vec!["be".to_string()];
        let mut list = ParameterList::new();
        push_qos_policies(&mut list, &qos, PolicySet::ALL, true, Endianness::Big);
        let mut decoded = Qos::default();
        for param in list.iter() {
            apply_qos_parameter(&mut decoded, param.pid, &param.value, Endianness::Big);
        }
        assert_eq!(decoded, qos);
    }
}
