// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Endpoint QoS as exchanged during discovery.
//!
//! [`Qos`] aggregates the per-endpoint policies that travel inside
//! WriterData/ReaderData records. [`PolicySet`] is the dirty mask that
//! decides which non-mandatory policies are included in the next
//! announcement; it replaces a per-policy boolean on every record.

mod policy;

pub use policy::{
    Deadline, DestinationOrder, DestinationOrderKind, Durability, DurabilityKind,
    DurabilityService, GroupData, HistoryKind, LatencyBudget, Lifespan, Liveliness,
    LivelinessKind, Ownership, OwnershipKind, OwnershipStrength, Partition, Presentation,
    PresentationAccessScope, Reliability, ReliabilityKind, RtpsDuration, TimeBasedFilter,
    TopicData, UserData,
};

use crate::protocol::constants::{
    PID_DEADLINE, PID_DESTINATION_ORDER, PID_DURABILITY, PID_DURABILITY_SERVICE, PID_GROUP_DATA,
    PID_LATENCY_BUDGET, PID_LIFESPAN, PID_LIVELINESS, PID_OWNERSHIP, PID_OWNERSHIP_STRENGTH,
    PID_PARTITION, PID_PRESENTATION, PID_RELIABILITY, PID_TIME_BASED_FILTER, PID_TOPIC_DATA,
    PID_USER_DATA,
};

/// Aggregated endpoint QoS profile carried in discovery records.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Qos {
    pub durability: Durability,
    pub durability_service: DurabilityService,
    pub deadline: Deadline,
    pub latency_budget: LatencyBudget,
    pub liveliness: Liveliness,
    pub reliability: Reliability,
    pub lifespan: Lifespan,
    pub user_data: UserData,
    pub time_based_filter: TimeBasedFilter,
    pub ownership: Ownership,
    pub ownership_strength: OwnershipStrength,
    pub destination_order: DestinationOrder,
    pub presentation: Presentation,
    pub partition: Partition,
    pub topic_data: TopicData,
    pub group_data: GroupData,
}

impl Qos {
    /// BestEffort baseline profile.
    pub fn best_effort() -> Self {
        Self::default()
    }

    /// Reliable profile (NACK-driven retransmission on the data path).
    pub fn reliable() -> Self {
        Self {
            reliability: Reliability {
                kind: ReliabilityKind::Reliable,
                ..Reliability::default()
            },
            ..Self::default()
        }
    }

    pub fn transient_local(mut self) -> Self {
        self.durability.kind = DurabilityKind::TransientLocal;
        self
    }
}

/// Offered/requested reliability compatibility: a reliable writer can
/// serve both kinds of reader, a best-effort writer only best-effort
/// readers.
pub fn reliability_compatible(offered: ReliabilityKind, requested: ReliabilityKind) -> bool {
    match requested {
        ReliabilityKind::BestEffort => true,
        ReliabilityKind::Reliable => offered == ReliabilityKind::Reliable,
    }
}

/// Set of QoS policies, identified by PID, that changed since the last
/// successful announcement of an endpoint.
///
/// Encoded as a bitmask; one bit per discovery-visible policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolicySet(u32);

impl PolicySet {
    pub const EMPTY: Self = Self(0);

    /// Every policy bit set; used to force a full re-announcement.
    pub const ALL: Self = Self(0xffff_ffff);

    fn bit(pid: u16) -> Option<u32> {
        let shift = match pid {
            PID_DURABILITY => 0,
            PID_DURABILITY_SERVICE => 1,
            PID_DEADLINE => 2,
            PID_LATENCY_BUDGET => 3,
            PID_LIVELINESS => 4,
            PID_RELIABILITY => 5,
            PID_LIFESPAN => 6,
            PID_USER_DATA => 7,
            PID_TIME_BASED_FILTER => 8,
            PID_OWNERSHIP => 9,
            PID_OWNERSHIP_STRENGTH => 10,
            PID_DESTINATION_ORDER => 11,
            PID_PRESENTATION => 12,
            PID_PARTITION => 13,
            PID_TOPIC_DATA => 14,
            PID_GROUP_DATA => 15,
            _ => return None,
        };
        Some(1 << shift)
    }

    pub fn insert(&mut self, pid: u16) {
        if let Some(bit) = Self::bit(pid) {
            self.0 |= bit;
        }
    }

    pub fn contains(&self, pid: u16) -> bool {
        Self::bit(pid).is_some_and(|bit| self.0 & bit != 0)
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Dirty mask between a previously announced profile and the current
    /// one: a bit per policy whose value differs.
    pub fn diff(old: &Qos, new: &Qos) -> Self {
        let mut set = Self::EMPTY;
        if old.durability != new.durability {
            set.insert(PID_DURABILITY);
        }
        if old.durability_service != new.durability_service {
            set.insert(PID_DURABILITY_SERVICE);
        }
        if old.deadline != new.deadline {
            set.insert(PID_DEADLINE);
        }
        if old.latency_budget != new.latency_budget {
            set.insert(PID_LATENCY_BUDGET);
        }
        if old.liveliness != new.liveliness {
            set.insert(PID_LIVELINESS);
        }
        if old.reliability != new.reliability {
            set.insert(PID_RELIABILITY);
        }
        if old.lifespan != new.lifespan {
            set.insert(PID_LIFESPAN);
        }
        if old.user_data != new.user_data {
            set.insert(PID_USER_DATA);
        }
        if old.time_based_filter != new.time_based_filter {
            set.insert(PID_TIME_BASED_FILTER);
        }
        if old.ownership != new.ownership {
            set.insert(PID_OWNERSHIP);
        }
        if old.ownership_strength != new.ownership_strength {
            set.insert(PID_OWNERSHIP_STRENGTH);
        }
        if old.destination_order != new.destination_order {
            set.insert(PID_DESTINATION_ORDER);
        }
        if old.presentation != new.presentation {
            set.insert(PID_PRESENTATION);
        }
        if old.partition != new.partition {
            set.insert(PID_PARTITION);
        }
        if old.topic_data != new.topic_data {
            set.insert(PID_TOPIC_DATA);
        }
        if old.group_data != new.group_data {
            set.insert(PID_GROUP_DATA);
        }
        set
    }
}

/// Policies included in every announcement regardless of the dirty mask.
///
/// These are the match-relevant ones; receivers must never have to guess
/// them from defaults.
pub fn send_always(pid: u16) -> bool {
    matches!(
        pid,
        PID_RELIABILITY | PID_DURABILITY | PID_LIVELINESS | PID_OWNERSHIP
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reliability_compat_matrix() {
        use ReliabilityKind::{BestEffort, Reliable};
        assert!(reliability_compatible(Reliable, Reliable));
        assert!(reliability_compatible(Reliable, BestEffort));
        assert!(reliability_compatible(BestEffort, BestEffort));
        assert!(!reliability_compatible(BestEffort, Reliable));
    }

    #[test]
    fn test_policy_set_insert_contains() {
        let mut set = PolicySet::EMPTY;
        assert!(set.is_empty());
        set.insert(PID_RELIABILITY);
        set.insert(PID_PARTITION);
        assert!(set.contains(PID_RELIABILITY));
        assert!(set.contains(PID_PARTITION));
        assert!(!set.contains(PID_DEADLINE));
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn test_policy_set_ignores_unknown_pid() {
        let mut set = PolicySet::EMPTY;
        set.insert(0x1234);
        assert!(set.is_empty());
        assert!(!set.contains(0x1234));
    }

    #[test]
    fn test_policy_set_diff() {
        let old = Qos::best_effort();
        let mut new = Qos::reliable();
        new.partition.names.push("room1".to_string());

        let diff = PolicySet::diff(&old, &new);
        assert!(diff.contains(PID_RELIABILITY));
        assert!(diff.contains(PID_PARTITION));
        assert!(!diff.contains(PID_DURABILITY));
        assert_eq!(PolicySet::diff(&old, &old), PolicySet::EMPTY);
    }

    #[test]
    fn test_send_always_covers_match_relevant_policies() {
        assert!(send_always(PID_RELIABILITY));
        assert!(send_always(PID_DURABILITY));
        assert!(send_always(PID_LIVELINESS));
        assert!(send_always(PID_OWNERSHIP));
        assert!(!send_always(PID_PARTITION));
        assert!(!send_always(PID_USER_DATA));
    }
}
