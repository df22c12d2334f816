// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Individual DDS QoS policy types as carried in discovery records.
//!
//! Only the fields that travel on the wire are modeled; enforcement of
//! the policies is the business of the writer/reader subsystems.

use std::time::Duration;

/// RTPS duration: seconds + nanoseconds, 8 bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpsDuration {
    pub seconds: i32,
    pub nanos: u32,
}

impl RtpsDuration {
    pub const ZERO: Self = Self {
        seconds: 0,
        nanos: 0,
    };

    /// Infinite duration sentinel (RTPS v2.3 Sec.9.3.2).
    pub const INFINITE: Self = Self {
        seconds: 0x7fff_ffff,
        nanos: 0xffff_ffff,
    };

    pub fn is_infinite(&self) -> bool {
        self.seconds == Self::INFINITE.seconds
    }

    pub fn from_std(d: Duration) -> Self {
        let seconds = i32::try_from(d.as_secs()).unwrap_or(Self::INFINITE.seconds);
        Self {
            seconds,
            nanos: d.subsec_nanos(),
        }
    }

    /// Convert to a std duration; infinite maps to `Duration::MAX`.
    pub fn to_std(&self) -> Duration {
        if self.is_infinite() {
            Duration::MAX
        } else {
            Duration::new(self.seconds.max(0) as u64, self.nanos.min(999_999_999))
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::from_std(Duration::from_millis(ms))
    }
}

impl Default for RtpsDuration {
    fn default() -> Self {
        Self::ZERO
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurabilityKind {
    Volatile,
    TransientLocal,
    Transient,
    Persistent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Durability {
    pub kind: DurabilityKind,
}

impl Default for Durability {
    fn default() -> Self {
        Self {
            kind: DurabilityKind::Volatile,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReliabilityKind {
    #[default]
    BestEffort,
    Reliable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reliability {
    pub kind: ReliabilityKind,
    pub max_blocking_time: RtpsDuration,
}

impl Default for Reliability {
    fn default() -> Self {
        Self {
            kind: ReliabilityKind::BestEffort,
            max_blocking_time: RtpsDuration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub period: RtpsDuration,
}

impl Default for Deadline {
    fn default() -> Self {
        Self {
            period: RtpsDuration::INFINITE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LatencyBudget {
    pub duration: RtpsDuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivelinessKind {
    Automatic,
    ManualByParticipant,
    ManualByTopic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveliness {
    pub kind: LivelinessKind,
    pub lease_duration: RtpsDuration,
}

impl Default for Liveliness {
    fn default() -> Self {
        Self {
            kind: LivelinessKind::Automatic,
            lease_duration: RtpsDuration::INFINITE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifespan {
    pub duration: RtpsDuration,
}

impl Default for Lifespan {
    fn default() -> Self {
        Self {
            duration: RtpsDuration::INFINITE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipKind {
    Shared,
    Exclusive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    pub kind: OwnershipKind,
}

impl Default for Ownership {
    fn default() -> Self {
        Self {
            kind: OwnershipKind::Shared,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OwnershipStrength {
    pub value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationOrderKind {
    ByReceptionTimestamp,
    BySourceTimestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestinationOrder {
    pub kind: DestinationOrderKind,
}

impl Default for DestinationOrder {
    fn default() -> Self {
        Self {
            kind: DestinationOrderKind::ByReceptionTimestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationAccessScope {
    Instance,
    Topic,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presentation {
    pub access_scope: PresentationAccessScope,
    pub coherent_access: bool,
    pub ordered_access: bool,
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            access_scope: PresentationAccessScope::Instance,
            coherent_access: false,
            ordered_access: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Partition {
    pub names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserData {
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TopicData {
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupData {
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeBasedFilter {
    pub minimum_separation: RtpsDuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    KeepLast,
    KeepAll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DurabilityService {
    pub service_cleanup_delay: RtpsDuration,
    pub history_kind: HistoryKind,
    pub history_depth: i32,
    pub max_samples: i32,
    pub max_instances: i32,
    pub max_samples_per_instance: i32,
}

impl Default for DurabilityService {
    fn default() -> Self {
        Self {
            service_cleanup_delay: RtpsDuration::ZERO,
            history_kind: HistoryKind::KeepLast,
            history_depth: 1,
            max_samples: -1,
            max_instances: -1,
            max_samples_per_instance: -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_std_round_trip() {
        let d = RtpsDuration::from_std(Duration::new(3, 500_000_000));
        assert_eq!(d.seconds, 3);
        assert_eq!(d.nanos, 500_000_000);
        assert_eq!(d.to_std(), Duration::new(3, 500_000_000));
    }

    #[test]
    fn test_duration_infinite() {
        assert!(RtpsDuration::INFINITE.is_infinite());
        assert_eq!(RtpsDuration::INFINITE.to_std(), Duration::MAX);
        assert!(RtpsDuration::from_std(Duration::MAX).is_infinite());
    }

    #[test]
    fn test_policy_defaults() {
        assert_eq!(Durability::default().kind, DurabilityKind::Volatile);
        assert_eq!(Reliability::default().kind, ReliabilityKind::BestEffort);
        assert!(Deadline::default().period.is_infinite());
        assert_eq!(Ownership::default().kind, OwnershipKind::Shared);
        assert!(Partition::default().names.is_empty());
    }
}
