//! Delivery intervals produced by the device-history store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::SyncId;

/// The kind of delivery (or status transition) an interval records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryKind {
    /// Basal delivery at the programmed schedule rate.
    ScheduledBasal,
    /// Temporary basal override superseding the schedule.
    TempBasal,
    /// Delivery suspended (effective rate zero).
    Suspend,
    /// A discrete bolus dose.
    Bolus,
    /// Instantaneous resumption of delivery after a suspend.
    Resume,
}

impl DeliveryKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ScheduledBasal => "scheduled_basal",
            Self::TempBasal => "temp_basal",
            Self::Suspend => "suspend",
            Self::Bolus => "bolus",
            Self::Resume => "resume",
        }
    }

    /// Whether the segmenter splits this kind against the basal rate schedule.
    ///
    /// Boluses are instantaneous amounts and resumes are point events;
    /// neither spans a rate.
    #[must_use]
    pub const fn is_rate_sensitive(self) -> bool {
        matches!(self, Self::ScheduledBasal | Self::TempBasal | Self::Suspend)
    }

    /// Whether the automation overlay applies to this kind.
    ///
    /// Only the basal/suspend family distinguishes closed-loop from manual
    /// operation.
    #[must_use]
    pub const fn carries_automation(self) -> bool {
        matches!(self, Self::ScheduledBasal | Self::TempBasal | Self::Suspend)
    }
}

impl std::fmt::Display for DeliveryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutability state of an interval.
///
/// Provisional data may still change upstream (the end time of an
/// in-progress basal moves with every history fetch); finalized data
/// will not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mutability {
    Provisional,
    #[default]
    Finalized,
}

impl Mutability {
    #[must_use]
    pub const fn is_provisional(self) -> bool {
        matches!(self, Self::Provisional)
    }
}

/// Provenance of a record that lacks an application-assigned sync identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    /// The originating application or integration identity.
    pub provenance: String,
    /// An identifier unique within that provenance scope.
    pub local_id: String,
}

/// A half-open `[start, end)` span of medication delivery.
///
/// Created by the upstream device-history store and consumed read-only by
/// this crate; the segmenter and overlay return new intervals rather than
/// mutating in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryInterval {
    /// What was delivered (or which status transition occurred).
    pub kind: DeliveryKind,

    /// Start of the span, inclusive.
    pub start: DateTime<Utc>,

    /// End of the span, exclusive. Equal to `start` for point events.
    pub end: DateTime<Utc>,

    /// Nominal rate in units/hour for basal kinds, amount in units for
    /// boluses.
    pub value: f64,

    /// Delivered amount in units, unset until the pump reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered: Option<f64>,

    /// The configured basal rate applicable to this span, annotated by the
    /// segmenter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_rate: Option<f64>,

    /// Whether delivery was under closed-loop control. `None` until the
    /// overlay resolves it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automated: Option<bool>,

    /// Whether the interval may still change upstream.
    #[serde(default)]
    pub mutability: Mutability,

    /// Application-assigned logical identifier, if one exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_id: Option<SyncId>,

    /// Provenance-scoped fallback identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,

    /// Set when a provisional interval was annotated without splitting;
    /// its end time is not yet trustworthy.
    #[serde(default)]
    pub indeterminate_duration: bool,

    /// Opaque upstream context, carried through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl DeliveryInterval {
    /// Creates an interval with the given span and nominal value; all
    /// optional annotations start unset.
    #[must_use]
    pub fn new(kind: DeliveryKind, start: DateTime<Utc>, end: DateTime<Utc>, value: f64) -> Self {
        Self {
            kind,
            start,
            end,
            value,
            delivered: None,
            scheduled_rate: None,
            automated: None,
            mutability: Mutability::Finalized,
            sync_id: None,
            origin: None,
            indeterminate_duration: false,
            payload: None,
        }
    }

    /// Span length in milliseconds. Zero for point events.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.end - self.start).num_milliseconds().max(0)
    }

    /// Returns a copy narrowed to `[start, end)`, with any delivered amount
    /// scaled to the sub-span's share of the original duration.
    ///
    /// The nominal value and rate annotation are per-unit-time quantities
    /// and carry over unchanged.
    #[must_use]
    pub(crate) fn clipped(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let mut clip = self.clone();
        clip.start = start;
        clip.end = end;
        if let Some(delivered) = self.delivered {
            let total_ms = self.duration_ms();
            if total_ms > 0 {
                #[allow(clippy::cast_precision_loss)]
                let fraction = (end - start).num_milliseconds().max(0) as f64 / total_ms as f64;
                clip.delivered = Some(delivered * fraction);
            }
        }
        clip
    }

    /// Appends a position-derived `ordinal/total` marker to the logical
    /// identifier of a split segment. The first segment keeps the base
    /// identifier unchanged.
    ///
    /// Both the sync identifier and the provenance-local identifier are
    /// suffixed so that split segments never share a resolution key.
    #[must_use]
    pub(crate) fn with_ordinal(mut self, ordinal: usize, total: usize) -> Self {
        if ordinal <= 1 {
            return self;
        }
        if let Some(sync_id) = self.sync_id.take() {
            // Suffixing a non-empty ID cannot produce an empty one.
            self.sync_id = SyncId::new(format!("{sync_id} {ordinal}/{total}")).ok();
        }
        if let Some(origin) = self.origin.as_mut() {
            origin.local_id = format!("{} {ordinal}/{total}", origin.local_id);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 6, 0, 0)
            .single()
            .expect("valid test timestamp")
            + chrono::Duration::minutes(minutes)
    }

    #[test]
    fn duration_is_clamped_to_zero() {
        let interval = DeliveryInterval::new(DeliveryKind::Resume, ts(5), ts(5), 0.0);
        assert_eq!(interval.duration_ms(), 0);

        // Malformed span (end before start) never reports negative duration.
        let malformed = DeliveryInterval::new(DeliveryKind::Resume, ts(5), ts(0), 0.0);
        assert_eq!(malformed.duration_ms(), 0);
    }

    #[test]
    fn clipped_apportions_delivered_amount() {
        let mut interval = DeliveryInterval::new(DeliveryKind::ScheduledBasal, ts(0), ts(30), 1.0);
        interval.delivered = Some(0.6);

        let clip = interval.clipped(ts(0), ts(10));
        assert_eq!(clip.start, ts(0));
        assert_eq!(clip.end, ts(10));
        let delivered = clip.delivered.expect("delivered should carry over");
        assert!((delivered - 0.2).abs() < 1e-9);
    }

    #[test]
    fn clipped_preserves_rate_value() {
        let interval = DeliveryInterval::new(DeliveryKind::TempBasal, ts(0), ts(60), 2.5);
        let clip = interval.clipped(ts(15), ts(45));
        assert!((clip.value - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn ordinal_suffix_skips_first_segment() {
        let mut interval = DeliveryInterval::new(DeliveryKind::ScheduledBasal, ts(0), ts(10), 1.0);
        interval.sync_id = Some(SyncId::new("dose-9").unwrap());

        let first = interval.clone().with_ordinal(1, 3);
        assert_eq!(first.sync_id.unwrap().as_str(), "dose-9");

        let second = interval.with_ordinal(2, 3);
        assert_eq!(second.sync_id.unwrap().as_str(), "dose-9 2/3");
    }

    #[test]
    fn ordinal_suffix_applies_to_origin_local_id() {
        let mut interval = DeliveryInterval::new(DeliveryKind::Suspend, ts(0), ts(10), 0.0);
        interval.origin = Some(Origin {
            provenance: "org.example.pump".to_string(),
            local_id: "event-44".to_string(),
        });

        let third = interval.with_ordinal(3, 3);
        assert_eq!(third.origin.unwrap().local_id, "event-44 3/3");
    }

    #[test]
    fn kind_families() {
        assert!(DeliveryKind::ScheduledBasal.is_rate_sensitive());
        assert!(DeliveryKind::TempBasal.is_rate_sensitive());
        assert!(DeliveryKind::Suspend.is_rate_sensitive());
        assert!(!DeliveryKind::Bolus.is_rate_sensitive());
        assert!(!DeliveryKind::Resume.is_rate_sensitive());

        assert!(DeliveryKind::Suspend.carries_automation());
        assert!(!DeliveryKind::Bolus.carries_automation());
    }

    #[test]
    fn interval_serde_roundtrip() {
        let mut interval = DeliveryInterval::new(DeliveryKind::ScheduledBasal, ts(0), ts(30), 1.2);
        interval.sync_id = Some(SyncId::new("dose-1").unwrap());
        interval.mutability = Mutability::Provisional;

        let json = serde_json::to_string(&interval).unwrap();
        let parsed: DeliveryInterval = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, interval);
    }
}
