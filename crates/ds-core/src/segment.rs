//! Temporal segmentation of doses against the basal rate schedule.
//!
//! Splits a single delivery interval so each output segment carries
//! exactly one applicable scheduled rate. Output segments partition the
//! input span exactly: contiguous, non-overlapping, same union.

use crate::interval::DeliveryInterval;
use crate::schedule::{RateSegment, overlapping};

/// Splits one delivery interval against a rate schedule.
///
/// Returns the input unchanged (single-element vec) when the kind is not
/// rate-sensitive or the history is empty. Provisional intervals are
/// annotated with the first overlapping rate but never split, since their
/// end time may still move; they come back with
/// `indeterminate_duration = true`.
///
/// For a finalized interval crossing schedule boundaries, the split uses a
/// moving cursor clamped to the interval and to the previous segment's
/// end, so adjacent-but-misaligned schedule entries still yield a gapless,
/// non-overlapping partition. The final segment always ends at the
/// interval's end. A carried delivered amount is apportioned by duration
/// fraction; rounding is left to downstream consumers.
pub fn segment_interval(
    interval: &DeliveryInterval,
    rate_history: &[RateSegment],
) -> Vec<DeliveryInterval> {
    if !interval.kind.is_rate_sensitive() || rate_history.is_empty() {
        return vec![interval.clone()];
    }

    let overlaps: Vec<&RateSegment> =
        overlapping(rate_history, interval.start, interval.end).collect();
    let Some(first) = overlaps.first() else {
        return vec![interval.clone()];
    };

    // A zero-length span cannot be partitioned; annotate and return.
    if interval.duration_ms() == 0 {
        let mut single = interval.clone();
        single.scheduled_rate = Some(first.value);
        return vec![single];
    }

    if interval.mutability.is_provisional() {
        // Splitting now would invalidate identifiers already derived from
        // this dose and would have to be undone on the next revision.
        let mut single = interval.clone();
        single.scheduled_rate = Some(first.value);
        single.indeterminate_duration = true;
        return vec![single];
    }

    let total = overlaps.len();
    if total > 1 {
        tracing::trace!(segments = total, "dose crosses schedule boundaries");
    }

    let mut segments = Vec::with_capacity(total);
    let mut cursor = interval.start;
    for (index, entry) in overlaps.iter().enumerate() {
        let is_last = index + 1 == total;
        let segment_end = if is_last {
            interval.end
        } else {
            entry.end.min(interval.end)
        };
        if segment_end <= cursor {
            continue;
        }

        let mut segment = interval.clipped(cursor, segment_end);
        segment.scheduled_rate = Some(entry.value);
        segments.push(segment.with_ordinal(index + 1, total));
        cursor = segment_end;
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::{DeliveryKind, Mutability};
    use crate::types::SyncId;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 6, 0, 0)
            .single()
            .expect("valid test timestamp")
            + chrono::Duration::minutes(minutes)
    }

    fn basal(start_min: i64, end_min: i64, rate: f64) -> DeliveryInterval {
        DeliveryInterval::new(DeliveryKind::ScheduledBasal, ts(start_min), ts(end_min), rate)
    }

    fn rates(entries: &[(i64, i64, f64)]) -> Vec<RateSegment> {
        entries
            .iter()
            .map(|&(s, e, v)| RateSegment::new(ts(s), ts(e), v))
            .collect()
    }

    // Scenario from the upload pipeline: 25-minute basal, one schedule
    // boundary 10 minutes in, rate changing 2.0 -> 3.0 units/hour.
    #[test]
    fn splits_at_schedule_boundary() {
        let interval = basal(0, 25, 2.0);
        let history = rates(&[(-60, 10, 2.0), (10, 120, 3.0)]);

        let segments = segment_interval(&interval, &history);
        assert_eq!(segments.len(), 2);

        assert_eq!(segments[0].start, ts(0));
        assert_eq!(segments[0].end, ts(10));
        assert_eq!(segments[0].scheduled_rate, Some(2.0));

        assert_eq!(segments[1].start, ts(10));
        assert_eq!(segments[1].end, ts(25));
        assert_eq!(segments[1].scheduled_rate, Some(3.0));
    }

    #[test]
    fn segments_partition_the_input_span() {
        let interval = basal(3, 47, 1.0);
        let history = rates(&[(0, 10, 1.0), (10, 20, 2.0), (20, 30, 0.5), (30, 60, 1.5)]);

        let segments = segment_interval(&interval, &history);
        assert_eq!(segments.len(), 4);

        assert_eq!(segments[0].start, interval.start);
        assert_eq!(segments.last().unwrap().end, interval.end);
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "segments must be contiguous");
        }
    }

    #[test]
    fn misaligned_history_yields_no_gaps() {
        let interval = basal(0, 25, 1.0);
        // Gap in the history between minute 10 and minute 12.
        let history = rates(&[(0, 10, 1.0), (12, 30, 2.0)]);

        let segments = segment_interval(&interval, &history);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].end, segments[1].start);
        assert_eq!(segments[1].end, ts(25));
    }

    #[test]
    fn provisional_interval_is_never_split() {
        let mut interval = basal(0, 60, 1.0);
        interval.mutability = Mutability::Provisional;
        // Three boundaries inside the span.
        let history = rates(&[(0, 15, 1.0), (15, 30, 2.0), (30, 45, 3.0), (45, 90, 4.0)]);

        let segments = segment_interval(&interval, &history);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].scheduled_rate, Some(1.0));
        assert!(segments[0].indeterminate_duration);
        assert_eq!(segments[0].end, interval.end);
    }

    #[test]
    fn delivered_amount_is_apportioned_by_duration() {
        let mut interval = basal(0, 25, 2.0);
        interval.delivered = Some(2.5);
        let history = rates(&[(-60, 10, 2.0), (10, 120, 3.0)]);

        let segments = segment_interval(&interval, &history);
        let first = segments[0].delivered.unwrap();
        let second = segments[1].delivered.unwrap();

        assert!((first - 1.0).abs() < 1e-9); // 10/25 of 2.5
        assert!((second - 1.5).abs() < 1e-9); // 15/25 of 2.5
        assert!((first + second - 2.5).abs() < 1e-9);
    }

    #[test]
    fn later_segments_get_ordinal_suffix() {
        let mut interval = basal(0, 30, 1.0);
        interval.sync_id = Some(SyncId::new("dose-7").unwrap());
        let history = rates(&[(0, 10, 1.0), (10, 20, 2.0), (20, 40, 3.0)]);

        let segments = segment_interval(&interval, &history);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].sync_id.as_ref().unwrap().as_str(), "dose-7");
        assert_eq!(segments[1].sync_id.as_ref().unwrap().as_str(), "dose-7 2/3");
        assert_eq!(segments[2].sync_id.as_ref().unwrap().as_str(), "dose-7 3/3");
    }

    #[test]
    fn bolus_passes_through_unchanged() {
        let bolus = DeliveryInterval::new(DeliveryKind::Bolus, ts(5), ts(5), 4.0);
        let history = rates(&[(0, 10, 1.0), (10, 20, 2.0)]);

        let segments = segment_interval(&bolus, &history);
        assert_eq!(segments, vec![bolus]);
    }

    #[test]
    fn empty_history_passes_through_unchanged() {
        let interval = basal(0, 25, 1.0);
        let segments = segment_interval(&interval, &[]);
        assert_eq!(segments, vec![interval]);
    }

    #[test]
    fn zero_duration_interval_is_not_split() {
        let interval = basal(10, 10, 1.0);
        let history = rates(&[(0, 10, 1.0), (10, 20, 2.0)]);

        let segments = segment_interval(&interval, &history);
        assert_eq!(segments.len(), 1);
        // The point t=10 falls in the second entry under half-open spans.
        assert_eq!(segments[0].scheduled_rate, Some(2.0));
    }

    #[test]
    fn no_overlap_passes_through_unchanged() {
        let interval = basal(0, 25, 1.0);
        let history = rates(&[(100, 200, 2.0)]);

        let segments = segment_interval(&interval, &history);
        assert_eq!(segments, vec![interval]);
    }
}
