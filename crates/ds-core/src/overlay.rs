//! Automation overlay: resolving the closed-loop/manual flag on doses.
//!
//! Re-labels (and, where necessary, further splits) delivery intervals
//! using the piecewise-constant automation history. An explicit flag on an
//! interval always wins over inferred history.

use crate::interval::DeliveryInterval;
use crate::schedule::{AutomationSegment, overlapping};

/// Configuration for the automation overlay.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    /// Flag value assumed when no automation history covers a span.
    ///
    /// The product default is closed-loop (`true`): periods with no
    /// recorded mode transition are reported as automated therapy.
    /// Default: true.
    pub assume_automated: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            assume_automated: true,
        }
    }
}

/// Resolves the automation flag on every qualifying interval.
///
/// Intervals whose flag is already set, and kinds outside the
/// basal/suspend family, pass through unchanged. Order and contiguity of
/// the input sequence are preserved; sub-intervals produced by a split
/// stay contiguous and in time order within their parent.
pub fn overlay_automation(
    intervals: &[DeliveryInterval],
    automation_history: &[AutomationSegment],
    config: &OverlayConfig,
) -> Vec<DeliveryInterval> {
    intervals
        .iter()
        .flat_map(|interval| overlay_one(interval, automation_history, config))
        .collect()
}

fn overlay_one(
    interval: &DeliveryInterval,
    automation_history: &[AutomationSegment],
    config: &OverlayConfig,
) -> Vec<DeliveryInterval> {
    if interval.automated.is_some() || !interval.kind.carries_automation() {
        return vec![interval.clone()];
    }

    // If the recorded history starts after this interval does, cover the
    // gap with an implicit leading entry at the default value.
    let mut effective: Vec<AutomationSegment> = Vec::with_capacity(automation_history.len() + 1);
    if let Some(first) = automation_history.first() {
        if first.start > interval.start {
            effective.push(AutomationSegment::new(
                interval.start,
                first.start,
                config.assume_automated,
            ));
        }
    }
    effective.extend(automation_history.iter().cloned());

    let overlaps: Vec<&AutomationSegment> =
        overlapping(&effective, interval.start, interval.end).collect();
    let Some(first) = overlaps.first() else {
        // No history in force at all: assume closed loop.
        let mut single = interval.clone();
        single.automated = Some(config.assume_automated);
        return vec![single];
    };

    if interval.duration_ms() == 0 || interval.mutability.is_provisional() {
        // Same non-splitting policy as the segmenter: a provisional end
        // time may still move, and a zero-length span cannot be cut.
        let mut single = interval.clone();
        single.automated = Some(first.value);
        return vec![single];
    }

    let total = overlaps.len();
    let mut resolved = Vec::with_capacity(total);
    let mut cursor = interval.start;
    for (index, entry) in overlaps.iter().enumerate() {
        let is_last = index + 1 == total;
        let sub_end = if is_last {
            interval.end
        } else {
            entry.end.min(interval.end)
        };
        if sub_end <= cursor {
            continue;
        }

        let mut sub = interval.clipped(cursor, sub_end);
        sub.automated = Some(entry.value);
        resolved.push(sub.with_ordinal(index + 1, total));
        cursor = sub_end;
    }
    resolved
}
