//! Batch entry points consumed by the upload pipeline.
//!
//! Raw delivery intervals flow through segmentation, then the automation
//! overlay, then identity resolution; the annotated output is handed to
//! the wire-format translation layer. Everything here is a pure function
//! of its inputs: no I/O, no clock reads, no retained state.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::identity::{RecordKind, ResolvedIdentity, Selector, resolve_identity};
use crate::interval::DeliveryInterval;
use crate::overlay::{OverlayConfig, overlay_automation};
use crate::schedule::{AutomationSegment, RateSegment};
use crate::segment::segment_interval;
use crate::types::AccountId;

/// Segments every interval against the rate schedule, then resolves
/// automation flags on the segmented sequence.
///
/// Output preserves the chronological order of the source sequence;
/// segments produced from a split interval remain contiguous and in time
/// order.
pub fn segment_and_overlay(
    intervals: &[DeliveryInterval],
    rate_history: &[RateSegment],
    automation_history: &[AutomationSegment],
    config: &OverlayConfig,
) -> Vec<DeliveryInterval> {
    let segmented: Vec<DeliveryInterval> = intervals
        .iter()
        .flat_map(|interval| segment_interval(interval, rate_history))
        .collect();
    overlay_automation(&segmented, automation_history, config)
}

/// A fully annotated interval ready for wire-format translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifiedInterval {
    pub interval: DeliveryInterval,
    pub identity: ResolvedIdentity,
    pub selector: Selector,
}

/// Outcome of identity resolution over a batch.
///
/// Unidentifiable events are excluded from `records` and counted in
/// `skipped`; the caller logs and continues, this is never a pipeline
/// failure.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub records: Vec<IdentifiedInterval>,
    pub skipped: usize,
}

/// Resolves an upload identity and selector for every interval in a batch.
///
/// The record kind is derived from each interval's delivery kind.
/// Resolution runs in parallel per interval; output order matches input
/// order.
pub fn resolve_batch(intervals: &[DeliveryInterval], account: &AccountId) -> BatchOutcome {
    let resolved: Vec<Option<IdentifiedInterval>> = intervals
        .par_iter()
        .map(|interval| {
            let kind = RecordKind::from(interval.kind);
            resolve_identity(interval, account, kind).map(|(identity, selector)| {
                IdentifiedInterval {
                    interval: interval.clone(),
                    identity,
                    selector,
                }
            })
        })
        .collect();

    let mut records = Vec::with_capacity(resolved.len());
    let mut skipped = 0;
    for (interval, entry) in intervals.iter().zip(resolved) {
        match entry {
            Some(record) => records.push(record),
            None => {
                tracing::warn!(kind = %interval.kind, start = %interval.start, "skipping unidentifiable event");
                skipped += 1;
            }
        }
    }

    BatchOutcome { records, skipped }
}
