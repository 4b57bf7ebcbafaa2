//! Core reconciliation logic for pump dose-history upload.
//!
//! This crate contains the fundamental types and logic for:
//! - Temporal segmentation: splitting doses against the basal rate schedule
//! - Automation overlay: resolving closed-loop/manual flags from mode history
//! - Identity resolution: deriving stable, collision-resistant upload identities

mod identity;
mod overlay;
mod pipeline;
mod segment;
pub mod interval;
pub mod schedule;
pub mod types;

pub use identity::{
    Identified, RecordKind, ResolvedIdentity, Selector, resolution_key, resolve_identity,
};
pub use interval::{DeliveryInterval, DeliveryKind, Mutability, Origin};
pub use overlay::{OverlayConfig, overlay_automation};
pub use pipeline::{BatchOutcome, IdentifiedInterval, resolve_batch, segment_and_overlay};
pub use schedule::{AutomationSegment, RateSegment, ScheduleSegment};
pub use segment::segment_interval;
pub use types::{AccountId, SyncId, ValidationError};
