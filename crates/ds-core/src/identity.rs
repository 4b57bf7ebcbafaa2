//! Deterministic upload-identity derivation.
//!
//! Every loggable event gets an opaque, fixed-length identity derived from
//! (account scope, resolution key, record kind), so retried uploads of the
//! same event can never create duplicate remote records. Identities are
//! ephemeral: recomputed fresh on every batch, never persisted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::interval::{DeliveryInterval, DeliveryKind};
use crate::types::{AccountId, ValidationError};

/// Joins provenance scope and local identifier in a composite resolution
/// key. Fixed: changing it would re-identify every previously uploaded
/// record.
const ORIGIN_DELIMITER: char = '/';

/// Joins account scope, resolution key, and record kind in the digest
/// input. Fixed for the same reason.
const SCOPE_DELIMITER: char = ':';

/// The target record type a source event maps to.
///
/// Distinguishes e.g. a scheduled-basal record from a status record even
/// when both are produced from the same source event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    ScheduledBasal,
    TempBasal,
    Suspend,
    Bolus,
    Resume,
    Settings,
    Status,
    Alert,
}

impl RecordKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ScheduledBasal => "scheduled-basal",
            Self::TempBasal => "temp-basal",
            Self::Suspend => "suspend",
            Self::Bolus => "bolus",
            Self::Resume => "resume",
            Self::Settings => "settings",
            Self::Status => "status",
            Self::Alert => "alert",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled-basal" => Ok(Self::ScheduledBasal),
            "temp-basal" => Ok(Self::TempBasal),
            "suspend" => Ok(Self::Suspend),
            "bolus" => Ok(Self::Bolus),
            "resume" => Ok(Self::Resume),
            "settings" => Ok(Self::Settings),
            "status" => Ok(Self::Status),
            "alert" => Ok(Self::Alert),
            _ => Err(ValidationError::InvalidRecordKind {
                value: s.to_string(),
            }),
        }
    }
}

impl Serialize for RecordKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RecordKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl From<DeliveryKind> for RecordKind {
    fn from(kind: DeliveryKind) -> Self {
        match kind {
            DeliveryKind::ScheduledBasal => Self::ScheduledBasal,
            DeliveryKind::TempBasal => Self::TempBasal,
            DeliveryKind::Suspend => Self::Suspend,
            DeliveryKind::Bolus => Self::Bolus,
            DeliveryKind::Resume => Self::Resume,
        }
    }
}

/// A loggable event that may carry identifying information.
///
/// This trait allows identity resolution to work with different event
/// representations: delivery intervals, settings snapshots, device status,
/// alerts, or test fixtures.
pub trait Identified {
    /// The application-assigned sync identifier, if present.
    fn sync_id(&self) -> Option<&str>;

    /// The originating application or integration identity.
    fn provenance(&self) -> Option<&str>;

    /// An identifier unique within the provenance scope.
    fn local_id(&self) -> Option<&str>;
}

impl Identified for DeliveryInterval {
    fn sync_id(&self) -> Option<&str> {
        self.sync_id.as_ref().map(crate::types::SyncId::as_str)
    }

    fn provenance(&self) -> Option<&str> {
        self.origin.as_ref().map(|o| o.provenance.as_str())
    }

    fn local_id(&self) -> Option<&str> {
        self.origin.as_ref().map(|o| o.local_id.as_str())
    }
}

/// An opaque, fixed-length, deterministic upload identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedIdentity(String);

impl ResolvedIdentity {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResolvedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Enough to match or delete a previously uploaded record without its full
/// payload: the pre-digest resolution key and the record kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    pub key: String,
    pub kind: RecordKind,
}

/// Computes the resolution key uniquely identifying a source event.
///
/// Fallback order: the application-assigned sync identifier if non-empty,
/// else provenance scope joined with the locally-unique identifier, else
/// `None` — the event cannot be identified and is skipped, never uploaded.
pub fn resolution_key(event: &impl Identified) -> Option<String> {
    if let Some(sync_id) = event.sync_id().filter(|s| !s.is_empty()) {
        return Some(sync_id.to_string());
    }
    let provenance = event.provenance().filter(|s| !s.is_empty())?;
    let local_id = event.local_id().filter(|s| !s.is_empty())?;
    Some(format!("{provenance}{ORIGIN_DELIMITER}{local_id}"))
}

/// Derives the upload identity and matching selector for an event.
///
/// Returns `None` when the event has no usable resolution key; this is a
/// skip, not an error. The identity is a SHA-256 hex digest of
/// `account:key:kind`, so it is deterministic across retries and process
/// restarts, scoped per destination account, and non-reversible.
pub fn resolve_identity(
    event: &impl Identified,
    account: &AccountId,
    kind: RecordKind,
) -> Option<(ResolvedIdentity, Selector)> {
    let key = resolution_key(event)?;
    let identity = derive(account, &key, kind);
    Some((identity, Selector { key, kind }))
}

fn derive(account: &AccountId, key: &str, kind: RecordKind) -> ResolvedIdentity {
    let input = format!(
        "{account}{SCOPE_DELIMITER}{key}{SCOPE_DELIMITER}{kind}",
        account = account.as_str(),
        kind = kind.as_str(),
    );
    ResolvedIdentity(hex::encode(Sha256::digest(input.as_bytes())))
}
