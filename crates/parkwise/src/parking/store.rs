use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::domain::{LotSnapshot, VehicleId, VehicleRecord};

/// One field change inside a conditional lot update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LotMutation {
    AdmitVehicle(VehicleRecord),
    RemoveVehicle(VehicleId),
    SetAvailableSpace(u32),
}

/// Result of a conditional update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// All mutations applied; carries the lot's new modification marker.
    Success { modified_at: DateTime<Utc> },
    /// The lot changed since the caller's snapshot. Nothing was applied.
    Conflict,
    /// The store could not acknowledge the write. Nothing was applied.
    Failed { reason: String },
}

/// Persistence over the one shared lot record.
///
/// Implementations apply a conditional update all-or-nothing and only when the stored
/// `modified_at` still equals `expected_modified_at`, advancing the marker on success.
#[async_trait]
pub trait CapacityStore: Send + Sync {
    async fn read_lot(&self) -> Result<LotSnapshot, StoreError>;

    async fn conditional_update(
        &self,
        expected_modified_at: DateTime<Utc>,
        mutations: Vec<LotMutation>,
    ) -> UpdateOutcome;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("lot record has not been seeded")]
    MissingLot,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
