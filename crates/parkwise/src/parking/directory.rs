use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::domain::{PromotionCard, VehicleCategory, VehicleId};

/// What the lot remembers about a vehicle between visits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleProfile {
    pub id: VehicleId,
    pub category: VehicleCategory,
    pub promotion_card: Option<PromotionCard>,
    /// Bumped on every update; the token for conditional writes.
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(VehicleProfile),
    /// Someone registered this vehicle first; their profile is returned untouched.
    Existing(VehicleProfile),
}

impl InsertOutcome {
    pub fn into_profile(self) -> VehicleProfile {
        match self {
            InsertOutcome::Inserted(profile) | InsertOutcome::Existing(profile) => profile,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardUpdate {
    Updated(VehicleProfile),
    /// The stored version moved on since the caller read it.
    Conflict,
    NotFound,
}

/// Per-vehicle profile store. Writes are conditional on the vehicle's own key or version,
/// so concurrent first registrations of different vehicles never contend.
#[async_trait]
pub trait VehicleDirectory: Send + Sync {
    async fn fetch(&self, id: &VehicleId) -> Result<Option<VehicleProfile>, DirectoryError>;

    /// Atomically create the profile unless one exists for the same id.
    async fn insert_if_absent(&self, profile: VehicleProfile)
        -> Result<InsertOutcome, DirectoryError>;

    async fn update_card(
        &self,
        id: &VehicleId,
        expected_version: u64,
        card: Option<PromotionCard>,
    ) -> Result<CardUpdate, DirectoryError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectoryError {
    #[error("vehicle directory unavailable: {0}")]
    Unavailable(String),
}

#[derive(Default, Clone)]
pub struct InMemoryVehicleDirectory {
    profiles: Arc<Mutex<HashMap<VehicleId, VehicleProfile>>>,
}

impl InMemoryVehicleDirectory {
    pub fn len(&self) -> usize {
        self.profiles.lock().expect("directory mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VehicleDirectory for InMemoryVehicleDirectory {
    async fn fetch(&self, id: &VehicleId) -> Result<Option<VehicleProfile>, DirectoryError> {
        let guard = self.profiles.lock().expect("directory mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    async fn insert_if_absent(
        &self,
        profile: VehicleProfile,
    ) -> Result<InsertOutcome, DirectoryError> {
        let mut guard = self.profiles.lock().expect("directory mutex poisoned");
        if let Some(existing) = guard.get(&profile.id) {
            return Ok(InsertOutcome::Existing(existing.clone()));
        }
        guard.insert(profile.id.clone(), profile.clone());
        Ok(InsertOutcome::Inserted(profile))
    }

    async fn update_card(
        &self,
        id: &VehicleId,
        expected_version: u64,
        card: Option<PromotionCard>,
    ) -> Result<CardUpdate, DirectoryError> {
        let mut guard = self.profiles.lock().expect("directory mutex poisoned");
        let Some(profile) = guard.get_mut(id) else {
            return Ok(CardUpdate::NotFound);
        };
        if profile.version != expected_version {
            return Ok(CardUpdate::Conflict);
        }
        profile.promotion_card = card;
        profile.version += 1;
        Ok(CardUpdate::Updated(profile.clone()))
    }
}
