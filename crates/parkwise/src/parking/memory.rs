use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::domain::{Lot, LotSnapshot};
use super::store::{CapacityStore, LotMutation, StoreError, UpdateOutcome};
use crate::clock::Clock;

/// Process-local lot store. Each read or conditional write holds the mutex for its own
/// duration only, the same document-level atomicity a database gives.
#[derive(Clone)]
pub struct InMemoryCapacityStore {
    lot: Arc<Mutex<Option<Lot>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryCapacityStore {
    /// Store without a lot; reads fail with [`StoreError::MissingLot`] until [`seed`] runs.
    ///
    /// [`seed`]: InMemoryCapacityStore::seed
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            lot: Arc::new(Mutex::new(None)),
            clock,
        }
    }

    pub fn seeded(lot: Lot, clock: Arc<dyn Clock>) -> Self {
        Self {
            lot: Arc::new(Mutex::new(Some(lot))),
            clock,
        }
    }

    /// Bootstrap the lot record. Returns false, leaving the stored lot untouched, when one
    /// already exists.
    pub fn seed(&self, lot: Lot) -> bool {
        let mut guard = self.lot.lock().expect("lot mutex poisoned");
        if guard.is_some() {
            return false;
        }
        *guard = Some(lot);
        true
    }

    fn next_marker(&self, previous: DateTime<Utc>) -> DateTime<Utc> {
        let now = self.clock.now();
        let floor = previous + Duration::microseconds(1);
        if now > floor {
            now
        } else {
            floor
        }
    }
}

#[async_trait]
impl CapacityStore for InMemoryCapacityStore {
    async fn read_lot(&self) -> Result<LotSnapshot, StoreError> {
        let guard = self.lot.lock().expect("lot mutex poisoned");
        guard.clone().ok_or(StoreError::MissingLot)
    }

    async fn conditional_update(
        &self,
        expected_modified_at: DateTime<Utc>,
        mutations: Vec<LotMutation>,
    ) -> UpdateOutcome {
        let mut guard = self.lot.lock().expect("lot mutex poisoned");
        let Some(current) = guard.as_ref() else {
            return UpdateOutcome::Failed {
                reason: StoreError::MissingLot.to_string(),
            };
        };

        if current.modified_at != expected_modified_at {
            return UpdateOutcome::Conflict;
        }

        let mut next = current.clone();
        if let Err(reason) = apply_mutations(&mut next, mutations) {
            return UpdateOutcome::Failed { reason };
        }

        next.modified_at = self.next_marker(current.modified_at);
        let modified_at = next.modified_at;
        *guard = Some(next);
        UpdateOutcome::Success { modified_at }
    }
}

/// Applies every mutation to a scratch copy; any violation discards the whole batch.
fn apply_mutations(lot: &mut Lot, mutations: Vec<LotMutation>) -> Result<(), String> {
    for mutation in mutations {
        match mutation {
            LotMutation::AdmitVehicle(record) => {
                lot.vehicles
                    .insert(record)
                    .map_err(|record| format!("vehicle {} is already in the lot", record.id))?;
            }
            LotMutation::RemoveVehicle(id) => {
                lot.vehicles
                    .remove(&id)
                    .ok_or_else(|| format!("vehicle {id} is not in the lot"))?;
            }
            LotMutation::SetAvailableSpace(space) => {
                lot.available_space = space;
            }
        }
    }

    if lot.is_consistent() {
        Ok(())
    } else {
        Err(format!(
            "update would leave {} of {} units available with {} units occupied",
            lot.available_space,
            lot.total_space,
            lot.vehicles.occupied_space()
        ))
    }
}
