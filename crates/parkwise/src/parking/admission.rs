//! Register and release vehicles against the shared lot record.
//!
//! No lock serializes callers. Every write is a conditional update keyed on the
//! `modified_at` marker of the snapshot it was computed from; a conflict means someone else
//! won, so the controller re-reads, re-checks membership and capacity, and tries again.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::billing::{self, BillingError};
use super::cancel::CancelSignal;
use super::domain::{
    LotSnapshot, LotStatus, RegistrationPayload, StayHours, VehicleId, VehicleRecord,
};
use super::store::{CapacityStore, LotMutation, UpdateOutcome};
use crate::clock::Clock;

/// Backoff and ceiling for conflict retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed before giving up with `ConcurrencyExhausted`. `None` retries forever.
    pub max_attempts: Option<u32>,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    /// Retry forever without sleeping between attempts.
    pub fn immediate() -> Self {
        Self {
            max_attempts: None,
            base_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts.max(1));
        self
    }

    /// Ceiling expressed as retries after the first attempt.
    pub fn with_max_retries(self, retries: u32) -> Self {
        self.with_max_attempts(retries.saturating_add(1))
    }

    /// Delay after the `conflicts`-th conflict: doubles from the base, capped at the max.
    pub fn backoff_for(&self, conflicts: u32) -> Duration {
        if conflicts == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32 << (conflicts - 1).min(16);
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            base_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(200),
        }
    }
}

/// A request to park one vehicle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionRequest {
    pub vehicle_id: VehicleId,
    pub category_space: u32,
    pub payload: RegistrationPayload,
}

/// How a registration ended when nothing went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Admitted(VehicleRecord),
    /// Not enough capacity. The lot was left untouched.
    LotFull { required: u32, available: u32 },
}

impl RegistrationOutcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, RegistrationOutcome::Admitted(_))
    }
}

/// A parked record together with the hours it has accrued up to `until`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stay {
    pub record: VehicleRecord,
    pub until: DateTime<Utc>,
    pub hours: StayHours,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    #[error("vehicle {0} is already parked inside the lot")]
    AlreadyParked(VehicleId),
    #[error("vehicle {0} is not in the parking lot")]
    NotParked(VehicleId),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    InvalidInterval(#[from] BillingError),
    #[error("gave up after {attempts} conflicting attempts")]
    ConcurrencyExhausted { attempts: u32 },
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("operation cancelled")]
    Cancelled,
}

impl AdmissionError {
    /// Expected outcomes the caller can act on, as opposed to operational faults.
    pub fn is_business_rejection(&self) -> bool {
        matches!(
            self,
            AdmissionError::AlreadyParked(_)
                | AdmissionError::NotParked(_)
                | AdmissionError::InvalidRequest(_)
                | AdmissionError::InvalidInterval(_)
        )
    }
}

/// Admission and release protocol over a [`CapacityStore`].
pub struct AdmissionController<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl<S> AdmissionController<S>
where
    S: CapacityStore + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Park a vehicle if it is absent and fits.
    ///
    /// Performs exactly one durable write when admitted and none when the lot is full.
    pub async fn register_vehicle(
        &self,
        request: AdmissionRequest,
        cancel: &CancelSignal,
    ) -> Result<RegistrationOutcome, AdmissionError> {
        let AdmissionRequest {
            vehicle_id,
            category_space,
            payload,
        } = request;
        ensure_vehicle_id(&vehicle_id)?;
        if category_space == 0 {
            return Err(AdmissionError::InvalidRequest(
                "category space must be positive".to_string(),
            ));
        }

        let mut lot = self.read(cancel).await?;
        if lot.contains(&vehicle_id) {
            return Err(AdmissionError::AlreadyParked(vehicle_id));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            if !lot.has_space_for(category_space) {
                info!(
                    vehicle_id = %vehicle_id,
                    required = category_space,
                    available = lot.available_space(),
                    "lot full, vehicle turned away"
                );
                return Ok(RegistrationOutcome::LotFull {
                    required: category_space,
                    available: lot.available_space(),
                });
            }

            let record = VehicleRecord {
                id: vehicle_id.clone(),
                registered_at: self.clock.now(),
                category_space,
                payload: payload.clone(),
            };
            let mutations = vec![
                LotMutation::AdmitVehicle(record.clone()),
                LotMutation::SetAvailableSpace(lot.available_space() - category_space),
            ];

            match self.commit(&lot, mutations, cancel).await? {
                Committed::Applied => {
                    info!(
                        vehicle_id = %vehicle_id,
                        category_space,
                        available = lot.available_space() - category_space,
                        attempt,
                        "vehicle admitted"
                    );
                    return Ok(RegistrationOutcome::Admitted(record));
                }
                Committed::Conflict => {
                    self.pause_before_retry(attempt, cancel).await?;
                    lot = self.read(cancel).await?;
                    if lot.contains(&vehicle_id) {
                        return Err(AdmissionError::AlreadyParked(vehicle_id));
                    }
                }
            }
        }
    }

    /// Remove a parked vehicle, return its capacity, and bill the stay up to now.
    pub async fn release_vehicle(
        &self,
        vehicle_id: &VehicleId,
        cancel: &CancelSignal,
    ) -> Result<Stay, AdmissionError> {
        ensure_vehicle_id(vehicle_id)?;
        let mut lot = self.read(cancel).await?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let record = lot
                .vehicles()
                .get(vehicle_id)
                .cloned()
                .ok_or_else(|| AdmissionError::NotParked(vehicle_id.clone()))?;

            let mutations = vec![
                LotMutation::RemoveVehicle(vehicle_id.clone()),
                LotMutation::SetAvailableSpace(lot.available_space() + record.category_space),
            ];

            match self.commit(&lot, mutations, cancel).await? {
                Committed::Applied => {
                    let stay = self.bill(record, &lot)?;
                    info!(
                        vehicle_id = %vehicle_id,
                        daily_hours = stay.hours.daily,
                        nightly_hours = stay.hours.nightly,
                        attempt,
                        "vehicle released"
                    );
                    return Ok(stay);
                }
                Committed::Conflict => {
                    self.pause_before_retry(attempt, cancel).await?;
                    lot = self.read(cancel).await?;
                }
            }
        }
    }

    /// Hours a parked vehicle would pay for if it left now. Never writes.
    pub async fn calculate_stay_hours(
        &self,
        vehicle_id: &VehicleId,
        cancel: &CancelSignal,
    ) -> Result<StayHours, AdmissionError> {
        Ok(self.inspect_stay(vehicle_id, cancel).await?.hours)
    }

    /// Like [`calculate_stay_hours`](Self::calculate_stay_hours) but keeps the record.
    pub async fn inspect_stay(
        &self,
        vehicle_id: &VehicleId,
        cancel: &CancelSignal,
    ) -> Result<Stay, AdmissionError> {
        ensure_vehicle_id(vehicle_id)?;
        let lot = self.read(cancel).await?;
        let record = lot
            .vehicles()
            .get(vehicle_id)
            .cloned()
            .ok_or_else(|| AdmissionError::NotParked(vehicle_id.clone()))?;
        self.bill(record, &lot)
    }

    pub async fn lot_status(&self, cancel: &CancelSignal) -> Result<LotStatus, AdmissionError> {
        Ok(self.read(cancel).await?.status())
    }

    async fn read(&self, cancel: &CancelSignal) -> Result<LotSnapshot, AdmissionError> {
        checkpoint(cancel)?;
        let lot = self.store.read_lot().await.map_err(|err| {
            warn!(error = %err, "lot read failed");
            AdmissionError::StoreUnavailable(err.to_string())
        })?;
        if !lot.is_consistent() {
            warn!(
                total = lot.total_space(),
                available = lot.available_space(),
                occupied = lot.vehicles().occupied_space(),
                "lot snapshot violates the capacity invariant"
            );
        }
        Ok(lot)
    }

    async fn commit(
        &self,
        snapshot: &LotSnapshot,
        mutations: Vec<LotMutation>,
        cancel: &CancelSignal,
    ) -> Result<Committed, AdmissionError> {
        checkpoint(cancel)?;
        match self
            .store
            .conditional_update(snapshot.modified_at(), mutations)
            .await
        {
            UpdateOutcome::Success { .. } => Ok(Committed::Applied),
            UpdateOutcome::Conflict => Ok(Committed::Conflict),
            UpdateOutcome::Failed { reason } => {
                warn!(%reason, "conditional lot update was not acknowledged");
                Err(AdmissionError::StoreUnavailable(reason))
            }
        }
    }

    async fn pause_before_retry(
        &self,
        attempt: u32,
        cancel: &CancelSignal,
    ) -> Result<(), AdmissionError> {
        if let Some(max_attempts) = self.retry.max_attempts {
            if attempt >= max_attempts {
                warn!(attempts = attempt, "conflict retries exhausted");
                return Err(AdmissionError::ConcurrencyExhausted { attempts: attempt });
            }
        }

        let delay = self.retry.backoff_for(attempt);
        debug!(attempt, delay_ms = delay.as_millis() as u64, "lot changed underneath, retrying");
        if delay.is_zero() {
            return checkpoint(cancel);
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(()),
            _ = cancel.cancelled() => Err(AdmissionError::Cancelled),
        }
    }

    fn bill(&self, record: VehicleRecord, lot: &LotSnapshot) -> Result<Stay, AdmissionError> {
        // A clock running behind the recorded arrival bills nothing rather than failing.
        let until = self.clock.now().max(record.registered_at);
        let hours = billing::compute_hours(record.registered_at, until, lot.window())?;
        Ok(Stay {
            record,
            until,
            hours,
        })
    }
}

enum Committed {
    Applied,
    Conflict,
}

fn checkpoint(cancel: &CancelSignal) -> Result<(), AdmissionError> {
    if cancel.is_cancelled() {
        Err(AdmissionError::Cancelled)
    } else {
        Ok(())
    }
}

fn ensure_vehicle_id(vehicle_id: &VehicleId) -> Result<(), AdmissionError> {
    if vehicle_id.as_str().trim().is_empty() {
        Err(AdmissionError::InvalidRequest(
            "vehicle id must not be empty".to_string(),
        ))
    } else {
        Ok(())
    }
}
