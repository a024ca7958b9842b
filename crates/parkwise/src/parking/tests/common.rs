use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::clock::{Clock, FixedClock};
use crate::parking::directory::{
    CardUpdate, DirectoryError, InMemoryVehicleDirectory, InsertOutcome, VehicleDirectory,
    VehicleProfile,
};
use crate::parking::domain::{
    DayNightWindow, Lot, LotSnapshot, PromotionCard, RegistrationPayload, VehicleId,
    VehicleRecord,
};
use crate::parking::store::{CapacityStore, LotMutation, StoreError, UpdateOutcome};
use crate::parking::{
    AdmissionController, AdmissionRequest, InMemoryCapacityStore, ParkingService, RetryPolicy,
    TariffTable, VehicleRegistration,
};

/// Thursday morning, inside the default daytime window.
pub(super) fn opening() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap()
}

pub(super) fn seeded_store(total_space: u32, clock: Arc<FixedClock>) -> InMemoryCapacityStore {
    let lot = Lot::new(total_space, DayNightWindow::default(), clock.now());
    InMemoryCapacityStore::seeded(lot, clock)
}

pub(super) fn controller<S>(store: Arc<S>, clock: Arc<FixedClock>) -> AdmissionController<S>
where
    S: CapacityStore + 'static,
{
    AdmissionController::new(store, clock).with_retry_policy(RetryPolicy::immediate())
}

pub(super) fn build_controller(
    total_space: u32,
) -> (
    AdmissionController<InMemoryCapacityStore>,
    Arc<InMemoryCapacityStore>,
    Arc<FixedClock>,
) {
    let clock = Arc::new(FixedClock::new(opening()));
    let store = Arc::new(seeded_store(total_space, clock.clone()));
    (controller(store.clone(), clock.clone()), store, clock)
}

pub(super) fn request(id: &str, category_space: u32) -> AdmissionRequest {
    AdmissionRequest {
        vehicle_id: VehicleId(id.to_string()),
        category_space,
        payload: RegistrationPayload::default(),
    }
}

pub(super) fn registration(id: &str, category: &str, card: Option<&str>) -> VehicleRegistration {
    VehicleRegistration {
        registration_number: id.to_string(),
        category: category.to_string(),
        card: card.map(str::to_string),
    }
}

pub(super) type MemoryParkingService =
    ParkingService<InMemoryCapacityStore, InMemoryVehicleDirectory>;

pub(super) fn build_service(
    total_space: u32,
) -> (
    MemoryParkingService,
    Arc<InMemoryCapacityStore>,
    Arc<InMemoryVehicleDirectory>,
    Arc<FixedClock>,
) {
    let (controller, store, clock) = build_controller(total_space);
    let directory = Arc::new(InMemoryVehicleDirectory::default());
    let service = ParkingService::new(
        Arc::new(controller),
        directory.clone(),
        TariffTable::standard(),
    );
    (service, store, directory, clock)
}

/// Lot store that loses a number of conditional writes to a phantom competitor.
pub(super) struct ConflictingStore {
    inner: InMemoryCapacityStore,
    conflicts_left: AtomicU32,
    attempts: AtomicU32,
    rival: Rival,
}

/// What the phantom competitor writes when it wins a race.
#[derive(Clone, Copy)]
enum Rival {
    Silent,
    SameBatch,
    FillsLot,
}

impl ConflictingStore {
    /// Reports `conflicts` conflicts before letting writes through.
    pub(super) fn new(inner: InMemoryCapacityStore, conflicts: u32) -> Self {
        Self {
            inner,
            conflicts_left: AtomicU32::new(conflicts),
            attempts: AtomicU32::new(0),
            rival: Rival::Silent,
        }
    }

    pub(super) fn always(inner: InMemoryCapacityStore) -> Self {
        Self::new(inner, u32::MAX)
    }

    /// On the first write a competitor applies the very same mutations and the caller
    /// loses the race.
    pub(super) fn stealing(inner: InMemoryCapacityStore) -> Self {
        Self {
            rival: Rival::SameBatch,
            ..Self::new(inner, 1)
        }
    }

    /// On the first write a competitor parks a vehicle that takes every free unit.
    pub(super) fn crowding(inner: InMemoryCapacityStore) -> Self {
        Self {
            rival: Rival::FillsLot,
            ..Self::new(inner, 1)
        }
    }

    pub(super) fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub(super) fn inner(&self) -> &InMemoryCapacityStore {
        &self.inner
    }
}

#[async_trait]
impl CapacityStore for ConflictingStore {
    async fn read_lot(&self) -> Result<LotSnapshot, StoreError> {
        self.inner.read_lot().await
    }

    async fn conditional_update(
        &self,
        expected_modified_at: DateTime<Utc>,
        mutations: Vec<LotMutation>,
    ) -> UpdateOutcome {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.conflicts_left.load(Ordering::SeqCst);
        if remaining == 0 {
            return self
                .inner
                .conditional_update(expected_modified_at, mutations)
                .await;
        }
        if remaining != u32::MAX {
            self.conflicts_left.store(remaining - 1, Ordering::SeqCst);
        }
        match self.rival {
            Rival::Silent => {}
            Rival::SameBatch => {
                self.inner
                    .conditional_update(expected_modified_at, mutations)
                    .await;
            }
            Rival::FillsLot => {
                if let Ok(lot) = self.inner.read_lot().await {
                    let rival = VehicleRecord {
                        id: VehicleId("RIVAL".to_string()),
                        registered_at: lot.modified_at(),
                        category_space: lot.available_space(),
                        payload: RegistrationPayload::default(),
                    };
                    self.inner
                        .conditional_update(
                            lot.modified_at(),
                            vec![
                                LotMutation::AdmitVehicle(rival),
                                LotMutation::SetAvailableSpace(0),
                            ],
                        )
                        .await;
                }
            }
        }
        UpdateOutcome::Conflict
    }
}

/// Lot store whose writes are never acknowledged.
pub(super) struct FailingStore {
    inner: InMemoryCapacityStore,
}

impl FailingStore {
    pub(super) fn new(inner: InMemoryCapacityStore) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl CapacityStore for FailingStore {
    async fn read_lot(&self) -> Result<LotSnapshot, StoreError> {
        self.inner.read_lot().await
    }

    async fn conditional_update(
        &self,
        _expected_modified_at: DateTime<Utc>,
        _mutations: Vec<LotMutation>,
    ) -> UpdateOutcome {
        UpdateOutcome::Failed {
            reason: "write concern timed out".to_string(),
        }
    }
}

pub(super) struct UnavailableDirectory;

#[async_trait]
impl VehicleDirectory for UnavailableDirectory {
    async fn fetch(&self, _id: &VehicleId) -> Result<Option<VehicleProfile>, DirectoryError> {
        Err(DirectoryError::Unavailable("directory offline".to_string()))
    }

    async fn insert_if_absent(
        &self,
        _profile: VehicleProfile,
    ) -> Result<InsertOutcome, DirectoryError> {
        Err(DirectoryError::Unavailable("directory offline".to_string()))
    }

    async fn update_card(
        &self,
        _id: &VehicleId,
        _expected_version: u64,
        _card: Option<PromotionCard>,
    ) -> Result<CardUpdate, DirectoryError> {
        Err(DirectoryError::Unavailable("directory offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
