use chrono::{DateTime, NaiveDateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use parkwise::clock::Clock;
use parkwise::config::ParkingConfig;
use parkwise::parking::{
    AdmissionController, InMemoryCapacityStore, InMemoryVehicleDirectory, Lot, ParkingService,
    TariffTable,
};
use serde::Deserialize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

pub(crate) type LotService = ParkingService<InMemoryCapacityStore, InMemoryVehicleDirectory>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) parking: ParkingConfig,
}

/// Seed a fresh lot from configuration and wire the gate service over in-memory adapters.
pub(crate) fn seeded_parking_service(config: &ParkingConfig, clock: Arc<dyn Clock>) -> LotService {
    let lot = Lot::new(config.total_space, config.window, clock.now());
    let store = Arc::new(InMemoryCapacityStore::seeded(lot, clock.clone()));
    let admission = AdmissionController::new(store, clock).with_retry_policy(config.retry);

    info!(
        total_space = config.total_space,
        daily_start_hour = config.window.daily_start(),
        nightly_start_hour = config.window.nightly_start(),
        max_conflict_retries = ?config.retry.max_attempts,
        "parking lot seeded"
    );

    ParkingService::new(
        Arc::new(admission),
        Arc::new(InMemoryVehicleDirectory::default()),
        TariffTable::standard(),
    )
}

/// Accepts RFC 3339 timestamps, or `YYYY-MM-DD HH:MM` read as UTC.
pub(crate) fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    let trimmed = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M")
        .map(|naive| naive.and_utc())
        .map_err(|err| {
            format!("failed to parse '{raw}' as RFC 3339 or YYYY-MM-DD HH:MM ({err})")
        })
}

pub(crate) fn deserialize_instant<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_instant(&raw).map_err(serde::de::Error::custom)
}
