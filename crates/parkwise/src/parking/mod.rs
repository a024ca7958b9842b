//! Vehicle admission, capacity accounting, and stay billing for a single parking lot.

pub mod admission;
pub mod billing;
pub mod cancel;
pub mod directory;
pub mod domain;
pub mod memory;
pub mod router;
pub mod service;
pub mod store;
pub mod tariff;

#[cfg(test)]
mod tests;

pub use admission::{
    AdmissionController, AdmissionError, AdmissionRequest, RegistrationOutcome, RetryPolicy, Stay,
};
pub use billing::{compute_hours, BillingError};
pub use cancel::CancelSignal;
pub use directory::{
    CardUpdate, DirectoryError, InMemoryVehicleDirectory, InsertOutcome, VehicleDirectory,
    VehicleProfile,
};
pub use domain::{
    DayNightWindow, Lot, LotSnapshot, LotStatus, ParkedVehicles, PromotionCard,
    RegistrationPayload, StayHours, VehicleCategory, VehicleId, VehicleRecord, WindowError,
};
pub use memory::InMemoryCapacityStore;
pub use router::parking_router;
pub use service::{ParkingService, ParkingServiceError, VehicleRegistration};
pub use store::{CapacityStore, LotMutation, StoreError, UpdateOutcome};
pub use tariff::{PaymentQuote, Rate, TariffTable};
