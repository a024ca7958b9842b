use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use super::admission::{
    AdmissionController, AdmissionError, AdmissionRequest, RegistrationOutcome, Stay,
};
use super::cancel::CancelSignal;
use super::directory::{CardUpdate, DirectoryError, VehicleDirectory, VehicleProfile};
use super::domain::{LotStatus, PromotionCard, RegistrationPayload, VehicleCategory, VehicleId};
use super::store::CapacityStore;
use super::tariff::{PaymentQuote, TariffTable};

/// Raw registration as it arrives at the gate.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VehicleRegistration {
    pub registration_number: String,
    pub category: String,
    #[serde(default)]
    pub card: Option<String>,
}

/// Gate-level use cases: admit, release, and price vehicles.
pub struct ParkingService<S, D> {
    admission: Arc<AdmissionController<S>>,
    directory: Arc<D>,
    tariffs: Arc<TariffTable>,
}

impl<S, D> ParkingService<S, D>
where
    S: CapacityStore + 'static,
    D: VehicleDirectory + 'static,
{
    pub fn new(
        admission: Arc<AdmissionController<S>>,
        directory: Arc<D>,
        tariffs: TariffTable,
    ) -> Self {
        Self {
            admission,
            directory,
            tariffs: Arc::new(tariffs),
        }
    }

    /// Admit a vehicle, creating its profile on first visit.
    ///
    /// A vehicle keeps the category it was first registered with. The presented card replaces
    /// the stored one once the vehicle is admitted.
    pub async fn register(
        &self,
        registration: VehicleRegistration,
        cancel: &CancelSignal,
    ) -> Result<RegistrationOutcome, ParkingServiceError> {
        let id = parse_vehicle_id(&registration.registration_number)?;
        let category = VehicleCategory::parse(&registration.category).ok_or_else(|| {
            ParkingServiceError::InvalidVehicleCategory(registration.category.clone())
        })?;
        let card = parse_card(registration.card.as_deref())?;

        let profile = match self.directory.fetch(&id).await? {
            Some(profile) => profile,
            None => self
                .directory
                .insert_if_absent(VehicleProfile {
                    id: id.clone(),
                    category,
                    promotion_card: card,
                    version: 0,
                })
                .await?
                .into_profile(),
        };

        if profile.category != category {
            return Err(ParkingServiceError::ChangedVehicleCategory {
                registered: profile.category,
            });
        }

        let outcome = self
            .admission
            .register_vehicle(
                AdmissionRequest {
                    vehicle_id: id,
                    category_space: category.required_space(),
                    payload: RegistrationPayload {
                        category: Some(category),
                        promotion_card: card,
                    },
                },
                cancel,
            )
            .await?;

        if outcome.is_admitted() && profile.promotion_card != card {
            self.replace_card(profile, card).await?;
        }

        Ok(outcome)
    }

    /// Release a vehicle and price its stay.
    pub async fn unregister(
        &self,
        registration_number: &str,
        cancel: &CancelSignal,
    ) -> Result<PaymentQuote, ParkingServiceError> {
        let profile = self.registered_profile(registration_number).await?;
        let stay = self.admission.release_vehicle(&profile.id, cancel).await?;
        let quote = self.quote(&stay, &profile);
        info!(
            vehicle_id = %profile.id,
            amount_cents = quote.amount_cents,
            "payment due on exit"
        );
        Ok(quote)
    }

    /// Price the stay so far without releasing the vehicle.
    pub async fn payment_check(
        &self,
        registration_number: &str,
        cancel: &CancelSignal,
    ) -> Result<PaymentQuote, ParkingServiceError> {
        let profile = self.registered_profile(registration_number).await?;
        let stay = self.admission.inspect_stay(&profile.id, cancel).await?;
        Ok(self.quote(&stay, &profile))
    }

    pub async fn lot_status(&self, cancel: &CancelSignal) -> Result<LotStatus, ParkingServiceError> {
        Ok(self.admission.lot_status(cancel).await?)
    }

    async fn registered_profile(
        &self,
        registration_number: &str,
    ) -> Result<VehicleProfile, ParkingServiceError> {
        let id = parse_vehicle_id(registration_number)?;
        self.directory
            .fetch(&id)
            .await?
            .ok_or(ParkingServiceError::VehicleNotRegistered(id))
    }

    /// Prices with what was recorded at the gate, falling back to the profile.
    fn quote(&self, stay: &Stay, profile: &VehicleProfile) -> PaymentQuote {
        let payload = &stay.record.payload;
        let (category, card) = match payload.category {
            Some(category) => (category, payload.promotion_card),
            None => (profile.category, profile.promotion_card),
        };
        self.tariffs.quote(category, card, stay.hours)
    }

    async fn replace_card(
        &self,
        mut profile: VehicleProfile,
        card: Option<PromotionCard>,
    ) -> Result<(), ParkingServiceError> {
        loop {
            match self
                .directory
                .update_card(&profile.id, profile.version, card)
                .await?
            {
                CardUpdate::Updated(_) => return Ok(()),
                CardUpdate::Conflict => {
                    let Some(fresh) = self.directory.fetch(&profile.id).await? else {
                        return Ok(());
                    };
                    if fresh.promotion_card == card {
                        return Ok(());
                    }
                    profile = fresh;
                }
                CardUpdate::NotFound => {
                    warn!(vehicle_id = %profile.id, "profile vanished before card update");
                    return Ok(());
                }
            }
        }
    }
}

fn parse_vehicle_id(raw: &str) -> Result<VehicleId, ParkingServiceError> {
    VehicleId::parse(raw).ok_or(ParkingServiceError::InvalidRegistrationNumber)
}

fn parse_card(raw: Option<&str>) -> Result<Option<PromotionCard>, ParkingServiceError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => PromotionCard::parse(value)
            .map(Some)
            .ok_or_else(|| ParkingServiceError::InvalidCardType(value.to_string())),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParkingServiceError {
    #[error("registration number must not be empty")]
    InvalidRegistrationNumber,
    #[error("the given vehicle category {0} does not exist")]
    InvalidVehicleCategory(String),
    #[error("the given promotion card {0} does not exist")]
    InvalidCardType(String),
    #[error("the given vehicle is already registered as {registered} category")]
    ChangedVehicleCategory { registered: VehicleCategory },
    #[error("vehicle {0} is not registered")]
    VehicleNotRegistered(VehicleId),
    #[error(transparent)]
    Admission(#[from] AdmissionError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

impl ParkingServiceError {
    pub fn is_business_rejection(&self) -> bool {
        match self {
            ParkingServiceError::Admission(err) => err.is_business_rejection(),
            ParkingServiceError::Directory(_) => false,
            _ => true,
        }
    }
}
