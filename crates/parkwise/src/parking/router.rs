use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::admission::{AdmissionError, RegistrationOutcome};
use super::cancel::CancelSignal;
use super::directory::VehicleDirectory;
use super::domain::{PromotionCard, VehicleCategory};
use super::service::{ParkingService, ParkingServiceError, VehicleRegistration};
use super::store::CapacityStore;
use super::tariff::PaymentQuote;

/// Router exposing gate operations over HTTP.
pub fn parking_router<S, D>(service: Arc<ParkingService<S, D>>) -> Router
where
    S: CapacityStore + 'static,
    D: VehicleDirectory + 'static,
{
    Router::new()
        .route("/api/v1/parking-lot", get(lot_handler::<S, D>))
        .route("/api/v1/vehicles/register", post(register_handler::<S, D>))
        .route("/api/v1/vehicles/unregister", put(unregister_handler::<S, D>))
        .route(
            "/api/v1/vehicles/:registration_number/payment",
            get(payment_handler::<S, D>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub struct UnregisterRequest {
    pub registration_number: String,
}

#[derive(Debug, Serialize)]
pub struct AdmittedView {
    pub status: &'static str,
    pub registration_number: String,
    pub registered_at: DateTime<Utc>,
    pub category_space: u32,
}

#[derive(Debug, Serialize)]
pub struct PaymentView {
    pub registration_number: String,
    pub daily_hours: u32,
    pub nightly_hours: u32,
    pub category: VehicleCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion_card: Option<PromotionCard>,
    pub discount_percent: u32,
    pub amount_cents: u64,
    pub amount_to_pay: String,
}

impl PaymentView {
    fn new(registration_number: String, quote: PaymentQuote) -> Self {
        Self {
            registration_number,
            daily_hours: quote.hours.daily,
            nightly_hours: quote.hours.nightly,
            category: quote.category,
            promotion_card: quote.promotion_card,
            discount_percent: quote.discount_percent,
            amount_cents: quote.amount_cents,
            amount_to_pay: quote.amount_display(),
        }
    }
}

pub(crate) async fn lot_handler<S, D>(State(service): State<Arc<ParkingService<S, D>>>) -> Response
where
    S: CapacityStore + 'static,
    D: VehicleDirectory + 'static,
{
    match service.lot_status(&CancelSignal::new()).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn register_handler<S, D>(
    State(service): State<Arc<ParkingService<S, D>>>,
    Json(registration): Json<VehicleRegistration>,
) -> Response
where
    S: CapacityStore + 'static,
    D: VehicleDirectory + 'static,
{
    match service.register(registration, &CancelSignal::new()).await {
        Ok(RegistrationOutcome::Admitted(record)) => {
            let view = AdmittedView {
                status: "admitted",
                registration_number: record.id.0,
                registered_at: record.registered_at,
                category_space: record.category_space,
            };
            (StatusCode::OK, Json(view)).into_response()
        }
        Ok(RegistrationOutcome::LotFull {
            required,
            available,
        }) => {
            let payload = json!({
                "error": "parking lot doesn't have free space",
                "required_space": required,
                "available_space": available,
            });
            (StatusCode::CONFLICT, Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn unregister_handler<S, D>(
    State(service): State<Arc<ParkingService<S, D>>>,
    Json(request): Json<UnregisterRequest>,
) -> Response
where
    S: CapacityStore + 'static,
    D: VehicleDirectory + 'static,
{
    match service
        .unregister(&request.registration_number, &CancelSignal::new())
        .await
    {
        Ok(quote) => {
            let view = PaymentView::new(request.registration_number.trim().to_string(), quote);
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn payment_handler<S, D>(
    State(service): State<Arc<ParkingService<S, D>>>,
    Path(registration_number): Path<String>,
) -> Response
where
    S: CapacityStore + 'static,
    D: VehicleDirectory + 'static,
{
    match service
        .payment_check(&registration_number, &CancelSignal::new())
        .await
    {
        Ok(quote) => {
            let view = PaymentView::new(registration_number.trim().to_string(), quote);
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(err) => error_response(err),
    }
}

/// Business rejections are the client's to fix; faults are ours.
pub(crate) fn error_response(err: ParkingServiceError) -> Response {
    let status = match &err {
        ParkingServiceError::Admission(
            AdmissionError::Cancelled | AdmissionError::ConcurrencyExhausted { .. },
        ) => StatusCode::SERVICE_UNAVAILABLE,
        err if err.is_business_rejection() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({
        "error": err.to_string(),
    });
    (status, Json(payload)).into_response()
}
