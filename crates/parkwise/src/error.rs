use crate::config::ConfigError;
use crate::parking::{BillingError, ParkingServiceError, WindowError};
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

/// Everything that can stop the service or fail a request at the top level.
#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Parking(ParkingServiceError),
    Billing(BillingError),
    Window(WindowError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Parking(err) => write!(f, "parking error: {}", err),
            AppError::Billing(err) => write!(f, "billing error: {}", err),
            AppError::Window(err) => write!(f, "window error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Parking(err) => Some(err),
            AppError::Billing(err) => Some(err),
            AppError::Window(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Parking(err) if err.is_business_rejection() => StatusCode::BAD_REQUEST,
            AppError::Billing(_) | AppError::Window(_) => StatusCode::BAD_REQUEST,
            AppError::Parking(_)
            | AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<ParkingServiceError> for AppError {
    fn from(value: ParkingServiceError) -> Self {
        Self::Parking(value)
    }
}

impl From<BillingError> for AppError {
    fn from(value: BillingError) -> Self {
        Self::Billing(value)
    }
}

impl From<WindowError> for AppError {
    fn from(value: WindowError) -> Self {
        Self::Window(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parking::{AdmissionError, VehicleId};

    #[test]
    fn business_rejections_are_bad_requests() {
        let err = AppError::from(ParkingServiceError::Admission(AdmissionError::NotParked(
            VehicleId("CA1".to_string()),
        )));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn inverted_window_is_a_bad_request() {
        let err = AppError::from(WindowError::Inverted {
            daily_start: 20,
            nightly_start: 6,
        });
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn faults_are_internal_errors() {
        let err = AppError::from(ParkingServiceError::Admission(
            AdmissionError::StoreUnavailable("replica lag".to_string()),
        ));
        assert!(err.to_string().contains("replica lag"));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
