use crate::infra::{deserialize_instant, AppState, LotService};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use chrono::{DateTime, Utc};
use parkwise::error::AppError;
use parkwise::parking::{compute_hours, parking_router, DayNightWindow};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct BillingHoursRequest {
    #[serde(deserialize_with = "deserialize_instant")]
    pub(crate) start: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_instant")]
    pub(crate) end: DateTime<Utc>,
    /// Falls back to the lot's configured window.
    #[serde(default)]
    pub(crate) daily_start_hour: Option<u8>,
    #[serde(default)]
    pub(crate) nightly_start_hour: Option<u8>,
}

#[derive(Debug, Serialize)]
pub(crate) struct BillingHoursResponse {
    pub(crate) start: DateTime<Utc>,
    pub(crate) end: DateTime<Utc>,
    pub(crate) daily_start_hour: u8,
    pub(crate) nightly_start_hour: u8,
    pub(crate) daily_hours: u32,
    pub(crate) nightly_hours: u32,
    pub(crate) total_hours: u32,
}

pub(crate) fn with_parking_routes(service: Arc<LotService>) -> axum::Router {
    parking_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/billing/hours",
            axum::routing::post(billing_hours_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Stateless hour split for an arbitrary interval; nothing is read from or written to the lot.
pub(crate) async fn billing_hours_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<BillingHoursRequest>,
) -> Result<Json<BillingHoursResponse>, AppError> {
    let BillingHoursRequest {
        start,
        end,
        daily_start_hour,
        nightly_start_hour,
    } = payload;

    let configured = state.parking.window;
    let window = DayNightWindow::new(
        daily_start_hour.unwrap_or(configured.daily_start()),
        nightly_start_hour.unwrap_or(configured.nightly_start()),
    )?;
    let hours = compute_hours(start, end, window)?;

    Ok(Json(BillingHoursResponse {
        start,
        end,
        daily_start_hour: window.daily_start(),
        nightly_start_hour: window.nightly_start(),
        daily_hours: hours.daily,
        nightly_hours: hours.nightly,
        total_hours: hours.total(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::seeded_parking_service;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::TimeZone;
    use parkwise::clock::FixedClock;
    use parkwise::config::ParkingConfig;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn state(ready: bool) -> AppState {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(recorder.handle()),
            parking: ParkingConfig::default(),
        }
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn billing_hours_uses_configured_window_by_default() {
        let request = BillingHoursRequest {
            start: at(1, 22),
            end: at(2, 2),
            daily_start_hour: None,
            nightly_start_hour: None,
        };

        let Json(body) = billing_hours_endpoint(Extension(state(true)), Json(request))
            .await
            .expect("hours computed");

        assert_eq!(body.daily_hours, 0);
        assert_eq!(body.nightly_hours, 5);
        assert_eq!(body.total_hours, 5);
        assert_eq!(body.daily_start_hour, 8);
    }

    #[tokio::test]
    async fn billing_hours_accepts_a_custom_window() {
        let request = BillingHoursRequest {
            start: at(1, 23),
            end: at(3, 0),
            daily_start_hour: Some(6),
            nightly_start_hour: Some(22),
        };

        let Json(body) = billing_hours_endpoint(Extension(state(true)), Json(request))
            .await
            .expect("hours computed");

        assert_eq!(body.daily_hours, 16);
        assert_eq!(body.nightly_hours, 10);
    }

    #[tokio::test]
    async fn billing_hours_rejects_reversed_interval() {
        let request = BillingHoursRequest {
            start: at(2, 10),
            end: at(1, 10),
            daily_start_hour: None,
            nightly_start_hour: None,
        };

        let err = billing_hours_endpoint(Extension(state(true)), Json(request))
            .await
            .expect_err("end precedes start");

        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn readiness_reflects_flag() {
        let response = readiness_endpoint(Extension(state(false)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = readiness_endpoint(Extension(state(true)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn service_router_serves_parking_and_ops_routes() {
        let clock = Arc::new(FixedClock::new(at(1, 9)));
        let service = Arc::new(seeded_parking_service(&ParkingConfig::default(), clock));
        let app = with_parking_routes(service).layer(Extension(state(true)));

        let response = app
            .clone()
            .oneshot(
                Request::get("/health")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::get("/api/v1/parking-lot")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024)
            .await
            .expect("read body");
        let payload: serde_json::Value = serde_json::from_slice(&body).expect("json payload");
        assert_eq!(payload["total_space"], 200);
        assert_eq!(payload["available_space"], 200);
    }
}
