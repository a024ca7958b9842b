use crate::cli::ServeArgs;
use crate::infra::{seeded_parking_service, AppState};
use crate::routes::with_parking_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use parkwise::clock::{Clock, SystemClock};
use parkwise::config::AppConfig;
use parkwise::error::AppError;
use parkwise::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(total_space) = args.total_space.take() {
        config.parking.total_space = total_space;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        parking: config.parking.clone(),
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let parking_service = Arc::new(seeded_parking_service(&config.parking, clock));

    let app = with_parking_routes(parking_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "parking gate service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
