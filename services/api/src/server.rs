use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use scoring::auth::Authenticator;
use scoring::config::AppConfig;
use scoring::error::AppError;
use scoring::store::Store;
use scoring::telemetry;
use scoring::MethodDispatcher;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(log) = args.log.take() {
        config.telemetry.log_file = Some(log);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Store::connect(&config.store).await?;
    if let Err(err) = store.ping().await {
        warn!(error = %err, "store did not answer ping, continuing with degraded cache");
    }
    let dispatcher = Arc::new(MethodDispatcher::new(
        store,
        Authenticator::new(&config.auth),
    ));

    let app = with_service_routes(dispatcher)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "scoring api ready");

    axum::serve(listener, app).await?;
    Ok(())
}
