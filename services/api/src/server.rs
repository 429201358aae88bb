use crate::cli::ServeArgs;
use crate::infra::{in_memory_ports, AppState, LoggingNotificationPublisher, StaticDirectory};
use crate::routes::with_hiring_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use hireflow::config::AppConfig;
use hireflow::error::AppError;
use hireflow::telemetry;
use hireflow::workflows::hiring::{FlowService, HiringState, ProgressionService};
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

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    if config.directory.recruiters.is_empty() {
        warn!("no recruiters configured; flow authoring will be refused");
    }
    let ports = in_memory_ports(
        StaticDirectory::from(&config.directory),
        Arc::new(LoggingNotificationPublisher::default()),
    );
    let hiring_state = HiringState {
        flows: Arc::new(FlowService::new(ports.clone())),
        progression: Arc::new(ProgressionService::new(
            ports,
            config.notifications.progression_settings(),
        )),
    };

    let app = with_hiring_routes(hiring_state)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "hiring flow service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
