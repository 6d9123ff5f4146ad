use crate::cli::ServeArgs;
use crate::infra::{build_workflow, AppState};
use crate::routes::with_licensing_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use energy_licensing::clock::{Clock, SystemClock};
use energy_licensing::config::AppConfig;
use energy_licensing::error::AppError;
use energy_licensing::telemetry;
use energy_licensing::workflows::licensing::SchedulerError;
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
    if args.no_scheduler {
        config.scheduler.enabled = false;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let workflow = build_workflow(&config, clock);
    let scheduler = workflow.scheduler().clone();
    let scheduler_task = match scheduler.start() {
        Ok(handle) => Some(handle),
        Err(SchedulerError::Disabled) => {
            warn!("deadline scheduler disabled; overdue detection runs only on demand");
            None
        }
        Err(err) => return Err(err.into()),
    };

    let app = with_licensing_routes(workflow)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "energy licensing service ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    readiness_flag.store(false, Ordering::Release);
    scheduler.stop();
    if let Some(task) = scheduler_task {
        if let Err(err) = task.await {
            warn!(error = %err, "deadline scheduler task ended abnormally");
        }
    }
    info!("energy licensing service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
