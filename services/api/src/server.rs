use crate::cli::ServeArgs;
use crate::infra::{AppState, Workflows};
use crate::routes::with_workflow_routes;
use admitflow::config::{AppConfig, BootstrapAccount};
use admitflow::error::AppError;
use admitflow::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{error, info};

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

    let workflows = Workflows::in_memory(&config.auth);
    seed_accounts(&workflows, &config.auth.bootstrap_accounts);

    let app = with_workflow_routes(&workflows)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "admissions workflow service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Create the configured staff accounts. Failures are logged and do not stop startup.
pub(crate) fn seed_accounts(workflows: &Workflows, seeds: &[BootstrapAccount]) {
    for seed in seeds {
        let role = seed.role.as_wire();
        match workflows.accounts.ensure_bootstrap_account(seed) {
            Ok(Some(account)) => info!(account_id = %account.id, role, "bootstrap account created"),
            Ok(None) => info!(role, "bootstrap account already present"),
            Err(err) => error!(role, error = %err, "bootstrap account could not be created"),
        }
    }
}
