mod handlers;
mod server;

use cdtarget::controllers::cdtarget_controller::{self, State};
use cdtarget::util::config::OperatorConfig;
use cdtarget::util::telemetry;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init().await;

    let config = OperatorConfig::from_env()?;
    info!(
        "Starting cdtarget operator in namespace {} (metrics on {})",
        config.operator_namespace, config.metrics_bind_address
    );

    // Initialize Kubernetes controller state
    let state = State::default();
    let server = server::server(state.clone(), &config.metrics_bind_address)?;
    let controller = cdtarget_controller::run(state, config);

    // Both runtimes implement graceful shutdown, so poll until both are done
    let (controller, server) = tokio::join!(controller, server);
    controller?;
    server?;
    Ok(())
}
