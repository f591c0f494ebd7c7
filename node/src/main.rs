//! Weave node binary: loads settings, serves the adapters and runs discovery.

use tracing::{error, info};
use weave_node::infrastructure::{
    audit::{self, AuditEvent},
    config::Settings,
    server,
    telemetry::Telemetry,
};
use weave_node::mesh::Mesh;
use weave_node::transport::TransportKind;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Settings::new()?;
    let options = config.mesh_options()?;
    let telemetry = Telemetry::init(&config.telemetry, &options.name)?;

    let transport = options.transport;
    let mesh = Mesh::new(options);
    let current = mesh.current();

    info!(peer_id = %current.id(), name = current.name(), address = %current.address(), transport = %transport, "Weave node starting");
    audit::log_audit(&AuditEvent::NodeStartup {
        peer: current.id().to_string(),
        address: current.address().to_string(),
    });

    let http_config = config.clone();
    let http_mesh = mesh.clone();
    tokio::spawn(async move {
        if let Err(e) = server::run_http_server(&http_config, http_mesh).await {
            error!("HTTP server failed: {:?}", e);
        }
    });

    if transport == TransportKind::Grpc {
        let grpc_config = config.clone();
        let grpc_mesh = mesh.clone();
        tokio::spawn(async move {
            if let Err(e) = server::run_grpc_server(&grpc_config, grpc_mesh).await {
                error!("gRPC server failed: {:?}", e);
            }
        });
    }

    mesh.start_until(shutdown_signal()).await;

    info!("Shutdown signal received, cleaning up...");
    audit::log_audit(&AuditEvent::NodeShutdown {
        reason: "Signal received".into(),
    });

    info!("Weave node stopped.");
    telemetry.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
