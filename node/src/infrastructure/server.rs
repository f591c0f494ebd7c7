use crate::infrastructure::config::{BindAddress, Settings};
use crate::mesh::Mesh;
use crate::server::{MeshService, router};
use crate::transport::proto::mesh_transport_server::MeshTransportServer;
use anyhow::Context;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::PrometheusBuilder;

async fn health_check() -> &'static str {
    "OK"
}

/// Runs the HTTP adapter together with the control plane
/// (`/health/live`, `/health/ready`, `/metrics`).
///
/// Installs the global Prometheus recorder, so it can only run once per process.
///
/// # Errors
///
/// Returns an error if the server fails to start or encounters an error while running.
pub async fn run_http_server(config: &Settings, mesh: Mesh) -> anyhow::Result<()> {
    let builder = PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {e}"))?;

    let control_plane = Router::new()
        .route("/health/live", get(health_check))
        .route("/health/ready", get(health_check))
        .route("/metrics", get(move || std::future::ready(handle.render())));

    let app = control_plane.merge(router(mesh));

    let addr = BindAddress(config.server.host.clone(), config.server.http_port).to_socket_addr()?;

    tracing::info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Runs the gRPC adapter.
///
/// # Errors
///
/// Returns an error if the server fails to bind or stops with an error.
pub async fn run_grpc_server(config: &Settings, mesh: Mesh) -> anyhow::Result<()> {
    let addr = BindAddress(config.server.host.clone(), config.server.grpc_port).to_socket_addr()?;

    tracing::info!("gRPC server listening on {}", addr);

    tonic::transport::Server::builder()
        .add_service(MeshTransportServer::new(MeshService::new(mesh)))
        .serve(addr)
        .await
        .context("gRPC server failed")?;

    Ok(())
}
