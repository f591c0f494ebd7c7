/// Audit logging for security events.
pub mod audit;
/// Configuration management for the node binary.
pub mod config;
/// HTTP and gRPC server bootstrap.
pub mod server;
/// Telemetry setup for logging, tracing, and metrics.
pub mod telemetry;
