//! keel - the backend bootstrap of a multi-tenant admin dashboard.
//!
//! keel turns a configuration document into a running HTTP service. It
//! provisions the storage backend and the optional subsystems (cache,
//! container runtime, cluster orchestrator), assembles a fixed-order
//! middleware pipeline, serves the single-page frontend from an embedded
//! bundle or a live directory, mounts the API controllers and tears everything
//! down again on a termination signal.
//!
//! # Features
//! - Postgres, MySQL or SQLite storage through `sea-orm`, with migrations and seeding
//! - Optional Redis cache, Docker engine and Kubernetes watch caches
//! - Nine-stage middleware pipeline whose order is checked when it is built
//! - Embedded frontend in release mode, on-disk assets in development mode
//! - Route catalogue at `/api/list`, health at `/healthz`, Prometheus metrics at `/metrics`
//! - Graceful shutdown with a bounded drain and an idempotent teardown
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use keel::{LiveConnector, SubsystemProvisioner};
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let config = keel::config::load_config("config.yaml")?;
//! let deps = SubsystemProvisioner::new(&config, &LiveConnector).provision().await?;
//! println!("storage: {}", deps.storage_kind);
//! deps.close().await;
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! `ports` holds the traits for every external collaborator, `adapters` their
//! implementations and the HTTP-facing pieces, `core` the composition logic.
//!
//! # Error Handling
//! Plumbing returns `eyre::Result<T>` with `WrapErr` context. Each port has
//! its own `thiserror` enum, and request failures become [`core::error::ApiError`].
pub mod config;
pub mod metrics;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

// Types the binary needs
pub use crate::{
    adapters::{AppParts, LiveConnector, asset_source, build_app},
    core::{
        DrainOutcome, Feature, LifecycleManager, ProvisionError, ProvisionedDependencies,
        SubsystemProvisioner,
    },
    utils::GracefulShutdown,
};
