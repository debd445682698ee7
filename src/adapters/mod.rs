pub mod app;
pub mod assets;
pub mod cache;
pub mod connector;
pub mod container;
pub mod controllers;
pub mod middleware;
pub mod orchestrator;
pub mod storage;
pub mod system_routes;

/// Re-export commonly used types from adapters
pub use app::{AppParts, asset_source, build_app};
pub use assets::{DiskDirectory, EmbeddedBundle};
pub use connector::LiveConnector;
