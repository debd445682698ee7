pub mod assets;
pub mod authorization;
pub mod cache;
pub mod container;
pub mod orchestrator;
pub mod repository;
pub mod subsystems;
