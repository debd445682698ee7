//! Resource controllers mounted under `/api/v1`.
//!
//! Each controller exposes a [`ControllerRegistration`] so the composition
//! root decides which ones exist. Optional controllers are only registered
//! when their subsystem was provisioned.
use crate::core::{AppState, ControllerRegistration, Feature, ProvisionedDependencies};

pub mod auth;
pub mod containers;
pub mod groups;
pub mod kubernetes;
pub mod posts;
pub mod rbac;
pub mod users;

/// Resources known to the authorizer, in the order the dashboard shows them
pub const RESOURCES: [&str; 6] = ["namespaces", "users", "groups", "containers", "posts", "resources"];

/// Controllers for the provisioned subsystems, in registration order.
pub fn registrations(deps: &ProvisionedDependencies) -> Vec<ControllerRegistration<AppState>> {
    let mut registrations = vec![
        auth::registration(),
        users::registration(),
        groups::registration(),
        posts::registration(),
        rbac::registration(),
    ];
    if let Feature::Enabled(_) = deps.containers {
        registrations.push(containers::registration());
    }
    if let Feature::Enabled(_) = deps.orchestrator {
        registrations.push(kubernetes::registration());
    }
    registrations
}
