use serde::Serialize;
use utoipa::ToSchema;

use crate::core::{auth::Identity, request_info::RequestInfo};

/// Outcome of an authorization check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

/// One entry of the authorizer's resource catalogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ResourceRule {
    pub resource: String,
    pub verbs: Vec<String>,
}

/// Authorizer decides whether an identity may perform the requested action.
pub trait Authorizer: Send + Sync + 'static {
    fn authorize(&self, identity: &Identity, request: &RequestInfo) -> Decision;

    /// Resources and verbs known to the policy
    fn resources(&self) -> Vec<ResourceRule>;
}
