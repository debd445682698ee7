use crate::{
    core::{auth::Identity, request_info::RequestInfo},
    ports::{
        authorization::{Authorizer, Decision, ResourceRule},
        repository::ADMIN_ROLE,
    },
};

const READ_VERBS: [&str; 2] = ["get", "list"];
const ALL_VERBS: [&str; 6] = ["get", "list", "create", "update", "patch", "delete"];

/// Role based policy.
///
/// Admins may do anything. Other callers may use non-resource endpoints and,
/// once authenticated, read resources.
#[derive(Debug, Clone)]
pub struct RoleAuthorizer {
    resources: Vec<String>,
}

impl RoleAuthorizer {
    pub fn new<I, S>(resources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resources: resources.into_iter().map(Into::into).collect(),
        }
    }
}

impl Authorizer for RoleAuthorizer {
    fn authorize(&self, identity: &Identity, request: &RequestInfo) -> Decision {
        if !request.is_resource_request {
            return Decision::Allow;
        }

        match identity {
            Identity::User { role, .. } if role == ADMIN_ROLE => Decision::Allow,
            Identity::User { name, .. } => {
                if READ_VERBS.contains(&request.verb.as_str()) {
                    Decision::Allow
                } else {
                    Decision::Deny(format!(
                        "user '{name}' cannot {} {}",
                        request.verb,
                        request.resource.as_deref().unwrap_or("resources")
                    ))
                }
            }
            Identity::Anonymous => Decision::Deny("anonymous access to resources".to_string()),
        }
    }

    fn resources(&self) -> Vec<ResourceRule> {
        self.resources
            .iter()
            .map(|resource| ResourceRule {
                resource: resource.clone(),
                verbs: ALL_VERBS.iter().map(|v| (*v).to_string()).collect(),
            })
            .collect()
    }
}
