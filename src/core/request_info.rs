//! Request-context enrichment.
//!
//! Derives resource metadata from the request path in the style of a Kubernetes
//! API server: `/{prefix}/{version}/[namespaces/{ns}/]{resource}[/{name}[/{subresource}]]`.
//! Paths that don't follow that shape are non-resource requests.
use std::collections::HashSet;

use http::Method;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInfo {
    pub is_resource_request: bool,
    pub path: String,
    /// Lowercase action, e.g. `list`, `get`, `create` (resource requests) or the
    /// lowercase HTTP method (non-resource requests)
    pub verb: String,
    pub api_prefix: Option<String>,
    pub api_version: Option<String>,
    pub namespace: Option<String>,
    pub resource: Option<String>,
    pub subresource: Option<String>,
    pub name: Option<String>,
}

impl RequestInfo {
    /// Whether the path sits below one of the API prefixes
    pub fn is_api(&self) -> bool {
        self.api_prefix.is_some()
    }

    pub fn is_read_only(&self) -> bool {
        matches!(self.verb.as_str(), "get" | "list" | "head" | "options")
    }
}

#[derive(Debug, Clone)]
pub struct RequestInfoFactory {
    api_prefixes: HashSet<String>,
}

impl RequestInfoFactory {
    pub fn new<I, S>(api_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            api_prefixes: api_prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn parse(&self, method: &Method, path: &str) -> RequestInfo {
        let mut info = RequestInfo {
            path: path.to_string(),
            verb: method.as_str().to_ascii_lowercase(),
            ..RequestInfo::default()
        };

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let Some(prefix) = segments.first() else {
            return info;
        };
        if !self.api_prefixes.contains(*prefix) {
            return info;
        }
        info.api_prefix = Some((*prefix).to_string());

        let Some(version) = segments.get(1).filter(|v| is_version(v)) else {
            return info;
        };
        info.api_version = Some((*version).to_string());

        let mut rest = &segments[2..];
        if rest.is_empty() {
            return info;
        }
        info.is_resource_request = true;

        if rest[0] == "namespaces" {
            if rest.len() >= 3 {
                info.namespace = Some(rest[1].to_string());
                rest = &rest[2..];
            } else if let Some(name) = rest.get(1) {
                info.namespace = Some((*name).to_string());
            }
        }

        info.resource = rest.first().map(|s| (*s).to_string());
        info.name = rest.get(1).map(|s| (*s).to_string());
        if rest.len() >= 3 {
            info.subresource = Some(rest[2..].join("/"));
        }

        info.verb = resource_verb(method, info.name.is_some()).to_string();
        info
    }
}

impl Default for RequestInfoFactory {
    fn default() -> Self {
        Self::new(["api"])
    }
}

fn is_version(segment: &str) -> bool {
    let mut chars = segment.chars();
    chars.next() == Some('v') && chars.next().is_some_and(|c| c.is_ascii_digit())
}

fn resource_verb(method: &Method, has_name: bool) -> &'static str {
    match *method {
        Method::GET | Method::HEAD if has_name => "get",
        Method::GET | Method::HEAD => "list",
        Method::POST => "create",
        Method::PUT => "update",
        Method::PATCH => "patch",
        Method::DELETE if has_name => "delete",
        Method::DELETE => "deletecollection",
        Method::OPTIONS => "options",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(method: Method, path: &str) -> RequestInfo {
        RequestInfoFactory::default().parse(&method, path)
    }

    #[test]
    fn test_collection_request() {
        let info = parse(Method::GET, "/api/v1/users");
        assert!(info.is_resource_request);
        assert_eq!(info.api_version.as_deref(), Some("v1"));
        assert_eq!(info.resource.as_deref(), Some("users"));
        assert_eq!(info.name, None);
        assert_eq!(info.verb, "list");
    }

    #[test]
    fn test_named_request_verbs() {
        assert_eq!(parse(Method::GET, "/api/v1/users/3").verb, "get");
        assert_eq!(parse(Method::PUT, "/api/v1/users/3").verb, "update");
        assert_eq!(parse(Method::DELETE, "/api/v1/users/3").verb, "delete");
        assert_eq!(parse(Method::DELETE, "/api/v1/users").verb, "deletecollection");
        assert_eq!(parse(Method::POST, "/api/v1/users").verb, "create");
    }

    #[test]
    fn test_namespaced_request() {
        let info = parse(Method::GET, "/api/v1/namespaces/default/pods/web-0/log");
        assert_eq!(info.namespace.as_deref(), Some("default"));
        assert_eq!(info.resource.as_deref(), Some("pods"));
        assert_eq!(info.name.as_deref(), Some("web-0"));
        assert_eq!(info.subresource.as_deref(), Some("log"));
    }

    #[test]
    fn test_namespace_itself() {
        let info = parse(Method::GET, "/api/v1/namespaces/default");
        assert_eq!(info.resource.as_deref(), Some("namespaces"));
        assert_eq!(info.name.as_deref(), Some("default"));
        assert_eq!(info.namespace.as_deref(), Some("default"));

        let info = parse(Method::GET, "/api/v1/namespaces");
        assert_eq!(info.resource.as_deref(), Some("namespaces"));
        assert_eq!(info.verb, "list");
    }

    #[test]
    fn test_non_resource_requests() {
        let info = parse(Method::GET, "/api/list");
        assert!(!info.is_resource_request);
        assert!(info.is_api());
        assert_eq!(info.verb, "get");

        let info = parse(Method::GET, "/healthz");
        assert!(!info.is_resource_request);
        assert!(!info.is_api());

        let info = parse(Method::GET, "/");
        assert!(!info.is_resource_request);
    }
}
