//! Resource paths
//!
//! Maps a namespace scope and an optional resource URI onto the REST path of
//! the configuration service.

use std::fmt;

/// API version prefix
const API_PREFIX: &str = "/v1";

/// Namespace a resource lives in
///
/// A service scope always carries its stage, and a stage scope its project.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Project {
        project: String,
    },
    Stage {
        project: String,
        stage: String,
    },
    Service {
        project: String,
        stage: String,
        service: String,
    },
}

impl Scope {
    pub fn project(project: &str) -> Self {
        Self::Project {
            project: project.to_string(),
        }
    }

    pub fn stage(project: &str, stage: &str) -> Self {
        Self::Stage {
            project: project.to_string(),
            stage: stage.to_string(),
        }
    }

    pub fn service(project: &str, stage: &str, service: &str) -> Self {
        Self::Service {
            project: project.to_string(),
            stage: stage.to_string(),
            service: service.to_string(),
        }
    }

    /// Build a scope from optional stage/service names
    ///
    /// Returns `None` when a service is given without a stage.
    pub fn from_parts(project: &str, stage: Option<&str>, service: Option<&str>) -> Option<Self> {
        match (stage, service) {
            (None, None) => Some(Self::project(project)),
            (Some(stage), None) => Some(Self::stage(project, stage)),
            (Some(stage), Some(service)) => Some(Self::service(project, stage, service)),
            (None, Some(_)) => None,
        }
    }

    pub fn project_name(&self) -> &str {
        match self {
            Self::Project { project } | Self::Stage { project, .. } | Self::Service { project, .. } => {
                project
            }
        }
    }

    /// Path of the scope's resource collection, without the API prefix
    fn collection_path(&self) -> String {
        match self {
            Self::Project { project } => format!("/project/{}/resource", encode(project)),
            Self::Stage { project, stage } => format!(
                "/project/{}/stage/{}/resource",
                encode(project),
                encode(stage)
            ),
            Self::Service {
                project,
                stage,
                service,
            } => format!(
                "/project/{}/stage/{}/service/{}/resource",
                encode(project),
                encode(stage),
                encode(service)
            ),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Project { project } => write!(f, "project {}", project),
            Self::Stage { project, stage } => write!(f, "project {} stage {}", project, stage),
            Self::Service {
                project,
                stage,
                service,
            } => write!(f, "project {} stage {} service {}", project, stage, service),
        }
    }
}

fn encode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// Build the REST path for a scope
///
/// Bulk operations pass `None` and address the collection; single-resource
/// operations pass the resource URI, which is percent-encoded as one segment.
pub fn resource_path(scope: &Scope, uri: Option<&str>) -> String {
    let collection = scope.collection_path();
    match uri {
        Some(uri) => format!("{}{}/{}", API_PREFIX, collection, encode(uri)),
        None => format!("{}{}", API_PREFIX, collection),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_single_resource() {
        assert_eq!(
            resource_path(&Scope::project("p"), Some("x")),
            "/v1/project/p/resource/x"
        );
    }

    #[test]
    fn test_service_bulk_has_no_trailing_segment() {
        assert_eq!(
            resource_path(&Scope::service("p", "s", "svc"), None),
            "/v1/project/p/stage/s/service/svc/resource"
        );
    }

    #[test]
    fn test_stage_paths() {
        let scope = Scope::stage("p", "s");
        assert_eq!(resource_path(&scope, None), "/v1/project/p/stage/s/resource");
        assert_eq!(
            resource_path(&scope, Some("values.yaml")),
            "/v1/project/p/stage/s/resource/values.yaml"
        );
    }

    #[test]
    fn test_uri_with_slash_is_one_segment() {
        assert_eq!(
            resource_path(&Scope::service("p", "s", "carts"), Some("helm/carts.tgz")),
            "/v1/project/p/stage/s/service/carts/resource/helm%2Fcarts.tgz"
        );
    }

    #[test]
    fn test_all_segments_encoded() {
        assert_eq!(
            resource_path(&Scope::service("my p", "st/1", "a b"), None),
            "/v1/project/my%20p/stage/st%2F1/service/a%20b/resource"
        );
    }

    #[test]
    fn test_from_parts() {
        assert_eq!(Scope::from_parts("p", None, None), Some(Scope::project("p")));
        assert_eq!(
            Scope::from_parts("p", Some("s"), Some("svc")),
            Some(Scope::service("p", "s", "svc"))
        );
        assert_eq!(Scope::from_parts("p", None, Some("svc")), None);
    }
}
