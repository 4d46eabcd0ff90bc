//! Cluster objects that gate orchestrator progress after bootstrap.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of a Kubernetes object the orchestrator waits on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReadinessObject {
    pub namespace: String,
    pub name: String,
    pub kind: String,
    pub group: String,
}

impl ReadinessObject {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        kind: impl Into<String>,
        group: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            kind: kind.into(),
            group: group.into(),
        }
    }

    /// Deployment in the `apps` group.
    pub fn deployment(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(namespace, name, "Deployment", "apps")
    }
}

impl fmt::Display for ReadinessObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} ({}.{})",
            self.namespace, self.name, self.kind, self.group
        )
    }
}

/// Fixed, ordered set of readiness objects for one distribution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadinessCatalog {
    objects: Vec<ReadinessObject>,
}

impl ReadinessCatalog {
    pub fn new(objects: Vec<ReadinessObject>) -> Self {
        Self { objects }
    }

    /// Objects in the order they were declared.
    pub fn objects(&self) -> &[ReadinessObject] {
        &self.objects
    }
}
