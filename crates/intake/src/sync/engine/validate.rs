use chrono::{DateTime, Utc};

use crate::platform::{IngestError, ResourceType, Scope, SourceKind};

use super::super::types::PullSpec;

/// Check a spec against the client it will run on.
///
/// Returns the effective lower time bound.
pub(super) fn validate_spec(
    spec: &PullSpec,
    source: SourceKind,
    supported: &[ResourceType],
) -> Result<Option<DateTime<Utc>>, IngestError> {
    if spec.resource_types.is_empty() {
        return Err(IngestError::invalid_spec("no resource types requested"));
    }

    let scope_source = spec.scope.source_kind();
    if scope_source != source {
        return Err(IngestError::invalid_spec(format!(
            "a {scope_source} scope cannot be pulled from {source}"
        )));
    }

    let unsupported: Vec<String> = spec
        .resource_types
        .iter()
        .filter(|rt| !supported.contains(rt))
        .map(ToString::to_string)
        .collect();
    if !unsupported.is_empty() {
        return Err(IngestError::invalid_spec(format!(
            "{source} does not provide {}",
            unsupported.join(", ")
        )));
    }

    match &spec.scope {
        Scope::Owner { owner, repo } => {
            if owner.trim().is_empty() {
                return Err(IngestError::invalid_spec("owner is empty"));
            }
            if repo.as_deref().is_some_and(|r| r.trim().is_empty()) {
                return Err(IngestError::invalid_spec("repository name is empty"));
            }
        }
        Scope::Repositories { repos } if repos.is_empty() => {
            return Err(IngestError::invalid_spec("repository list is empty"));
        }
        Scope::Space { key: Some(key) } if key.trim().is_empty() => {
            return Err(IngestError::invalid_spec("space key is empty"));
        }
        _ => {}
    }

    spec.effective_since()
}
