//! Reference audit stages.

use async_trait::async_trait;

use crate::audit::pipeline::StageValidator;
use crate::audit::types::{Severity, StageVerdict, Violation};
use crate::core::Artifact;

/// Adapts a synchronous closure into a stage.
pub struct FnValidator<F> {
    name: String,
    check: F,
}

impl<F> FnValidator<F>
where
    F: Fn(&Artifact) -> StageVerdict + Send + Sync,
{
    pub fn new(name: impl Into<String>, check: F) -> Self {
        Self {
            name: name.into(),
            check,
        }
    }
}

#[async_trait]
impl<F> StageValidator for FnValidator<F>
where
    F: Fn(&Artifact) -> StageVerdict + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn validate(&self, artifact: &Artifact) -> StageVerdict {
        (self.check)(artifact)
    }
}

/// Rejects artifacts with no content. Not retryable: auditing the same
/// empty artifact again cannot succeed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireContent;

#[async_trait]
impl StageValidator for RequireContent {
    fn name(&self) -> &str {
        "require-content"
    }

    async fn validate(&self, artifact: &Artifact) -> StageVerdict {
        if artifact.is_empty() {
            StageVerdict::fail(vec![Violation::new(
                Severity::Critical,
                format!("{} produced an empty artifact", artifact.produced_by),
            )
            .at(artifact.task_id.to_string())])
        } else {
            StageVerdict::pass()
        }
    }
}
