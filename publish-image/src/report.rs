use std::fmt;

use log::warn;

use crate::{
    builder::BuildArtifact,
    classify::TagSet,
    error::{PartialPublishError, PushError},
    image_ref::ImageRef,
    publisher::{PublishOutcome, TagOutcome},
};

/// Something that went wrong without failing the run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Warning {
    /// The version label is not a semantic version, so no major tag was published.
    MajorTagNotDerived { version_label: String },
    /// A convenience tag could not be published.
    TagPushFailed { tag: String, reason: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MajorTagNotDerived { version_label } => write!(
                f,
                "version label {version_label:?} is not a semantic version, no major tag was published"
            ),
            Warning::TagPushFailed { tag, reason } => {
                write!(f, "tag `{tag}` was not published: {reason}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PipelineResult {
    pub digest: String,
    /// The fully qualified reference of the canonical tag.
    pub image: ImageRef,
    pub major_tag: Option<String>,
    /// Every tag that now points at `digest`.
    pub tags: Vec<String>,
    pub warnings: Vec<Warning>,
}

/// Decides the outcome of a run. Only the canonical tag is mandatory; failures of `latest` and of
/// the major tag become warnings.
pub fn report(
    artifact: &BuildArtifact,
    tags: &TagSet,
    outcome: PublishOutcome,
) -> Result<PipelineResult, PartialPublishError> {
    let canonical = tags.canonical();
    let image = match outcome.get(canonical).map(|entry| &entry.result) {
        Some(Ok(image)) => image.clone(),
        Some(Err(reason)) => {
            let reason = reason.clone();
            return Err(PartialPublishError {
                tag: canonical.to_owned(),
                reason,
                outcome,
            });
        }
        None => {
            return Err(PartialPublishError {
                tag: canonical.to_owned(),
                reason: PushError::NotAttempted,
                outcome,
            })
        }
    };

    let mut warnings = Vec::new();
    if tags.major().is_none() {
        warnings.push(Warning::MajorTagNotDerived {
            version_label: canonical.to_owned(),
        });
    }
    for entry in &outcome {
        if let Some(error) = entry.error() {
            warnings.push(Warning::TagPushFailed {
                tag: entry.tag.clone(),
                reason: error.to_string(),
            });
        }
    }
    for warning in &warnings {
        warn!("{warning}");
    }

    let major_tag = tags
        .major()
        .filter(|major| outcome.get(major).is_some_and(TagOutcome::pushed))
        .map(str::to_owned);

    Ok(PipelineResult {
        digest: artifact.digest.clone(),
        image,
        major_tag,
        tags: outcome
            .iter()
            .filter(|entry| entry.pushed())
            .map(|entry| entry.tag.clone())
            .collect(),
        warnings,
    })
}
