use log::{info, warn};
use time::OffsetDateTime;

use crate::{
    broker::CredentialLease,
    builder::BuildArtifact,
    classify::TagSet,
    error::PushError,
    image_ref::{ImageRef, Repository},
    registry::Registry,
};

/// The result of publishing a single tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagOutcome {
    pub tag: String,
    /// The fully qualified reference on success.
    pub result: Result<ImageRef, PushError>,
}

impl TagOutcome {
    pub fn pushed(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&PushError> {
        self.result.as_ref().err()
    }
}

/// Per-tag results in publishing order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    entries: Vec<TagOutcome>,
}

impl PublishOutcome {
    fn record(&mut self, tag: &str, result: Result<ImageRef, PushError>) {
        self.entries.push(TagOutcome {
            tag: tag.to_owned(),
            result,
        });
    }

    pub fn get(&self, tag: &str) -> Option<&TagOutcome> {
        self.entries.iter().find(|entry| entry.tag == tag)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TagOutcome> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a PublishOutcome {
    type Item = &'a TagOutcome;
    type IntoIter = std::slice::Iter<'a, TagOutcome>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Pushes the artifact under every tag of the tag set. A failing tag does not stop the remaining
/// ones; whether the run as a whole failed is decided by [`crate::report::report`].
pub fn publish(
    registry: &dyn Registry,
    artifact: &BuildArtifact,
    tags: &TagSet,
    repository: &Repository,
    lease: &CredentialLease,
) -> PublishOutcome {
    publish_at(
        registry,
        artifact,
        tags,
        repository,
        lease,
        OffsetDateTime::now_utc,
    )
}

/// Like [`publish`], reading the current time from `now` before each push.
pub fn publish_at(
    registry: &dyn Registry,
    artifact: &BuildArtifact,
    tags: &TagSet,
    repository: &Repository,
    lease: &CredentialLease,
    now: impl Fn() -> OffsetDateTime,
) -> PublishOutcome {
    let mut outcome = PublishOutcome::default();

    for tag in tags.tags() {
        let result = push_tag(registry, artifact, tag, repository, lease, now());
        match &result {
            Ok(target) => info!("pushed {target} -> {digest}", digest = artifact.digest),
            Err(error) => warn!("failed to push tag `{tag}`: {error}"),
        }
        outcome.record(tag, result);
    }

    outcome
}

fn push_tag(
    registry: &dyn Registry,
    artifact: &BuildArtifact,
    tag: &str,
    repository: &Repository,
    lease: &CredentialLease,
    now: OffsetDateTime,
) -> Result<ImageRef, PushError> {
    let target = repository
        .tagged(tag)
        .map_err(PushError::InvalidReference)?;

    // No re-authentication, once the lease runs out every remaining tag fails.
    if lease.is_expired_at(now) {
        return Err(PushError::Auth(format!(
            "credential lease for {scope} expired at {expiry}",
            scope = lease.scope(),
            expiry = lease.expiry()
        )));
    }

    registry.push(artifact, &target, lease)?;
    Ok(target)
}
