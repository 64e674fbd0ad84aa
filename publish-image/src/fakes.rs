//! In-memory stand-ins for the pipeline collaborators (testing only).

use std::{
    cell::{Cell, RefCell},
    collections::{HashMap, HashSet, VecDeque},
};

use time::{Duration, OffsetDateTime};

use crate::{
    broker::{CredentialBroker, CredentialLease, Identity},
    builder::{BuildArtifact, ImageBuilder},
    error::{AuthError, BuildError, PushError},
    image_ref::{ImageRef, Repository},
    registry::Registry,
    request::BuildRequest,
};

pub const REGISTRY: &str = "123456789012.dkr.ecr.eu-west-1.amazonaws.com";
pub const REPOSITORY: &str = "team/app";

pub fn repository() -> Repository {
    Repository::new(REGISTRY, REPOSITORY).unwrap()
}

/// A digest made of 64 copies of `fill`.
pub fn digest(fill: char) -> String {
    format!("sha256:{}", fill.to_string().repeat(64))
}

pub fn artifact(repository: &Repository, fill: char) -> BuildArtifact {
    let digest = digest(fill);
    BuildArtifact {
        image_ref: repository.digested(&digest).unwrap(),
        digest,
    }
}

pub fn lease_expiring_in(duration: Duration) -> CredentialLease {
    CredentialLease::new(
        "AWS",
        "token",
        OffsetDateTime::now_utc() + duration,
        REGISTRY,
    )
}

pub fn lease() -> CredentialLease {
    lease_expiring_in(Duration::hours(1))
}

pub fn identity() -> Identity {
    Identity {
        role: "arn:aws:iam::123456789012:role/publisher".to_owned(),
        region: "eu-west-1".to_owned(),
    }
}

pub fn request(version_label: &str) -> BuildRequest {
    BuildRequest::builder(REGISTRY, REPOSITORY, version_label)
        .build()
        .unwrap()
}

/// Hands out a fixed lease, or refuses every exchange.
pub struct StaticBroker {
    lease: Option<CredentialLease>,
    pub calls: Cell<usize>,
}

impl StaticBroker {
    pub fn granting(lease: CredentialLease) -> Self {
        Self {
            lease: Some(lease),
            calls: Cell::new(0),
        }
    }

    pub fn refusing() -> Self {
        Self {
            lease: None,
            calls: Cell::new(0),
        }
    }
}

impl CredentialBroker for StaticBroker {
    fn acquire(&self, _identity: &Identity) -> Result<CredentialLease, AuthError> {
        self.calls.set(self.calls.get() + 1);
        self.lease.clone().ok_or(AuthError::Malformed {
            what: "fake identity provider",
            reason: "trust policy mismatch".to_owned(),
        })
    }
}

/// Produces a new digest for every build, or fails.
#[derive(Default)]
pub struct SequenceBuilder {
    fills: RefCell<VecDeque<char>>,
    fail: bool,
    pub builds: Cell<usize>,
}

impl SequenceBuilder {
    pub fn producing(fills: &[char]) -> Self {
        Self {
            fills: RefCell::new(fills.iter().copied().collect()),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

impl ImageBuilder for SequenceBuilder {
    fn build(
        &self,
        request: &BuildRequest,
        _lease: &CredentialLease,
    ) -> Result<BuildArtifact, BuildError> {
        self.builds.set(self.builds.get() + 1);
        if self.fail {
            return Err(BuildError::Metadata {
                path: "metadata.json".into(),
                reason: "failed to solve: process \"make\" did not complete".to_owned(),
            });
        }
        let fill = self.fills.borrow_mut().pop_front().unwrap_or('f');
        Ok(artifact(request.repository(), fill))
    }
}

/// A registry that keeps tag to digest mappings in memory.
#[derive(Default)]
pub struct MemoryRegistry {
    tags: RefCell<HashMap<String, String>>,
    rejected: HashSet<String>,
    unauthorized_after: Option<usize>,
    pushes: Cell<usize>,
}

impl MemoryRegistry {
    pub fn rejecting(mut self, tag: &str) -> Self {
        self.rejected.insert(tag.to_owned());
        self
    }

    /// Every push after the first `count` fails as unauthorized.
    pub fn unauthorized_after(mut self, count: usize) -> Self {
        self.unauthorized_after = Some(count);
        self
    }

    pub fn digest_of(&self, reference: &str) -> Option<String> {
        self.tags.borrow().get(reference).cloned()
    }

    pub fn push_count(&self) -> usize {
        self.pushes.get()
    }
}

impl Registry for MemoryRegistry {
    fn push(
        &self,
        artifact: &BuildArtifact,
        target: &ImageRef,
        _lease: &CredentialLease,
    ) -> Result<(), PushError> {
        let attempt = self.pushes.get();
        self.pushes.set(attempt + 1);

        if self
            .unauthorized_after
            .is_some_and(|count| attempt >= count)
        {
            return Err(PushError::Auth("401 Unauthorized".to_owned()));
        }
        let tag = target
            .as_str()
            .rsplit_once(':')
            .map(|(_, tag)| tag)
            .unwrap_or_default();
        if self.rejected.contains(tag) {
            return Err(PushError::Rejected("tag is immutable".to_owned()));
        }

        self.tags
            .borrow_mut()
            .insert(target.to_string(), artifact.digest.clone());
        Ok(())
    }
}
