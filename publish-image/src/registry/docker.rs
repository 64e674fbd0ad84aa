use super::Registry;
use crate::{
    broker::CredentialLease, builder::BuildArtifact, docker::DockerSession, error::PushError,
    image_ref::ImageRef, process,
};

/// Creates tags with `docker buildx imagetools create`.
#[derive(Default)]
pub struct DockerRegistry {
    pub builder: Option<String>,
}

impl Registry for DockerRegistry {
    fn push(
        &self,
        artifact: &BuildArtifact,
        target: &ImageRef,
        lease: &CredentialLease,
    ) -> Result<(), PushError> {
        let registry = target
            .as_str()
            .split_once('/')
            .map(|(registry, _)| registry)
            .unwrap_or_default();
        let session = DockerSession::new(lease, registry)
            .map_err(|error| PushError::Rejected(format!("failed to prepare the push: {error}")))?;
        session
            .imagetools_create(self.builder.as_deref(), &artifact.image_ref, target)
            .map_err(classify_failure)
    }
}

fn classify_failure(error: process::Error) -> PushError {
    const AUTH_MARKERS: &[&str] = &[
        "unauthorized",
        "denied",
        "authentication required",
        "401",
        "403",
    ];

    let stderr = error.stderr().to_ascii_lowercase();
    if AUTH_MARKERS.iter().any(|marker| stderr.contains(marker)) {
        PushError::Auth(error.to_string())
    } else {
        PushError::Rejected(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroI32;

    use super::*;

    fn classified(stderr: &str) -> PushError {
        classify_failure(process::Error {
            command: process::command!("docker", "buildx", "imagetools", "create"),
            kind: process::ErrorKind::NonZeroExitStatus(NonZeroI32::new(1)),
            stderr: Some(stderr.to_owned()),
        })
    }

    #[test]
    fn authorization_failures_are_auth_errors() {
        assert!(matches!(
            classified("ERROR: failed to authorize: 401 Unauthorized"),
            PushError::Auth(_)
        ));
        assert!(matches!(
            classified("denied: User is not authorized to perform: ecr:PutImage"),
            PushError::Auth(_)
        ));
    }

    #[test]
    fn other_failures_are_rejections() {
        assert!(matches!(
            classified("tag invalid: the image tag already exists"),
            PushError::Rejected(_)
        ));
        assert!(matches!(
            classified("dial tcp: i/o timeout"),
            PushError::Rejected(_)
        ));
    }
}
