mod docker;

use std::path::{Path, PathBuf};

pub use docker::*;

use crate::{
    broker::CredentialLease, error::BuildError, image_ref::ImageRef, request::BuildRequest,
};

/// The single image produced by a pipeline run. Every published tag is an alias of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifact {
    pub digest: String,
    /// Reference to the image by digest, e.g. `reg.io/app@sha256:...`.
    pub image_ref: ImageRef,
}

pub trait ImageBuilder {
    /// Performs exactly one build for the request.
    fn build(
        &self,
        request: &BuildRequest,
        lease: &CredentialLease,
    ) -> Result<BuildArtifact, BuildError>;
}

/// Resolves the Dockerfile of a request. A relative path is taken relative to the build context.
/// The file must exist and, once symlinks are resolved, lie inside the build context.
pub fn resolve_dockerfile(context: &Path, dockerfile: &Path) -> Result<PathBuf, BuildError> {
    let not_found = || BuildError::DockerfileNotFound {
        dockerfile: dockerfile.to_owned(),
        context: context.to_owned(),
    };

    let context = context.canonicalize().map_err(|_| not_found())?;
    let resolved = context
        .join(dockerfile)
        .canonicalize()
        .map_err(|_| not_found())?;

    if !resolved.starts_with(&context) || !resolved.is_file() {
        return Err(not_found());
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn dockerfile_is_resolved_inside_the_context() {
        let context = tempfile::tempdir().unwrap();
        fs::create_dir(context.path().join("docker")).unwrap();
        fs::write(context.path().join("Dockerfile"), "FROM scratch\n").unwrap();
        fs::write(
            context.path().join("docker/app.Dockerfile"),
            "FROM scratch\n",
        )
        .unwrap();

        let root = context.path().canonicalize().unwrap();
        assert_eq!(
            resolve_dockerfile(context.path(), Path::new("Dockerfile")).unwrap(),
            root.join("Dockerfile")
        );
        assert_eq!(
            resolve_dockerfile(context.path(), Path::new("docker/app.Dockerfile")).unwrap(),
            root.join("docker/app.Dockerfile")
        );
        assert_eq!(
            resolve_dockerfile(context.path(), &root.join("Dockerfile")).unwrap(),
            root.join("Dockerfile")
        );
    }

    #[test]
    fn missing_dockerfile_is_not_found() {
        let context = tempfile::tempdir().unwrap();
        assert!(matches!(
            resolve_dockerfile(context.path(), Path::new("Dockerfile")),
            Err(BuildError::DockerfileNotFound { .. })
        ));

        fs::create_dir(context.path().join("Dockerfile")).unwrap();
        assert!(matches!(
            resolve_dockerfile(context.path(), Path::new("Dockerfile")),
            Err(BuildError::DockerfileNotFound { .. })
        ));
    }

    #[test]
    fn dockerfile_outside_the_context_is_not_found() {
        let parent = tempfile::tempdir().unwrap();
        let context = parent.path().join("context");
        fs::create_dir(&context).unwrap();
        fs::write(parent.path().join("Dockerfile"), "FROM scratch\n").unwrap();

        assert!(matches!(
            resolve_dockerfile(&context, Path::new("../Dockerfile")),
            Err(BuildError::DockerfileNotFound { .. })
        ));
        assert!(matches!(
            resolve_dockerfile(&context, &parent.path().join("Dockerfile")),
            Err(BuildError::DockerfileNotFound { .. })
        ));
    }
}
