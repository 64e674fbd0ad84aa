use log::{debug, info};

use super::{resolve_dockerfile, BuildArtifact, ImageBuilder};
use crate::{
    broker::CredentialLease,
    docker::{BuildxArgs, DockerSession},
    error::BuildError,
    request::BuildRequest,
};

pub const VERSION_LABEL: &str = "org.opencontainers.image.version";

/// Builds with `docker buildx build` and pushes the result by digest, so that tags can later be
/// created without touching the build engine again.
pub struct DockerBuilder;

impl ImageBuilder for DockerBuilder {
    fn build(
        &self,
        request: &BuildRequest,
        lease: &CredentialLease,
    ) -> Result<BuildArtifact, BuildError> {
        let dockerfile = resolve_dockerfile(request.source_context(), request.dockerfile())?;
        let repository = request.repository();

        let labels: Vec<(String, String)> =
            std::iter::once((VERSION_LABEL.to_owned(), request.version_label().to_owned()))
                .chain(request.labels().iter().cloned())
                .collect();

        // A cache miss or a cache export failure only costs time, never the build.
        let cache_from = request.cache_from().map(|cache| cache.expanded());
        let cache_to = request.cache_to().map(|cache| cache.best_effort());

        info!(
            "building {context:?} with {dockerfile:?} for {repository}",
            context = request.source_context()
        );
        let session = DockerSession::new(lease, repository.registry())?;
        let digest = session.build_and_push_by_digest(BuildxArgs {
            context: request.source_context(),
            dockerfile: &dockerfile,
            repository,
            builder: request.builder_name(),
            target: request.target(),
            build_args: request.build_args(),
            labels: &labels,
            cache_from: cache_from.as_deref(),
            cache_to: cache_to.as_deref(),
        })?;

        let image_ref = repository.digested(&digest)?;
        debug!("built {image_ref}");
        Ok(BuildArtifact { digest, image_ref })
    }
}
