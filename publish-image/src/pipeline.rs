use log::{info, warn};

use crate::{
    broker::{CredentialBroker, Identity},
    builder::ImageBuilder,
    classify::classify,
    error::Result,
    publisher::publish,
    registry::Registry,
    report::{report, PipelineResult},
    request::BuildRequest,
};

/// Runs classify, authenticate, build, publish and report for one request. Every stage must
/// succeed before the next one starts, except that individual tags may fail during publishing.
pub struct Pipeline<'a> {
    pub broker: &'a dyn CredentialBroker,
    pub builder: &'a dyn ImageBuilder,
    pub registry: &'a dyn Registry,
}

impl Pipeline<'_> {
    pub fn run(&self, request: &BuildRequest, identity: &Identity) -> Result<PipelineResult> {
        let repository = request.repository();
        let tags = classify(request.version_label());
        info!(
            "publishing {repository} as {tags}",
            tags = tags.tags().join(", ")
        );

        let lease = self.broker.acquire(identity)?;
        lease.require_valid()?;
        if lease.scope() != repository.registry() {
            warn!(
                "credential was issued for {scope}, not for {registry}",
                scope = lease.scope(),
                registry = repository.registry()
            );
        }
        info!(
            "credential for {scope} valid until {expiry}",
            scope = lease.scope(),
            expiry = lease.expiry()
        );

        let artifact = self.builder.build(request, &lease)?;
        info!("built {digest}", digest = artifact.digest);

        let outcome = publish(self.registry, &artifact, &tags, repository, &lease);
        Ok(report(&artifact, &tags, outcome)?)
    }
}
