mod docker;

pub use docker::*;

use crate::{
    broker::CredentialLease, builder::BuildArtifact, error::PushError, image_ref::ImageRef,
};

pub trait Registry {
    /// Makes `target` point at the artifact. An existing tag is overwritten.
    fn push(
        &self,
        artifact: &BuildArtifact,
        target: &ImageRef,
        lease: &CredentialLease,
    ) -> Result<(), PushError>;
}
