use std::{io, path::PathBuf};

use time::OffsetDateTime;

use crate::{image_ref::InvalidReference, process, publisher::PublishOutcome};

/// Malformed or missing input. The pipeline does not start.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required input `{0}`")]
    Missing(&'static str),

    #[error(transparent)]
    Reference(#[from] InvalidReference),

    #[error("invalid {what} {value:?}, expected KEY=VALUE with a non-empty key")]
    KeyValue { what: &'static str, value: String },

    #[error("build context {0:?} is not a directory")]
    ContextNotFound(PathBuf),
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("no federated identity token available, set AWS_WEB_IDENTITY_TOKEN_FILE or grant the job an OIDC token (ACTIONS_ID_TOKEN_REQUEST_URL and ACTIONS_ID_TOKEN_REQUEST_TOKEN)")]
    NoIdentityToken,

    #[error("failed to obtain a federated identity token: {0}")]
    IdentityToken(#[source] reqwest::Error),

    #[error("identity provider refused to let us assume role `{role}`: {source}")]
    AssumeRole {
        role: String,
        #[source]
        source: process::Error,
    },

    #[error("failed to obtain a registry authorization token: {0}")]
    RegistryToken(#[source] process::Error),

    #[error("unexpected response from {what}: {reason}")]
    Malformed { what: &'static str, reason: String },

    #[error("credential lease for {scope} expired at {expiry}")]
    Expired {
        scope: String,
        expiry: OffsetDateTime,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Dockerfile {dockerfile:?} not found inside build context {context:?}")]
    DockerfileNotFound {
        dockerfile: PathBuf,
        context: PathBuf,
    },

    #[error("the build engine failed: {0}")]
    Engine(#[source] process::Error),

    #[error("failed to read the digest from build metadata {path:?}: {reason}")]
    Metadata { path: PathBuf, reason: String },

    #[error(transparent)]
    Reference(#[from] InvalidReference),

    #[error("failed to prepare the build: {0}")]
    Io(#[from] io::Error),
}

/// Failure to publish a single tag. Recorded per tag, never fatal on its own.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushError {
    #[error("not authorized: {0}")]
    Auth(String),

    #[error(transparent)]
    InvalidReference(InvalidReference),

    #[error("registry rejected the push: {0}")]
    Rejected(String),

    #[error("the push was never attempted")]
    NotAttempted,
}

/// The canonical tag could not be published. Carries every per-tag outcome.
#[derive(Debug, thiserror::Error)]
#[error("canonical tag `{tag}` was not published: {reason}")]
pub struct PartialPublishError {
    pub tag: String,
    pub reason: PushError,
    pub outcome: PublishOutcome,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Dockerfile {dockerfile:?} not found inside build context {context:?}")]
    DockerfileNotFound {
        dockerfile: PathBuf,
        context: PathBuf,
    },

    #[error("build failed: {0}")]
    Build(BuildError),

    #[error(transparent)]
    PartialPublish(#[from] PartialPublishError),
}

impl From<BuildError> for Error {
    fn from(error: BuildError) -> Self {
        match error {
            BuildError::DockerfileNotFound {
                dockerfile,
                context,
            } => Error::DockerfileNotFound {
                dockerfile,
                context,
            },
            other => Error::Build(other),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
