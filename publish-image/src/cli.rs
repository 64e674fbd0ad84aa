use std::path::{Path, PathBuf};

use clap::Parser;
use log::info;

use crate::{
    broker::{AwsCredentialBroker, Identity, DEFAULT_SESSION_DURATION_SECS, DEFAULT_SESSION_NAME},
    builder::DockerBuilder,
    output,
    pipeline::Pipeline,
    registry::DockerRegistry,
    request::{self, parse_key_value, BuildRequest, CacheConfig},
    Result,
};

/// Build a container image once and publish it under its version, major version and `latest` tags.
#[derive(Debug, Parser)]
#[command(version = crate::version::VERSION, about)]
pub struct Cli {
    /// The role to assume with the federated identity of the job.
    #[arg(long = "role", env = "PUBLISH_ROLE")]
    pub role: String,

    #[arg(long = "region", env = "PUBLISH_REGION")]
    pub region: String,

    /// The registry host, e.g. `123456789012.dkr.ecr.eu-west-1.amazonaws.com`.
    #[arg(long = "registry", env = "PUBLISH_REGISTRY")]
    pub registry: String,

    /// The repository within the registry, e.g. `team/app`.
    #[arg(long = "repository", env = "PUBLISH_REPOSITORY")]
    pub repository: String,

    /// Published verbatim as the canonical tag. A semantic version additionally yields a major tag.
    #[arg(long = "version-label", env = "PUBLISH_VERSION")]
    pub version_label: String,

    /// A build-time variable. May be repeated. The environment variable takes one per line.
    #[arg(
        long = "build-arg",
        env = "PUBLISH_BUILD_ARGS",
        value_delimiter = '\n',
        value_name = "KEY=VALUE",
        value_parser = parse_key_value
    )]
    pub build_args: Vec<(String, String)>,

    /// An image label in addition to `org.opencontainers.image.version`. May be repeated. The
    /// environment variable takes one per line.
    #[arg(
        long = "label",
        env = "PUBLISH_LABELS",
        value_delimiter = '\n',
        value_name = "KEY=VALUE",
        value_parser = parse_key_value
    )]
    pub labels: Vec<(String, String)>,

    /// The Dockerfile stage to build. Defaults to the last stage.
    #[arg(long = "target", env = "PUBLISH_TARGET")]
    pub target: Option<String>,

    #[arg(long = "context", env = "PUBLISH_CONTEXT", default_value = request::DEFAULT_CONTEXT)]
    pub context: PathBuf,

    /// Path to the Dockerfile, relative to the build context.
    #[arg(
        long = "file",
        env = "PUBLISH_DOCKERFILE",
        default_value = request::DEFAULT_DOCKERFILE
    )]
    pub file: PathBuf,

    /// Where to import build cache from. Pass an empty string to disable.
    #[arg(
        long = "cache-from",
        env = "PUBLISH_CACHE_FROM",
        default_value = request::DEFAULT_CACHE_FROM
    )]
    pub cache_from: String,

    /// Where to export build cache to. Export failures never fail the build. Pass an empty string
    /// to disable.
    #[arg(
        long = "cache-to",
        env = "PUBLISH_CACHE_TO",
        default_value = request::DEFAULT_CACHE_TO
    )]
    pub cache_to: String,

    /// The buildx builder instance to use.
    #[arg(long = "builder")]
    pub builder: Option<String>,

    #[arg(long = "role-session-name", default_value = DEFAULT_SESSION_NAME)]
    pub role_session_name: String,

    /// The lifetime of the role session in seconds.
    #[arg(
        long = "session-duration",
        default_value_t = DEFAULT_SESSION_DURATION_SECS,
        value_parser = clap::value_parser!(u32).range(900..=43200)
    )]
    pub session_duration: u32,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let identity = Identity {
            role: self.role.clone(),
            region: self.region.clone(),
        };
        let request = self.build_request()?;

        let broker = AwsCredentialBroker {
            session_name: self.role_session_name,
            session_duration_secs: self.session_duration,
            ..Default::default()
        };
        let registry = DockerRegistry {
            builder: self.builder,
        };
        let pipeline = Pipeline {
            broker: &broker,
            builder: &DockerBuilder,
            registry: &registry,
        };

        let result = pipeline.run(&request, &identity)?;
        info!(
            "published {image} ({digest})",
            image = result.image,
            digest = result.digest
        );

        if let Some(path) = std::env::var_os(output::GITHUB_OUTPUT) {
            output::append_step_outputs(Path::new(&path), &result)?;
        }
        output::print_json(&result)?;

        Ok(())
    }

    fn build_request(&self) -> Result<BuildRequest> {
        let mut builder = BuildRequest::builder(
            self.registry.as_str(),
            self.repository.as_str(),
            self.version_label.as_str(),
        )
        .with_context(&self.context)
        .with_dockerfile(&self.file)
        .with_cache_from(CacheConfig::new(self.cache_from.as_str()))
        .with_cache_to(CacheConfig::new(self.cache_to.as_str()));

        if let Some(target) = &self.target {
            builder = builder.with_target(target);
        }
        if let Some(name) = &self.builder {
            builder = builder.with_builder(name);
        }
        for (key, value) in &self.build_args {
            builder = builder.with_build_arg(key, value);
        }
        for (key, value) in &self.labels {
            builder = builder.with_label(key, value);
        }

        Ok(builder.build()?)
    }
}
