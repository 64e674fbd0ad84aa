use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
};

use base64::Engine;
use log::debug;

use crate::{
    broker::CredentialLease,
    error::BuildError,
    image_ref::{ImageRef, Repository},
    process,
    temp_path::TempDir,
};

/// Partial implementation of the docker client `config.json`.
/// See https://docs.docker.com/reference/cli/docker/#docker-cli-configuration-file-configjson-properties.
#[derive(serde::Serialize)]
struct ConfigFile<'a> {
    auths: BTreeMap<&'a str, AuthEntry>,
}

#[derive(serde::Serialize)]
struct AuthEntry {
    /// Base64 encoded `username:password`.
    auth: String,
}

/// Partial implementation of the JSON emitted by the `--metadata-file` option of `docker build`.
/// See https://docs.docker.com/reference/cli/docker/buildx/build/#metadata-file.
#[derive(serde::Deserialize)]
struct MetadataFile {
    #[serde(rename = "containerimage.digest")]
    containerimage_digest: String,
}

/// Docker invocations that authenticate with a single credential lease. The lease is written to a
/// private client configuration directory that is removed when the session is dropped, the user's
/// own docker login state is never read or modified.
pub struct DockerSession {
    config_dir: TempDir,
    buildx_config: Option<PathBuf>,
}

impl DockerSession {
    pub fn new(lease: &CredentialLease, registry: &str) -> io::Result<Self> {
        let config_dir = TempDir::new("publish-image-docker-")?;
        std::fs::write(
            config_dir.join("config.json"),
            serde_json::to_vec(&config_file(lease, registry))?,
        )?;
        Ok(Self {
            config_dir,
            buildx_config: buildx_config_dir(),
        })
    }

    fn docker(&self) -> process::Command {
        let command = process::Command::new("docker").env("DOCKER_CONFIG", self.config_dir.path());
        // Builders are stored next to the docker configuration, keep using the user's.
        match &self.buildx_config {
            Some(path) => command.env("BUILDX_CONFIG", path),
            None => command,
        }
    }

    /// Builds the image and pushes it to `args.repository` by digest only, without any tag.
    /// Returns the digest.
    pub fn build_and_push_by_digest(&self, args: BuildxArgs) -> Result<String, BuildError> {
        let metadata_path = self.config_dir.join("metadata.json");

        let mut command = process::args!(
            self.docker(),
            "buildx",
            "build",
            args.context,
            "--file",
            args.dockerfile,
            "--metadata-file",
            metadata_path,
        );
        if let Some(builder) = args.builder {
            command = process::args!(command, "--builder", builder);
        }
        if let Some(target) = args.target {
            command = process::args!(command, "--target", target);
        }
        for (key, value) in args.build_args {
            command = process::args!(command, "--build-arg", format!("{key}={value}"));
        }
        for (key, value) in args.labels {
            command = process::args!(command, "--label", format!("{key}={value}"));
        }
        if let Some(cache_from) = args.cache_from {
            command = process::args!(command, "--cache-from", cache_from);
        }
        if let Some(cache_to) = args.cache_to {
            command = process::args!(command, "--cache-to", cache_to);
        }
        command = process::args!(
            command,
            "--output",
            format!(
                "type=image,name={repository},push-by-digest=true,name-canonical=true,push=true",
                repository = args.repository
            ),
        );

        // Build progress goes straight to the terminal.
        command.status().map_err(BuildError::Engine)?;

        read_digest(&metadata_path)
    }

    /// Points `target` at the manifest referenced by `source` in the registry. Nothing is rebuilt
    /// or re-uploaded, an existing tag is overwritten.
    pub fn imagetools_create(
        &self,
        builder: Option<&str>,
        source: &ImageRef,
        target: &ImageRef,
    ) -> process::Result<()> {
        let mut command = process::args!(self.docker(), "buildx", "imagetools", "create");
        if let Some(builder) = builder {
            command = process::args!(command, "--builder", builder);
        }
        process::args!(command, "--tag", target, source).output()?;
        Ok(())
    }
}

pub struct BuildxArgs<'a> {
    pub context: &'a Path,
    pub dockerfile: &'a Path,
    pub repository: &'a Repository,
    pub builder: Option<&'a str>,
    pub target: Option<&'a str>,
    pub build_args: &'a [(String, String)],
    pub labels: &'a [(String, String)],
    pub cache_from: Option<&'a str>,
    pub cache_to: Option<&'a str>,
}

fn config_file<'a>(lease: &CredentialLease, registry: &'a str) -> ConfigFile<'a> {
    let auth = base64::engine::general_purpose::STANDARD.encode(format!(
        "{username}:{token}",
        username = lease.username(),
        token = lease.access_token()
    ));
    ConfigFile {
        auths: [(registry, AuthEntry { auth })].into_iter().collect(),
    }
}

/// Returns where buildx keeps its builder instances, following the lookup order of buildx.
fn buildx_config_dir() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("BUILDX_CONFIG") {
        return Some(path.into());
    }
    if let Some(path) = std::env::var_os("DOCKER_CONFIG") {
        return Some(PathBuf::from(path).join("buildx"));
    }
    home::home_dir().map(|home| home.join(".docker").join("buildx"))
}

fn read_digest(metadata_path: &Path) -> Result<String, BuildError> {
    let metadata_error = |reason: String| BuildError::Metadata {
        path: metadata_path.to_owned(),
        reason,
    };
    let metadata_string = std::fs::read_to_string(metadata_path)
        .map_err(|error| metadata_error(error.to_string()))?;
    let metadata: MetadataFile = serde_json::from_str(&metadata_string)
        .map_err(|error| metadata_error(error.to_string()))?;
    debug!("digest: {:?}", metadata.containerimage_digest);
    Ok(metadata.containerimage_digest)
}
