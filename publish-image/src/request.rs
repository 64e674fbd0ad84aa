use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};

use crate::{error::ValidationError, image_ref::Repository};

pub const DEFAULT_CONTEXT: &str = ".";
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";
pub const DEFAULT_CACHE_FROM: &str = "type=gha";
pub const DEFAULT_CACHE_TO: &str = "type=gha,mode=max";

/// A buildx cache backend selector, for example `type=gha,mode=max` or `type=registry,ref=...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig(String);

impl CacheConfig {
    /// Returns `None` for an empty selector, which disables the cache location.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let value = value.trim();
        (!value.is_empty()).then(|| Self(value.to_owned()))
    }

    fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .split(',')
            .filter_map(|attribute| attribute.split_once('='))
    }

    /// Returns the selector in its explicit `key=value` form. A bare reference such as
    /// `user/app:cache` is shorthand for a registry cache.
    pub fn expanded(&self) -> Cow<'_, str> {
        if self.0.contains('=') {
            Cow::Borrowed(&self.0)
        } else {
            Cow::Owned(format!("type=registry,ref={}", self.0))
        }
    }

    /// Returns the selector with `ignore-error=true` appended, unless the caller already decided.
    /// Cache exports are shared between concurrent runs and must never fail a build.
    pub fn best_effort(&self) -> Cow<'_, str> {
        if self.attributes().any(|(key, _)| key == "ignore-error") {
            self.expanded()
        } else {
            Cow::Owned(format!("{},ignore-error=true", self.expanded()))
        }
    }
}

/// Everything needed to build and publish one image. Immutable once built.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    source_context: PathBuf,
    dockerfile: PathBuf,
    target: Option<String>,
    build_args: Vec<(String, String)>,
    labels: Vec<(String, String)>,
    version_label: String,
    repository: Repository,
    cache_from: Option<CacheConfig>,
    cache_to: Option<CacheConfig>,
    builder: Option<String>,
}

impl BuildRequest {
    pub fn builder<'a>(
        registry: impl Into<Cow<'a, str>>,
        repository: impl Into<Cow<'a, str>>,
        version_label: impl Into<Cow<'a, str>>,
    ) -> BuildRequestBuilder<'a> {
        BuildRequestBuilder::new(registry.into(), repository.into(), version_label.into())
    }

    pub fn source_context(&self) -> &Path {
        &self.source_context
    }

    pub fn dockerfile(&self) -> &Path {
        &self.dockerfile
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn build_args(&self) -> &[(String, String)] {
        &self.build_args
    }

    pub fn labels(&self) -> &[(String, String)] {
        &self.labels
    }

    pub fn version_label(&self) -> &str {
        &self.version_label
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub fn cache_from(&self) -> Option<&CacheConfig> {
        self.cache_from.as_ref()
    }

    pub fn cache_to(&self) -> Option<&CacheConfig> {
        self.cache_to.as_ref()
    }

    pub fn builder_name(&self) -> Option<&str> {
        self.builder.as_deref()
    }
}

pub struct BuildRequestBuilder<'a> {
    registry: Cow<'a, str>,
    repository: Cow<'a, str>,
    version_label: Cow<'a, str>,
    source_context: PathBuf,
    dockerfile: PathBuf,
    target: Option<String>,
    build_args: Vec<(String, String)>,
    labels: Vec<(String, String)>,
    cache_from: Option<CacheConfig>,
    cache_to: Option<CacheConfig>,
    builder: Option<String>,
}

impl<'a> BuildRequestBuilder<'a> {
    fn new(registry: Cow<'a, str>, repository: Cow<'a, str>, version_label: Cow<'a, str>) -> Self {
        Self {
            registry,
            repository,
            version_label,
            source_context: PathBuf::from(DEFAULT_CONTEXT),
            dockerfile: PathBuf::from(DEFAULT_DOCKERFILE),
            target: None,
            build_args: Vec::new(),
            labels: Vec::new(),
            cache_from: CacheConfig::new(DEFAULT_CACHE_FROM),
            cache_to: CacheConfig::new(DEFAULT_CACHE_TO),
            builder: None,
        }
    }

    pub fn with_context(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_context = path.into();
        self
    }

    pub fn with_dockerfile(mut self, path: impl Into<PathBuf>) -> Self {
        self.dockerfile = path.into();
        self
    }

    /// An empty target means the last stage of the Dockerfile.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        let target = target.into();
        self.target = (!target.is_empty()).then_some(target);
        self
    }

    pub fn with_build_arg(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.build_args.push((key.into(), value.into()));
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }

    pub fn with_cache_from(mut self, cache: Option<CacheConfig>) -> Self {
        self.cache_from = cache;
        self
    }

    pub fn with_cache_to(mut self, cache: Option<CacheConfig>) -> Self {
        self.cache_to = cache;
        self
    }

    pub fn with_builder(mut self, builder: impl Into<String>) -> Self {
        let builder = builder.into();
        self.builder = (!builder.is_empty()).then_some(builder);
        self
    }

    pub fn build(self) -> Result<BuildRequest, ValidationError> {
        if self.registry.is_empty() {
            return Err(ValidationError::Missing("registry"));
        }
        if self.repository.is_empty() {
            return Err(ValidationError::Missing("repository"));
        }
        if self.version_label.is_empty() {
            return Err(ValidationError::Missing("version label"));
        }
        let repository = Repository::new(self.registry, self.repository)?;

        for (what, pairs) in [
            ("build argument", &self.build_args),
            ("label", &self.labels),
        ] {
            if let Some((key, value)) = pairs.iter().find(|(key, _)| key.trim().is_empty()) {
                return Err(ValidationError::KeyValue {
                    what,
                    value: format!("{key}={value}"),
                });
            }
        }

        if !self.source_context.is_dir() {
            return Err(ValidationError::ContextNotFound(self.source_context));
        }

        Ok(BuildRequest {
            source_context: self.source_context,
            dockerfile: self.dockerfile,
            target: self.target,
            build_args: self.build_args,
            labels: self.labels,
            version_label: self.version_label.into_owned(),
            repository,
            cache_from: self.cache_from,
            cache_to: self.cache_to,
            builder: self.builder,
        })
    }
}

/// Parses `KEY=VALUE`. The value may itself contain `=`.
pub fn parse_key_value(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!(
            "expected KEY=VALUE with a non-empty key, got {value:?}"
        )),
    }
}
