//! Container image references based on the grammar of
//! [reference.go](https://github.com/distribution/distribution/blob/v2.7.1/reference/reference.go):
//!
//! ```txt
//! reference        := name [ ":" tag ] [ "@" digest ]
//! name             := [domain '/'] path-component ['/' path-component]*
//! domain           := domain-component ['.' domain-component]* [':' port-number]
//! path-component   := alpha-numeric [separator alpha-numeric]*
//! tag              := /[\w][\w.-]{0,127}/
//! digest           := digest-algorithm ":" digest-hex
//! ```

use std::{fmt, sync::LazyLock};

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidReference {
    #[error("invalid registry {0:?}, expected a host name with an optional port")]
    Registry(String),
    #[error("invalid repository {0:?}, expected lowercase path components separated by `/`")]
    Repository(String),
    #[error("invalid tag {0:?}, expected up to 128 ASCII letters, digits, `_`, `.` or `-`, not starting with `.` or `-`")]
    Tag(String),
    #[error("invalid digest {0:?}, expected `<algorithm>:<hex>`")]
    Digest(String),
}

macro_rules! anchored_regex {
    ($name:ident, $pattern:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(concat!("^", $pattern, "$")).unwrap());
    };
}

anchored_regex!(
    REGISTRY_REGEX,
    r"[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]*[a-zA-Z0-9])?)*(?::[0-9]+)?"
);
anchored_regex!(
    REPOSITORY_REGEX,
    r"[a-z0-9]+(?:(?:[_.]|__|[-]*)[a-z0-9]+)*(?:/[a-z0-9]+(?:(?:[_.]|__|[-]*)[a-z0-9]+)*)*"
);
anchored_regex!(TAG_REGEX, r"[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}");
anchored_regex!(
    DIGEST_REGEX,
    r"[A-Za-z][A-Za-z0-9]*(?:[+._-][A-Za-z][A-Za-z0-9]*)*:[0-9a-fA-F]{32,}"
);

fn is_valid_tag(tag: &str) -> bool {
    TAG_REGEX.is_match(tag)
}

/// The `<registry>/<repository>` part of an image reference, validated on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    registry: String,
    path: String,
}

impl Repository {
    pub fn new(
        registry: impl Into<String>,
        path: impl Into<String>,
    ) -> Result<Self, InvalidReference> {
        let registry = registry.into();
        let path = path.into();
        if !REGISTRY_REGEX.is_match(&registry) {
            return Err(InvalidReference::Registry(registry));
        }
        if !REPOSITORY_REGEX.is_match(&path) {
            return Err(InvalidReference::Repository(path));
        }
        Ok(Self { registry, path })
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Returns `<registry>/<repository>:<tag>`.
    pub fn tagged(&self, tag: &str) -> Result<ImageRef, InvalidReference> {
        if !is_valid_tag(tag) {
            return Err(InvalidReference::Tag(tag.to_owned()));
        }
        Ok(ImageRef(format!("{self}:{tag}")))
    }

    /// Returns `<registry>/<repository>@<digest>`.
    pub fn digested(&self, digest: &str) -> Result<ImageRef, InvalidReference> {
        if !DIGEST_REGEX.is_match(digest) {
            return Err(InvalidReference::Digest(digest.to_owned()));
        }
        Ok(ImageRef(format!("{self}@{digest}")))
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.path)
    }
}

/// A fully qualified image reference, either by tag or by digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<std::ffi::OsStr> for ImageRef {
    fn as_ref(&self) -> &std::ffi::OsStr {
        self.0.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "sha256:01234567aaaaaaaa01234567aaaaaaaa01234567aaaaaaaa01234567aaaaaaaa";

    #[test]
    fn repository_validation_works() {
        let ecr = "123456789012.dkr.ecr.eu-west-1.amazonaws.com";
        assert!(Repository::new(ecr, "team/app").is_ok());
        assert!(Repository::new("localhost:5000", "app").is_ok());
        assert!(Repository::new("ghcr.io", "org-name/img_name").is_ok());

        assert_eq!(
            Repository::new("https://ghcr.io", "app").unwrap_err(),
            InvalidReference::Registry("https://ghcr.io".to_owned())
        );
        assert_eq!(
            Repository::new("ghcr.io", "Org/App").unwrap_err(),
            InvalidReference::Repository("Org/App".to_owned())
        );
        assert!(Repository::new("ghcr.io", "").is_err());
        assert!(Repository::new("ghcr.io", "app/").is_err());
    }

    #[test]
    fn tagged_reference_works() {
        let repository = Repository::new("reg.io:12345", "org-name/img-name").unwrap();
        assert_eq!(
            repository.tagged("v1.2.3-rc1").unwrap().as_str(),
            "reg.io:12345/org-name/img-name:v1.2.3-rc1"
        );
        assert_eq!(
            repository.tagged("feature/x").unwrap_err(),
            InvalidReference::Tag("feature/x".to_owned())
        );
        assert!(repository.tagged("has space").is_err());
        assert!(repository.tagged("-leading-dash").is_err());
        assert!(repository.tagged(&"a".repeat(129)).is_err());
        assert!(repository.tagged(&"a".repeat(128)).is_ok());
    }

    #[test]
    fn tags_are_ascii_only() {
        let repository = Repository::new("reg.io", "img").unwrap();
        assert_eq!(
            repository.tagged("版本-é").unwrap_err(),
            InvalidReference::Tag("版本-é".to_owned())
        );
        assert!(repository.tagged("v1-é").is_err());
        assert!(repository.tagged("Release_2.0").is_ok());
    }

    #[test]
    fn digested_reference_works() {
        let repository = Repository::new("reg.io", "img").unwrap();
        assert_eq!(
            repository.digested(DIGEST).unwrap().to_string(),
            format!("reg.io/img@{DIGEST}")
        );
        assert!(repository.digested("sha256:1234").is_err());
    }
}
