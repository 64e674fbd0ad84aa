use std::sync::LazyLock;

use regex::Regex;

pub const LATEST: &str = "latest";

/// The tags an image is published under. `latest` is always an implicit member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSet {
    canonical: String,
    major: Option<String>,
}

impl TagSet {
    /// The tag explicitly requested by the caller, equal to the version label.
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// The convenience tag derived from the major component of a semantic version label.
    pub fn major(&self) -> Option<&str> {
        self.major.as_deref()
    }

    /// Returns every tag in publishing order: `latest`, the canonical tag, then the major tag.
    /// Duplicates are collapsed.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = Vec::with_capacity(3);
        for tag in [Some(LATEST), Some(self.canonical()), self.major()]
            .into_iter()
            .flatten()
        {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tags
    }
}

/// Derives the tag set for a version label.
///
/// The label is used verbatim as the canonical tag. When it looks like `[v]MAJOR.MINOR.PATCH[-pre]`
/// the major tag is the optional `v` followed by the integer value of `MAJOR`, so `v1.2.3` yields
/// `v1` and `01.2.3` yields `1`. Major version `0` is not special-cased. Labels that do not match
/// simply have no major tag.
pub fn classify(version_label: &str) -> TagSet {
    static SEMVER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^(?P<v>v)?(?P<major>[0-9]+)\.[0-9]+\.[0-9]+(?:-\S+)?$").unwrap()
    });

    let major = SEMVER_REGEX.captures(version_label).map(|captures| {
        let prefix = captures.name("v").map(|m| m.as_str()).unwrap_or_default();
        let major = captures
            .name("major")
            .map(|m| m.as_str())
            .unwrap_or_default();
        format!("{prefix}{}", strip_leading_zeros(major))
    });

    TagSet {
        canonical: version_label.to_owned(),
        major,
    }
}

/// Renders a string of ASCII digits as its integer value without risking overflow.
fn strip_leading_zeros(digits: &str) -> &str {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0"
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(version_label: &str) -> Vec<String> {
        classify(version_label)
            .tags()
            .into_iter()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn semantic_versions_get_a_major_tag() {
        assert_eq!(tags("v1.2.3"), ["latest", "v1.2.3", "v1"]);
        assert_eq!(tags("v2.0.0"), ["latest", "v2.0.0", "v2"]);
        assert_eq!(tags("1.5.2"), ["latest", "1.5.2", "1"]);
        assert_eq!(tags("2.0.0"), ["latest", "2.0.0", "2"]);
        assert_eq!(tags("v1.2.3-rc1"), ["latest", "v1.2.3-rc1", "v1"]);
        assert_eq!(
            tags("v3.0.0-beta.1+build.5"),
            ["latest", "v3.0.0-beta.1+build.5", "v3"]
        );
    }

    #[test]
    fn other_labels_only_get_latest() {
        assert_eq!(tags("sha-abc123"), ["latest", "sha-abc123"]);
        assert_eq!(tags("main"), ["latest", "main"]);
        assert_eq!(tags("v1.2"), ["latest", "v1.2"]);
        assert_eq!(tags("V1.2.3"), ["latest", "V1.2.3"]);
        assert_eq!(tags("vv1.2.3"), ["latest", "vv1.2.3"]);
        assert_eq!(tags("1.2.3-"), ["latest", "1.2.3-"]);
        assert_eq!(tags("1.2.3-rc 1"), ["latest", "1.2.3-rc 1"]);
        assert_eq!(tags("1.2.3.4"), ["latest", "1.2.3.4"]);
        assert_eq!(classify("main").major(), None);
    }

    #[test]
    fn major_zero_still_gets_a_major_tag() {
        assert_eq!(classify("v0.9.1").major(), Some("v0"));
        assert_eq!(classify("0.1.0").major(), Some("0"));
    }

    #[test]
    fn leading_zeros_are_compared_by_value() {
        assert_eq!(classify("v01.2.3").major(), Some("v1"));
        assert_eq!(classify("007.0.1").major(), Some("7"));
        assert_eq!(classify("00.1.2").major(), Some("0"));
        assert_eq!(classify("v01.2.3").canonical(), "v01.2.3");
    }

    #[test]
    fn huge_major_components_do_not_overflow() {
        let label = "123456789012345678901234567890.0.0";
        assert_eq!(
            classify(label).major(),
            Some("123456789012345678901234567890")
        );
    }

    #[test]
    fn latest_label_is_not_duplicated() {
        assert_eq!(tags("latest"), ["latest"]);
        assert_eq!(classify("latest").canonical(), "latest");
    }

    #[test]
    fn unsafe_labels_are_passed_through() {
        assert_eq!(tags("feature/login"), ["latest", "feature/login"]);
        assert_eq!(tags("has space"), ["latest", "has space"]);
    }
}
