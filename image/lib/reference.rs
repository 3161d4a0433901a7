use std::{fmt, str::FromStr};

use getset::Getters;
use oci_spec::image::Digest;
use regex::Regex;

use crate::ImageError;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// The registry used when a reference doesn't name one explicitly.
pub const DEFAULT_REGISTRY: &str = "registry-1.docker.io";

/// The repository namespace prepended to single-segment repository names,
/// matching Docker Hub's `library/` convention.
pub const DEFAULT_REPOSITORY_NAMESPACE: &str = "library";

/// The tag used when a reference doesn't name one explicitly.
pub const DEFAULT_TAG: &str = "latest";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A parsed OCI image reference: registry, repository, and a selector that
/// is either a tag (with an optional pinned digest) or a bare digest.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
#[getset(get = "pub with_prefix")]
pub struct Reference {
    registry: String,
    repository: String,
    selector: ReferenceSelector,
}

/// The tag-or-digest part of a [`Reference`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceSelector {
    /// A tag, with an optional digest pinning the exact content expected
    /// at that tag.
    Tag {
        /// The image tag.
        tag: String,
        /// The optional pinned digest.
        digest: Option<Digest>,
    },
    /// A bare digest, with no tag.
    Digest(Digest),
}

impl ReferenceSelector {
    /// The digest this selector names, if any.
    pub fn digest(&self) -> Option<&Digest> {
        match self {
            ReferenceSelector::Tag { digest, .. } => digest.as_ref(),
            ReferenceSelector::Digest(digest) => Some(digest),
        }
    }

    /// The tag this selector names, if any.
    pub fn tag(&self) -> Option<&str> {
        match self {
            ReferenceSelector::Tag { tag, .. } => Some(tag),
            ReferenceSelector::Digest(_) => None,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl FromStr for Reference {
    type Err = ImageError;

    /// Parses strings of the form `[registry/]repository[:tag][@digest]`.
    ///
    /// A registry segment is recognized by containing a `.`, a `:`, or
    /// being `localhost`; otherwise the whole string is a repository path
    /// and [`DEFAULT_REGISTRY`] is assumed. A missing tag defaults to
    /// [`DEFAULT_TAG`]; a single-segment repository is namespaced under
    /// [`DEFAULT_REPOSITORY_NAMESPACE`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ImageError::InvalidReference("input string is empty".into()));
        }

        if let Some(at_idx) = s.find('@') {
            let digest_part = &s[at_idx + 1..];
            if !digest_part.contains(':') {
                return Err(ImageError::InvalidReference(format!(
                    "invalid digest: {digest_part}"
                )));
            }
            let digest = digest_part
                .parse::<Digest>()
                .map_err(|e| ImageError::InvalidReference(format!("invalid digest: {e}")))?;

            let (registry, remainder) = split_registry(&s[..at_idx]);
            let (repository, tag) = split_repository_and_tag(remainder)?;

            validate_registry(&registry)?;
            validate_repository(&repository)?;
            validate_tag(&tag)?;

            Ok(Reference {
                registry,
                repository,
                selector: ReferenceSelector::Tag {
                    tag,
                    digest: Some(digest),
                },
            })
        } else {
            let (registry, remainder) = split_registry(s);
            let (repository, tag) = split_repository_and_tag(remainder)?;

            validate_registry(&registry)?;
            validate_repository(&repository)?;
            validate_tag(&tag)?;

            Ok(Reference {
                registry,
                repository,
                selector: ReferenceSelector::Tag { tag, digest: None },
            })
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)?;
        match &self.selector {
            ReferenceSelector::Tag {
                tag,
                digest: Some(d),
            } => write!(f, ":{tag}@{d}"),
            ReferenceSelector::Tag { tag, digest: None } => write!(f, ":{tag}"),
            ReferenceSelector::Digest(d) => write!(f, "@{d}"),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

fn validate_registry(registry: &str) -> Result<(), ImageError> {
    let re = Regex::new(r"^[a-zA-Z0-9.-]+(:[0-9]+)?$").unwrap();
    if re.is_match(registry) {
        Ok(())
    } else {
        Err(ImageError::InvalidReference(format!(
            "invalid registry: {registry}"
        )))
    }
}

fn validate_repository(repository: &str) -> Result<(), ImageError> {
    let re = Regex::new(r"^([a-z0-9]+(?:[._-][a-z0-9]+)*)(/[a-z0-9]+(?:[._-][a-z0-9]+)*)*$")
        .unwrap();
    if re.is_match(repository) {
        Ok(())
    } else {
        Err(ImageError::InvalidReference(format!(
            "invalid repository: {repository}"
        )))
    }
}

fn validate_tag(tag: &str) -> Result<(), ImageError> {
    let re = Regex::new(r"^\w[\w.-]{0,127}$").unwrap();
    if re.is_match(tag) {
        Ok(())
    } else {
        Err(ImageError::InvalidReference(format!("invalid tag: {tag}")))
    }
}

fn split_registry(reference: &str) -> (String, &str) {
    let segments: Vec<&str> = reference.splitn(2, '/').collect();
    if segments.len() > 1
        && (segments[0].contains('.') || segments[0].contains(':') || segments[0] == "localhost")
    {
        (segments[0].to_string(), segments[1])
    } else {
        (DEFAULT_REGISTRY.to_string(), reference)
    }
}

fn split_repository_and_tag(path: &str) -> Result<(String, String), ImageError> {
    if let Some(idx) = path.rfind(':') {
        let repo_part = &path[..idx];
        let tag_part = &path[idx + 1..];
        if repo_part.is_empty() {
            return Err(ImageError::InvalidReference("repository is empty".into()));
        }
        Ok((namespaced(repo_part), tag_part.to_string()))
    } else {
        Ok((namespaced(path), DEFAULT_TAG.to_string()))
    }
}

fn namespaced(repository: &str) -> String {
    if repository.contains('/') {
        repository.to_string()
    } else {
        format!("{DEFAULT_REPOSITORY_NAMESPACE}/{repository}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_registry_repository_and_tag() {
        let reference: Reference = "docker.io/library/alpine:3.12".parse().unwrap();
        assert_eq!(reference.get_registry(), "docker.io");
        assert_eq!(reference.get_repository(), "library/alpine");
        assert_eq!(reference.get_selector().tag(), Some("3.12"));
        assert_eq!(reference.to_string(), "docker.io/library/alpine:3.12");
    }

    #[test]
    fn defaults_registry_namespace_and_tag() {
        let reference: Reference = "alpine".parse().unwrap();
        assert_eq!(reference.get_registry(), DEFAULT_REGISTRY);
        assert_eq!(reference.get_repository(), "library/alpine");
        assert_eq!(reference.get_selector().tag(), Some(DEFAULT_TAG));
    }

    #[test]
    fn parses_digest_only_reference() {
        let digest = "sha256:deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef";
        let s = format!("registry.example.com/myrepo@{digest}");
        let reference: Reference = s.parse().unwrap();
        assert_eq!(reference.get_registry(), "registry.example.com");
        assert_eq!(reference.get_selector().tag(), Some(DEFAULT_TAG));
        assert_eq!(reference.get_selector().digest().unwrap().to_string(), digest);
    }

    #[test]
    fn rejects_empty_input() {
        let err = "".parse::<Reference>().unwrap_err();
        assert!(err.to_string().contains("input string is empty"));
    }

    #[test]
    fn rejects_invalid_tag() {
        let err = "docker.io/library/alpine:t!ag".parse::<Reference>().unwrap_err();
        assert!(err.to_string().contains("invalid tag"));
    }

    #[test]
    fn registry_with_port_is_recognized() {
        let reference: Reference = "registry.example.com:5000/myrepo:1.0".parse().unwrap();
        assert_eq!(reference.get_registry(), "registry.example.com:5000");
        assert_eq!(reference.get_repository(), "library/myrepo");
    }
}
