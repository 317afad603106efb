//! Repository identity: git url validation and stable uri derivation.
//!
//! A repository is addressed everywhere by its `uri`, which is derived from
//! the clone url as `{host}/{path-without-.git}`, e.g.
//! `https://github.com/elastic/kibana.git` → `github.com/elastic/kibana`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CoreError;

const ALLOWED_SCHEMES: &[&str] = &["http", "https", "git", "ssh"];

/// A git repository known to the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    /// Stable identity derived from the clone url.
    pub uri: String,
    /// Url the repository is cloned from.
    pub url: String,
    pub org: String,
    pub name: String,
    /// Commit the local checkout is at, once cloned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
}

impl Repository {
    /// Build a repository from its clone url, deriving the uri.
    pub fn from_url(url: &str) -> Result<Self, CoreError> {
        let parts = parse_git_url(url)?;
        let (org, name) = match parts.path.rsplit_once('/') {
            Some((org, name)) => (org.to_string(), name.to_string()),
            None => (String::new(), parts.path.clone()),
        };
        Ok(Self {
            uri: format!("{}/{}", parts.host, parts.path),
            url: url.trim().to_string(),
            org,
            name,
            revision: None,
        })
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }
}

/// Whether `url` looks like something `git clone` accepts and we can derive
/// a uri from.
pub fn is_valid_git_url(url: &str) -> bool {
    parse_git_url(url).is_ok()
}

/// Derive the repository uri for a clone url.
pub fn uri_from_url(url: &str) -> Result<String, CoreError> {
    Repository::from_url(url).map(|r| r.uri)
}

/// Reject uris that could escape the data directory when joined onto it.
pub fn validate_uri(uri: &str) -> Result<(), CoreError> {
    if uri.is_empty() || uri.starts_with('/') || uri.contains('\\') {
        return Err(CoreError::InvalidUri(uri.to_string()));
    }
    let bad_segment = uri
        .split('/')
        .any(|s| s.is_empty() || s == "." || s == "..");
    if bad_segment {
        return Err(CoreError::InvalidUri(uri.to_string()));
    }
    Ok(())
}

/// Location of a repository checkout below the data directory.
pub fn repository_path(data_path: &Path, uri: &str) -> Result<PathBuf, CoreError> {
    validate_uri(uri)?;
    Ok(uri.split('/').fold(data_path.to_path_buf(), |p, seg| p.join(seg)))
}

struct GitUrlParts {
    host: String,
    /// Path with surrounding slashes and the `.git` suffix removed.
    path: String,
}

fn parse_git_url(raw: &str) -> Result<GitUrlParts, CoreError> {
    let trimmed = raw.trim();
    let invalid = || CoreError::InvalidGitUrl(raw.to_string());

    let (host, path) = if trimmed.contains("://") {
        let url = Url::parse(trimmed).map_err(|_| invalid())?;
        if !ALLOWED_SCHEMES.contains(&url.scheme()) {
            return Err(invalid());
        }
        let host = url.host_str().ok_or_else(invalid)?.to_string();
        (host, url.path().to_string())
    } else {
        // scp-like syntax: user@host:org/name.git
        let (user_host, path) = trimmed.split_once(':').ok_or_else(invalid)?;
        let (_, host) = user_host.rsplit_once('@').ok_or_else(invalid)?;
        (host.to_string(), path.to_string())
    };

    if host.is_empty() || !host.chars().all(is_url_char) {
        return Err(invalid());
    }

    let path = path.trim_matches('/');
    let path = path.strip_suffix(".git").ok_or_else(invalid)?;
    let path = path.trim_matches('/');
    if path.is_empty() || !path.chars().all(is_url_char) {
        return Err(invalid());
    }
    validate_uri(path).map_err(|_| invalid())?;

    Ok(GitUrlParts {
        host: host.to_string(),
        path: path.to_string(),
    })
}

fn is_url_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '@' | ':' | '/' | '-' | '~')
}
