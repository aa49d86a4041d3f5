//! URL trimming for log output.
//!
//! Query strings routinely carry tokens and paging cursors, so only the
//! `api-version` parameter survives.

use std::sync::LazyLock;

use url::Url;

/// Query parameter kept when trimming.
pub const API_VERSION_PARAM: &str = "api-version";

/// Base used to parse origin-form targets such as `/api/users/1`.
static PLACEHOLDER_BASE: LazyLock<Option<Url>> = LazyLock::new(|| Url::parse("http://placeholder.invalid/").ok());

/// A request target in parsed form.
pub(crate) enum Target {
    Absolute(Url),
    /// Origin-form path, resolved against a placeholder host.
    Origin(Url),
}

impl Target {
    pub(crate) fn parse(raw: &str) -> Option<Self> {
        if let Ok(url) = Url::parse(raw) {
            if url.cannot_be_a_base() {
                return None;
            }
            return Some(Target::Absolute(url));
        }
        if raw.starts_with('/') {
            let url = PLACEHOLDER_BASE.as_ref()?.join(raw).ok()?;
            return Some(Target::Origin(url));
        }
        None
    }

    pub(crate) fn url(&self) -> &Url {
        match self {
            Target::Absolute(url) | Target::Origin(url) => url,
        }
    }

    pub(crate) fn trimmed(&self) -> String {
        match self {
            Target::Absolute(url) => trim_parsed(url),
            Target::Origin(url) => trim_path_and_query(url),
        }
    }
}

/// `scheme://host/path`, plus `?api-version=..` when present.
///
/// Unparseable input is returned unchanged.
pub fn trim_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => trim_parsed(&url),
        Err(_) => raw.to_string(),
    }
}

/// Like [`trim_url`], but origin-form targets (`/path?query`) are reduced
/// to their path and `api-version`.
pub fn trim_target(raw: &str) -> String {
    match Target::parse(raw) {
        Some(target) => target.trimmed(),
        None => raw.to_string(),
    }
}

/// Trim an already parsed absolute URL.
pub fn trim_parsed(url: &Url) -> String {
    format!(
        "{}://{}{}",
        url.scheme(),
        url.host_str().unwrap_or_default(),
        trim_path_and_query(url)
    )
}

/// Path plus the retained `api-version` parameter, without scheme or host.
pub fn trim_path_and_query(url: &Url) -> String {
    let mut trimmed = url.path().to_string();
    let api_version = url
        .query_pairs()
        .find(|(key, _)| key == API_VERSION_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty());
    if let Some(version) = api_version {
        trimmed.push('?');
        trimmed.push_str(API_VERSION_PARAM);
        trimmed.push('=');
        trimmed.push_str(&version);
    }
    trimmed
}
