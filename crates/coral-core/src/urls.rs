//! URL helpers for public endpoint computation

use crate::{Error, Result};
use url::Url;

/// Join a path onto a root URL, tolerating missing/extra slashes on either side.
///
/// The root is expected to be an absolute URL; the result always reflects the
/// root's host and scheme.
pub fn absolute_url(root_url: &str, path: &str) -> Result<String> {
    let base = Url::parse(root_url)
        .map_err(|e| Error::config(format!("invalid root URL \"{root_url}\": {e}")))?;
    let joined = base
        .join(path.trim_start_matches('/'))
        .map_err(|e| Error::config(format!("cannot join \"{path}\" onto \"{root_url}\": {e}")))?;
    Ok(joined.to_string())
}

/// Normalize a root URL so it always carries a trailing slash.
pub fn normalize_root_url(root_url: &str) -> String {
    if root_url.ends_with('/') {
        root_url.to_string()
    } else {
        format!("{root_url}/")
    }
}
