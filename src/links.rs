//! Link builders for the Globus web app and endpoint HTTPS servers.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{GlobusError, Result};
use crate::models::Endpoint;

/// Globus web app file manager.
const FILE_MANAGER_URL: &str = "https://app.globus.org/file-manager";

/// Host part of a `tlsftp://host:port` server string.
static TLSFTP_SERVER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^tlsftp://([^:/]+)(?::\d+)?/?$").expect("Invalid tlsftp server regex")
});

/// Host part of an `https://host[:port]` server string.
static HTTPS_SERVER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://([^/]+?)(?::443)?/?$").expect("Invalid https server regex")
});

static UUID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("Invalid UUID regex")
});

/// Whether a string looks like an endpoint UUID rather than a display name.
pub fn is_uuid(value: &str) -> bool {
    UUID_REGEX.is_match(value.trim())
}

/// Absolute directory path as used for mkdir and ACL rules: `/<dir>/`.
pub fn dir_path(directory: &str) -> String {
    format!("/{}/", directory.trim_matches('/'))
}

/// Web app link to a folder on an endpoint.
///
/// # Examples
///
/// ```
/// use globus_share::links::folder_link;
///
/// let url = folder_link("2024-01", "ep-uuid");
/// assert_eq!(
///     url,
///     "https://app.globus.org/file-manager?&origin_id=ep-uuid&origin_path=/2024-01"
/// );
/// ```
pub fn folder_link(directory: &str, endpoint_id: &str) -> String {
    format!(
        "{}?&origin_id={}&origin_path=/{}",
        FILE_MANAGER_URL,
        endpoint_id,
        directory.trim_start_matches('/')
    )
}

/// Host serving files of an endpoint over HTTPS.
///
/// Uses `https_server` when the endpoint advertises one, otherwise derives
/// it from `tlsftp_server` (`tlsftp://host:443` becomes `host`).
pub fn https_host(endpoint: &Endpoint) -> Result<String> {
    if let Some(server) = endpoint.https_server.as_deref() {
        if let Some(captures) = HTTPS_SERVER_REGEX.captures(server.trim()) {
            if let Some(host) = captures.get(1) {
                return Ok(host.as_str().to_string());
            }
        }
    }

    if let Some(server) = endpoint.tlsftp_server.as_deref() {
        if let Some(captures) = TLSFTP_SERVER_REGEX.captures(server.trim()) {
            if let Some(host) = captures.get(1) {
                return Ok(host.as_str().to_string());
            }
        }
    }

    Err(GlobusError::NoHttpsServer(endpoint.id.clone()))
}

/// Direct HTTPS download link for a file: `https://<host>/<dir>/<file>`.
pub fn file_link(host: &str, directory: &str, file_name: &str) -> String {
    format!(
        "https://{}/{}/{}",
        host,
        directory.trim_matches('/'),
        file_name
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(tlsftp: Option<&str>, https: Option<&str>) -> Endpoint {
        Endpoint {
            id: "ep-uuid".to_string(),
            display_name: Some("beamline".to_string()),
            tlsftp_server: tlsftp.map(str::to_string),
            https_server: https.map(str::to_string),
        }
    }

    #[test]
    fn test_dir_path() {
        assert_eq!(dir_path("2024-01"), "/2024-01/");
        assert_eq!(dir_path("/2024-01/"), "/2024-01/");
        assert_eq!(dir_path("a/b"), "/a/b/");
    }

    #[test]
    fn test_folder_link() {
        assert_eq!(
            folder_link("2024-01/raw", "ep"),
            "https://app.globus.org/file-manager?&origin_id=ep&origin_path=/2024-01/raw"
        );
    }

    #[test]
    fn test_https_host_from_tlsftp() {
        let ep = endpoint(Some("tlsftp://g-abc123.data.globus.org:443"), None);
        assert_eq!(https_host(&ep).unwrap(), "g-abc123.data.globus.org");
    }

    #[test]
    fn test_https_host_prefers_https_server() {
        let ep = endpoint(
            Some("tlsftp://g-abc123.data.globus.org:443"),
            Some("https://g-def456.data.globus.org"),
        );
        assert_eq!(https_host(&ep).unwrap(), "g-def456.data.globus.org");
    }

    #[test]
    fn test_https_host_missing() {
        let ep = endpoint(None, None);
        assert!(matches!(https_host(&ep), Err(GlobusError::NoHttpsServer(_))));
    }

    #[test]
    fn test_is_uuid() {
        assert!(is_uuid("9c9d5b2a-3f1e-4a7b-8c2d-1e0f9a8b7c6d"));
        assert!(!is_uuid("my endpoint"));
        assert!(!is_uuid(""));
    }
}
