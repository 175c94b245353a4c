// ── Locating the daemon's self-signed certificate ──
//
// A daemon on this machine serving HTTPS uses a self-signed certificate
// stored in its config directory. When the connection goes to such a
// daemon the certificate is pinned on the transport; remote daemons are
// verified the usual way.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use tracing::debug;
use url::{Host, Url};

use synctray_api::PinnedCertificate;

use crate::error::CoreError;

const CERT_FILE: &str = "https-cert.pem";

/// Whether `url` addresses a daemon on this machine.
pub fn is_local(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
        Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
        None => false,
    }
}

/// Whether a certificate should be pinned for `url`.
pub fn expects_self_signed(url: &Url) -> bool {
    url.scheme() == "https" && is_local(url)
}

/// Where the certificate is looked up, in order: the daemon's reported
/// config directory, the platform default, the explicitly configured path.
pub fn locate_https_cert(explicit: Option<&Path>, config_dir: &str) -> Option<PathBuf> {
    if !config_dir.is_empty() {
        let candidate = Path::new(config_dir).join(CERT_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    default_config_dirs()
        .into_iter()
        .map(|dir| dir.join(CERT_FILE))
        .find(|candidate| candidate.is_file())
        .or_else(|| explicit.map(Path::to_path_buf))
}

/// Platform locations of the daemon's config directory.
fn default_config_dirs() -> Vec<PathBuf> {
    let Some(base) = BaseDirs::new() else {
        return Vec::new();
    };
    if cfg!(target_os = "macos") {
        vec![base.home_dir().join("Library/Application Support/Syncthing")]
    } else if cfg!(windows) {
        vec![base.data_local_dir().join("Syncthing")]
    } else {
        let mut dirs = vec![base.config_dir().join("syncthing")];
        if let Some(state) = base.state_dir() {
            dirs.push(state.join("syncthing"));
        }
        dirs
    }
}

/// Load the certificate to pin for `url`, or `None` when standard
/// verification applies.
pub fn pinned_for(
    url: &Url,
    explicit: Option<&Path>,
    config_dir: &str,
) -> Result<Option<PinnedCertificate>, CoreError> {
    if !expects_self_signed(url) {
        return Ok(None);
    }
    let path = locate_https_cert(explicit, config_dir).ok_or_else(|| CoreError::Certificate {
        message: format!("{CERT_FILE} not found in the daemon's config directory"),
    })?;
    debug!(path = %path.display(), "pinning daemon certificate");
    PinnedCertificate::load_pem(&path)
        .map(Some)
        .map_err(|e| CoreError::Certificate {
            message: format!("{}: {e}", path.display()),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn local_hosts() {
        assert!(is_local(&url("https://localhost:8384")));
        assert!(is_local(&url("https://127.0.0.1:8384")));
        assert!(is_local(&url("https://[::1]:8384")));
        assert!(!is_local(&url("https://nas.lan:8384")));
        assert!(!is_local(&url("https://192.168.1.10:8384")));
    }

    #[test]
    fn plain_http_needs_no_certificate() {
        let pinned = pinned_for(&url("http://127.0.0.1:8384"), None, "").unwrap();
        assert!(pinned.is_none());
        assert!(!expects_self_signed(&url("https://example.org")));
    }

    #[test]
    fn certificate_found_in_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join(CERT_FILE);
        std::fs::write(&cert, "placeholder").unwrap();

        let found = locate_https_cert(None, dir.path().to_str().unwrap());
        assert_eq!(found, Some(cert));
    }

    #[test]
    fn explicit_path_is_the_fallback() {
        let explicit = PathBuf::from("/etc/daemon/cert.pem");
        assert_eq!(
            locate_https_cert(Some(&explicit), "/nonexistent"),
            Some(explicit)
        );
    }

    #[test]
    fn unreadable_certificate_is_a_certificate_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CERT_FILE), "not a certificate").unwrap();
        let err = pinned_for(&url("https://127.0.0.1:8384"), None, dir.path().to_str().unwrap())
            .unwrap_err();
        assert!(matches!(err, CoreError::Certificate { .. }));
    }
}
