// REST endpoint table and request construction
//
// Every call the engine makes is described by an `Endpoint` value. A
// `DaemonTarget` turns it into a fully addressed `ApiRequest` carrying the
// API key, optional basic-auth credentials and an optional per-request
// timeout. Keeping the request a plain value lets tests script responses
// per endpoint without a live server.

use std::fmt;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::error::Error;

/// HTTP method used by the daemon API. Only GET and POST are needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum Method {
    #[strum(serialize = "GET")]
    Get,
    #[strum(serialize = "POST")]
    Post,
}

/// One operation of the daemon's REST surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `GET /rest/system/config`
    Config,
    /// `GET /rest/system/status`
    Status,
    /// `GET /rest/system/connections`
    Connections,
    /// `GET /rest/system/error`
    Errors,
    /// `GET /rest/stats/folder`
    FolderStats,
    /// `GET /rest/stats/device`
    DeviceStats,
    /// `GET /rest/events?since=<id>` (long poll)
    Events { since: u64 },
    /// `POST /rest/system/pause?device=<id>`
    Pause { device: String },
    /// `POST /rest/system/resume?device=<id>`
    Resume { device: String },
    /// `POST /rest/db/scan?folder=<id>`
    Scan { folder: String },
    /// `POST /rest/system/restart`
    Restart,
    /// `POST /rest/system/shutdown`
    Shutdown,
    /// `GET /rest/system/log`
    Log,
    /// `GET /qr/?text=<value>` (not under `/rest/`)
    QrCode { text: String },
}

impl Endpoint {
    pub fn method(&self) -> Method {
        match self {
            Self::Pause { .. }
            | Self::Resume { .. }
            | Self::Scan { .. }
            | Self::Restart
            | Self::Shutdown => Method::Post,
            _ => Method::Get,
        }
    }

    /// Path relative to the REST root (or to the base path for non-REST
    /// endpoints).
    pub fn path(&self) -> &'static str {
        match self {
            Self::Config => "system/config",
            Self::Status => "system/status",
            Self::Connections => "system/connections",
            Self::Errors => "system/error",
            Self::FolderStats => "stats/folder",
            Self::DeviceStats => "stats/device",
            Self::Events { .. } => "events",
            Self::Pause { .. } => "system/pause",
            Self::Resume { .. } => "system/resume",
            Self::Scan { .. } => "db/scan",
            Self::Restart => "system/restart",
            Self::Shutdown => "system/shutdown",
            Self::Log => "system/log",
            Self::QrCode { .. } => "/qr/",
        }
    }

    /// Whether the path lives under `/rest/`.
    pub fn is_rest(&self) -> bool {
        !matches!(self, Self::QrCode { .. })
    }

    pub fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Events { since } => vec![("since", since.to_string())],
            Self::Pause { device } | Self::Resume { device } => vec![("device", device.clone())],
            Self::Scan { folder } => vec![("folder", folder.clone())],
            Self::QrCode { text } => vec![("text", text.clone())],
            _ => Vec::new(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}

/// Basic-auth credentials for daemons with GUI authentication enabled.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    pub user: String,
    pub password: SecretString,
}

/// A fully addressed request, ready for a [`Transport`](crate::Transport).
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub endpoint: Endpoint,
    pub url: Url,
    pub api_key: SecretString,
    pub credentials: Option<BasicAuth>,
    /// Overrides the client-wide timeout (used for the events long poll).
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn method(&self) -> Method {
        self.endpoint.method()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Where and how to reach one daemon.
#[derive(Debug, Clone)]
pub struct DaemonTarget {
    base_url: Url,
    api_key: SecretString,
    credentials: Option<BasicAuth>,
}

impl DaemonTarget {
    pub fn new(base_url: Url, api_key: SecretString) -> Self {
        Self {
            base_url,
            api_key,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Option<BasicAuth>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the URL for an endpoint.
    ///
    /// REST paths become `{base path}/rest/{path}`; non-REST paths are
    /// appended to the base path directly.
    pub fn url_for(&self, endpoint: &Endpoint) -> Result<Url, Error> {
        let base_path = self.base_url.path().trim_end_matches('/');
        let path = if endpoint.is_rest() {
            format!("{base_path}/rest/{}", endpoint.path())
        } else {
            format!("{base_path}{}", endpoint.path())
        };

        let mut url = self.base_url.join(&path)?;
        url.set_query(None);
        let query = endpoint.query();
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    pub fn request(&self, endpoint: Endpoint) -> Result<ApiRequest, Error> {
        let url = self.url_for(&endpoint)?;
        Ok(ApiRequest {
            endpoint,
            url,
            api_key: self.api_key.clone(),
            credentials: self.credentials.clone(),
            timeout: None,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn target(base: &str) -> DaemonTarget {
        DaemonTarget::new(Url::parse(base).unwrap(), SecretString::from("key"))
    }

    #[test]
    fn rest_paths_are_prefixed() {
        let url = target("http://127.0.0.1:8384")
            .url_for(&Endpoint::Config)
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8384/rest/system/config");
    }

    #[test]
    fn base_path_is_kept() {
        let url = target("https://host/syncthing/")
            .url_for(&Endpoint::Scan {
                folder: "a b".into(),
            })
            .unwrap();
        assert_eq!(url.path(), "/syncthing/rest/db/scan");
        assert_eq!(url.query(), Some("folder=a+b"));
    }

    #[test]
    fn qr_code_is_not_under_rest() {
        let url = target("http://localhost:8384")
            .url_for(&Endpoint::QrCode {
                text: "DEVICE-ID".into(),
            })
            .unwrap();
        assert_eq!(url.path(), "/qr/");
        assert_eq!(url.query(), Some("text=DEVICE-ID"));
    }

    #[test]
    fn events_carry_since() {
        let url = target("http://localhost:8384")
            .url_for(&Endpoint::Events { since: 42 })
            .unwrap();
        assert_eq!(url.query(), Some("since=42"));
    }

    #[test]
    fn commands_are_posts() {
        assert_eq!(Endpoint::Restart.method(), Method::Post);
        assert_eq!(
            Endpoint::Pause {
                device: "X".into()
            }
            .method(),
            Method::Post
        );
        assert_eq!(Endpoint::Log.method(), Method::Get);
        assert_eq!(Endpoint::Shutdown.to_string(), "POST system/shutdown");
    }
}
