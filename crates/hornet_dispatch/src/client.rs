//! The HTTP dispatcher.

use crate::error::{Error, Result};
use crate::response::{parse_error_body, Outcome};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Conventional location of the TLS trust anchor.
pub const DEFAULT_CERTIFICATE_PATH: &str = "config/security/ca_sap_root_base64.crt";

/// Environment variable holding the basic-auth user.
pub const ENV_USERNAME: &str = "SAP_USERNAME";

/// Environment variable holding the basic-auth password.
pub const ENV_PASSWORD: &str = "SAP_PASSWORD";

/// Default per-request deadline.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Basic-auth credentials, immutable after construction.
#[derive(Debug, Clone)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates credentials from explicit values.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Reads credentials from `SAP_USERNAME` / `SAP_PASSWORD`.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing variable.
    pub fn from_env() -> Result<Self> {
        let username =
            std::env::var(ENV_USERNAME).map_err(|_| Error::MissingCredentials(ENV_USERNAME))?;
        let password =
            std::env::var(ENV_PASSWORD).map_err(|_| Error::MissingCredentials(ENV_PASSWORD))?;
        Ok(Self { username, password })
    }
}

/// Configuration for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// OData service root URL.
    pub service: String,
    /// Trust anchor path. The conventional location is used when unset.
    pub certificate_path: Option<PathBuf>,
    /// Per-request deadline; `None` disables the timeout entirely.
    pub timeout: Option<Duration>,
}

impl DispatcherConfig {
    /// Creates a config for the given service root with defaults.
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            certificate_path: None,
            timeout: Some(REQUEST_TIMEOUT),
        }
    }
}

/// Sending side of the fuzzer: anything that can GET a relative path.
///
/// The evolution driver is generic over this seam so tests can observe the
/// loop without a network.
pub trait Dispatch {
    /// Issues a GET for `path` relative to the service root.
    fn get(&self, path: &str) -> impl Future<Output = Result<Outcome>> + Send;
}

/// A dispatcher for sending HTTP requests to one OData service.
///
/// The inner `reqwest::Client` is safe to share across concurrent workers;
/// authentication state never changes after construction.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    service: String,
    http: reqwest::Client,
    credentials: Credentials,
}

fn normalize_service(service: &str) -> String {
    format!("{}/", service.trim_end_matches('/'))
}

fn load_certificate(path: &Path) -> Result<reqwest::Certificate> {
    let pem = std::fs::read(path).map_err(|e| Error::InvalidCertificate {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    reqwest::Certificate::from_pem(&pem).map_err(|e| Error::InvalidCertificate {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

impl Dispatcher {
    /// Creates a dispatcher for the configured service.
    ///
    /// When no trust anchor exists at the configured (or conventional) path,
    /// TLS verification is disabled so landscapes with private CAs stay
    /// reachable; a warning is logged because this weakens transport
    /// security.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate file exists but is unreadable or
    /// not PEM, or if the HTTP client cannot be built.
    pub fn new(config: &DispatcherConfig, credentials: Credentials) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let certificate_path = config
            .certificate_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CERTIFICATE_PATH));
        if certificate_path.is_file() {
            let certificate = load_certificate(&certificate_path)?;
            debug!("using trust anchor {}", certificate_path.display());
            builder = builder.add_root_certificate(certificate);
        } else {
            warn!(
                "no trust anchor at {}; TLS verification is disabled",
                certificate_path.display()
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder.build().map_err(Error::ClientBuild)?;
        Ok(Self {
            service: normalize_service(&config.service),
            http,
            credentials,
        })
    }

    /// The normalized service root, always ending with `/`.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Fetches `path` and returns the raw status and body.
    ///
    /// Used for the initial service probe and the `$metadata` fetch, where
    /// the caller needs the document rather than a classified outcome.
    ///
    /// # Errors
    ///
    /// Returns a transport error like [`Dispatch::get`] does.
    pub async fn get_raw(&self, path: &str) -> Result<(u16, String)> {
        let url = format!("{}{path}", self.service);
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await
            .map_err(|source| Error::Transport {
                method: "GET",
                url: url.clone(),
                source,
            })?;

        let status_code = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        debug!(status_code, bytes = body.len(), "GET {url}");
        Ok((status_code, body))
    }

    async fn send(&self, path: &str) -> Result<Outcome> {
        let url = format!("{}{path}", self.service);
        let started = Instant::now();

        let response = self
            .http
            .get(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .send()
            .await
            .map_err(|source| Error::Transport {
                method: "GET",
                url: url.clone(),
                source,
            })?;

        let elapsed = started.elapsed();
        let status_code = response.status().as_u16();
        debug!(status_code, ?elapsed, "GET {url}");

        let body = response.text().await.unwrap_or_default();
        let (error_code, error_message) = if status_code == 200 {
            (None, None)
        } else {
            parse_error_body(&body)
        };

        Ok(Outcome::new(status_code, elapsed).with_error_fields(error_code, error_message))
    }
}

impl Dispatch for Dispatcher {
    fn get(&self, path: &str) -> impl Future<Output = Result<Outcome>> + Send {
        self.send(path)
    }
}
