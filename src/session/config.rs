use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use super::channel::OriginPolicy;
use super::store::{IDENTITY_KEY, TOKEN_KEY};
use super::traits::WindowFeatures;
use crate::error::Error;

const DEFAULT_API_BASE: &str = "http://localhost:4000";
const DEFAULT_APP_ORIGIN: &str = "http://localhost:5173";

/// Console session configuration.
///
/// Required fields (`api_base`, `app_origin`) are constructor parameters; the
/// rest use defaults matching the web console and can be overridden with
/// `with_*` methods.
///
/// ```rust,ignore
/// let config = ConsoleConfig::new(
///     "https://crm-api.example.com".parse()?,
///     "https://crm.example.com".parse()?,
/// )
/// .with_origin_policy(OriginPolicy::allow_list(["https://crm-api.example.com"]));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ConsoleConfig {
    pub(crate) api_base: Url,
    pub(crate) app_origin: Url,
    pub(crate) oauth_path: String,
    pub(crate) popup_name: String,
    pub(crate) popup_features: WindowFeatures,
    pub(crate) login_path: String,
    pub(crate) home_path: String,
    pub(crate) token_key: String,
    pub(crate) identity_key: String,
    pub(crate) origin_policy: OriginPolicy,
    pub(crate) storage_dir: Option<PathBuf>,
    pub(crate) request_timeout: Duration,
}

impl ConsoleConfig {
    #[must_use]
    pub fn new(api_base: Url, app_origin: Url) -> Self {
        Self {
            api_base,
            app_origin,
            oauth_path: "/api/auth/google".into(),
            popup_name: "oauth".into(),
            popup_features: WindowFeatures {
                width: 600,
                height: 700,
            },
            login_path: "/login".into(),
            home_path: "/".into(),
            token_key: TOKEN_KEY.into(),
            identity_key: IDENTITY_KEY.into(),
            origin_policy: OriginPolicy::AnyOrigin,
            storage_dir: None,
            request_timeout: Duration::from_secs(15),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Optional env vars
    /// - `XENO_API_BASE`: backend base URL (falls back to `VITE_API_BASE`,
    ///   then `http://localhost:4000`)
    /// - `XENO_APP_ORIGIN`: origin of the console itself (default `http://localhost:5173`)
    /// - `XENO_ALLOWED_ORIGINS`: comma-separated origins allowed to post auth
    ///   messages; unset means any origin. The console's own origin is always
    ///   accepted so manual token entry keeps working.
    /// - `XENO_STORAGE_DIR`: directory for the file-backed session store
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a URL or an allowed origin is invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let api_base = lookup("XENO_API_BASE")
            .or_else(|| lookup("VITE_API_BASE"))
            .unwrap_or_else(|| DEFAULT_API_BASE.into());
        let api_base: Url = api_base
            .parse()
            .map_err(|e| Error::Config(format!("XENO_API_BASE: {e}")))?;

        let app_origin = lookup("XENO_APP_ORIGIN").unwrap_or_else(|| DEFAULT_APP_ORIGIN.into());
        let app_origin: Url = app_origin
            .parse()
            .map_err(|e| Error::Config(format!("XENO_APP_ORIGIN: {e}")))?;

        let mut config = Self::new(api_base, app_origin);

        if let Some(origins) = lookup("XENO_ALLOWED_ORIGINS") {
            let origins: Vec<&str> = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .collect();
            if origins.is_empty() {
                return Err(Error::Config(
                    "XENO_ALLOWED_ORIGINS is set but lists no origin".into(),
                ));
            }
            let policy = OriginPolicy::try_allow_list(origins).map_err(|entry| {
                Error::Config(format!(
                    "XENO_ALLOWED_ORIGINS: {entry:?} is not a scheme://host origin"
                ))
            })?;
            config = config.with_origin_policy(policy);
        }
        if let Some(dir) = lookup("XENO_STORAGE_DIR") {
            config = config.with_storage_dir(dir);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_oauth_path(mut self, path: impl Into<String>) -> Self {
        self.oauth_path = path.into();
        self
    }

    #[must_use]
    pub fn with_popup(mut self, name: impl Into<String>, features: WindowFeatures) -> Self {
        self.popup_name = name.into();
        self.popup_features = features;
        self
    }

    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    #[must_use]
    pub fn with_home_path(mut self, path: impl Into<String>) -> Self {
        self.home_path = path.into();
        self
    }

    #[must_use]
    pub fn with_storage_keys(
        mut self,
        token_key: impl Into<String>,
        identity_key: impl Into<String>,
    ) -> Self {
        self.token_key = token_key.into();
        self.identity_key = identity_key.into();
        self
    }

    #[must_use]
    pub fn with_origin_policy(mut self, policy: OriginPolicy) -> Self {
        self.origin_policy = policy;
        self
    }

    #[must_use]
    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Origin the console runs on, as `scheme://host[:port]`.
    #[must_use]
    pub fn app_origin(&self) -> String {
        self.app_origin.origin().ascii_serialization()
    }

    /// Root of the JSON API (`<api_base>/api`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the joined URL is invalid.
    pub fn api_root(&self) -> Result<Url, Error> {
        self.endpoint("/api")
    }

    /// Endpoint that starts the external OAuth exchange.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the joined URL is invalid.
    pub fn oauth_url(&self) -> Result<Url, Error> {
        self.endpoint(&self.oauth_path)
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let base = self.api_base.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
            .parse()
            .map_err(|e| Error::Config(format!("{path}: {e}")))
    }

    #[must_use]
    pub fn popup_name(&self) -> &str {
        &self.popup_name
    }

    #[must_use]
    pub fn popup_features(&self) -> &WindowFeatures {
        &self.popup_features
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    #[must_use]
    pub fn home_path(&self) -> &str {
        &self.home_path
    }

    #[must_use]
    pub fn token_key(&self) -> &str {
        &self.token_key
    }

    #[must_use]
    pub fn identity_key(&self) -> &str {
        &self.identity_key
    }

    #[must_use]
    pub fn origin_policy(&self) -> &OriginPolicy {
        &self.origin_policy
    }

    #[must_use]
    pub fn storage_dir(&self) -> Option<&Path> {
        self.storage_dir.as_deref()
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}
