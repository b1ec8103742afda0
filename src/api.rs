use http::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::Error;
use crate::session::{ConsoleConfig, CredentialInjector};

/// Shared HTTP client for the console's JSON API.
///
/// Every request picks up the [`CredentialInjector`]'s headers at build time,
/// so it carries exactly the credential of the current session.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    root: Url,
    injector: CredentialInjector,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the API root URL is invalid, or
    /// [`Error::Http`] if the HTTP client cannot be built.
    pub fn new(config: &ConsoleConfig, injector: CredentialInjector) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http,
            root: config.api_root()?,
            injector,
        })
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Root all request paths are resolved against (`<api_base>/api`).
    #[must_use]
    pub fn root(&self) -> &Url {
        &self.root
    }

    /// Start a request to `path` under the API root.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!(
            "{}/{}",
            self.root.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        self.http
            .request(method, url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .headers(self.injector.headers())
    }

    /// `GET` `path` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network or decode failure, or
    /// [`Error::Api`] if the backend answers with a non-success status.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let response = self.request(Method::GET, path).send().await?;
        let response = Self::ensure_success(response, path).await?;
        response.json::<T>().await.map_err(Into::into)
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        path: &str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let detail = response.text().await.unwrap_or_default();
        tracing::warn!(path = %path, status, "API request failed");
        Err(Error::Api {
            path: path.to_string(),
            status,
            detail,
        })
    }
}

#[cfg(test)]
mod tests {
    use http::header::AUTHORIZATION;

    use super::*;

    fn client(injector: CredentialInjector) -> ApiClient {
        let config = ConsoleConfig::new(
            "http://localhost:4000/".parse().unwrap(),
            "http://localhost:5173".parse().unwrap(),
        );
        ApiClient::new(&config, injector).unwrap()
    }

    #[test]
    fn requests_resolve_under_api_root() {
        let api = client(CredentialInjector::new());
        let request = api.request(Method::GET, "/customers/42").build().unwrap();
        assert_eq!(request.url().as_str(), "http://localhost:4000/api/customers/42");
        assert_eq!(
            request.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn requests_follow_the_current_credential() {
        let injector = CredentialInjector::new();
        let api = client(injector.clone());

        let anonymous = api.request(Method::GET, "orders").build().unwrap();
        assert!(anonymous.headers().get(AUTHORIZATION).is_none());

        injector.apply(Some(&"a.b.c".parse().unwrap()));
        let signed = api.request(Method::POST, "orders").build().unwrap();
        assert_eq!(signed.headers().get(AUTHORIZATION).unwrap(), "Bearer a.b.c");

        injector.apply(None);
        let after_logout = api.request(Method::GET, "orders").build().unwrap();
        assert!(after_logout.headers().get(AUTHORIZATION).is_none());
    }
}
