use std::sync::{Arc, PoisonError, RwLock};

use http::HeaderMap;
use http::header::{AUTHORIZATION, HeaderValue};

use crate::types::BearerToken;

/// Default headers shared by every request built through the API client.
///
/// Cloning shares the same map: the injector and the transport always agree
/// on the current credential.
#[derive(Debug, Clone, Default)]
pub struct CredentialInjector {
    headers: Arc<RwLock<HeaderMap>>,
}

impl CredentialInjector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a set of transport defaults (e.g. `Content-Type`).
    #[must_use]
    pub fn with_defaults(defaults: HeaderMap) -> Self {
        Self {
            headers: Arc::new(RwLock::new(defaults)),
        }
    }

    /// Set or remove `Authorization: Bearer <token>` for every later request.
    ///
    /// With `None` the header is removed entirely, never left empty.
    pub fn apply(&self, token: Option<&BearerToken>) {
        let mut headers = self.headers.write().unwrap_or_else(PoisonError::into_inner);
        match token.and_then(bearer_value) {
            Some(value) => {
                headers.insert(AUTHORIZATION, value);
            }
            None => {
                headers.remove(AUTHORIZATION);
            }
        }
    }

    /// Snapshot of the current default headers.
    #[must_use]
    pub fn headers(&self) -> HeaderMap {
        self.headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(AUTHORIZATION)
    }
}

fn bearer_value(token: &BearerToken) -> Option<HeaderValue> {
    // BearerToken only holds visible ASCII, so this cannot fail in practice.
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token.as_str())).ok()?;
    value.set_sensitive(true);
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;

    #[test]
    fn apply_sets_bearer_header() {
        let injector = CredentialInjector::new();
        injector.apply(Some(&"a.b.c".parse().unwrap()));
        let headers = injector.headers();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer a.b.c");
        assert!(headers.get(AUTHORIZATION).unwrap().is_sensitive());
    }

    #[test]
    fn apply_none_removes_header_entirely() {
        let injector = CredentialInjector::new();
        injector.apply(Some(&"a.b.c".parse().unwrap()));
        injector.apply(None);
        assert!(!injector.has_credential());
        assert!(injector.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn replacing_token_keeps_single_header() {
        let injector = CredentialInjector::new();
        injector.apply(Some(&"t1.p.s".parse().unwrap()));
        injector.apply(Some(&"t2.p.s".parse().unwrap()));
        let headers = injector.headers();
        assert_eq!(headers.get_all(AUTHORIZATION).iter().count(), 1);
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer t2.p.s");
    }

    #[test]
    fn clones_share_state_and_keep_defaults() {
        let mut defaults = HeaderMap::new();
        defaults.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let injector = CredentialInjector::with_defaults(defaults);
        let transport_view = injector.clone();

        injector.apply(Some(&"a.b.c".parse().unwrap()));
        assert!(transport_view.has_credential());

        injector.apply(None);
        let headers = transport_view.headers();
        assert!(!headers.contains_key(AUTHORIZATION));
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }
}
