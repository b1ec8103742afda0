use super::traits::{Navigation, Navigator};
use crate::types::Session;

/// Decision for a requested view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allow,
    /// Denied; go here instead. The denied URL is not kept in history.
    Redirect(Navigation),
}

impl Access {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Gate for protected console views.
///
/// Every view except the login view is protected; access only depends on
/// whether the session holds a token.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    login_path: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new("/login")
    }
}

impl RouteGuard {
    #[must_use]
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
        }
    }

    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Whether `path` is reachable without a session.
    #[must_use]
    pub fn is_public(&self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        path.trim_end_matches('/') == self.login_path.trim_end_matches('/')
    }

    /// Decide access to `view`.
    #[must_use]
    pub fn check(&self, session: &Session, view: &str) -> Access {
        if session.is_authenticated() || self.is_public(view) {
            Access::Allow
        } else {
            Access::Redirect(Navigation::client_replace(self.login_path.as_str()))
        }
    }

    /// Decide access to `view` and carry out the redirect when denied.
    ///
    /// Returns whether the view may render.
    pub fn enforce(&self, session: &Session, view: &str, navigator: &dyn Navigator) -> bool {
        match self.check(session, view) {
            Access::Allow => true,
            Access::Redirect(navigation) => {
                tracing::debug!(view = %view, "Protected view requested without a session");
                navigator.navigate(navigation);
                false
            }
        }
    }
}
