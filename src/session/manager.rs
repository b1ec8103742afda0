use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use super::credentials::CredentialInjector;
use super::store::SessionStore;
use super::traits::{KeyValueStore, Navigation, Navigator};
use crate::error::Error;
use crate::token::decode_identity;
use crate::types::{BearerToken, Session};

/// Owner of the authoritative [`Session`].
///
/// The manager is the only writer. [`SessionStore`] and [`CredentialInjector`]
/// are projections it updates on every transition; views read through
/// [`session()`](Self::session) or a [`subscribe()`](Self::subscribe) receiver.
///
/// ```rust,ignore
/// let manager = Arc::new(SessionManager::new(store, injector, navigator)?);
/// let (port, channel) = auth_channel(OriginPolicy::AnyOrigin);
/// tokio::spawn(channel.run(manager.clone()));
/// ```
pub struct SessionManager<K> {
    store: SessionStore<K>,
    injector: CredentialInjector,
    navigator: Arc<dyn Navigator>,
    session: watch::Sender<Session>,
    transition: Mutex<()>,
    home_path: String,
}

impl<K: KeyValueStore> SessionManager<K> {
    /// Seed the session from `store` and align the credential with it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the persisted session cannot be read.
    pub fn new(
        store: SessionStore<K>,
        injector: CredentialInjector,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, Error> {
        let initial = store.load()?;
        injector.apply(initial.token.as_ref());
        tracing::debug!(
            authenticated = initial.is_authenticated(),
            "Session restored from storage"
        );

        let (session, _) = watch::channel(initial);
        Ok(Self {
            store,
            injector,
            navigator,
            session,
            transition: Mutex::new(()),
            home_path: "/".into(),
        })
    }

    /// Override the default view navigated to after login and logout (default: `/`).
    #[must_use]
    pub fn with_home_path(mut self, path: impl Into<String>) -> Self {
        self.home_path = path.into();
        self
    }

    /// Become authenticated with `token`, replacing any current session.
    ///
    /// Identity is decoded best-effort; a decode failure only leaves it absent.
    /// Ends with a full-document navigation to the home view.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the session cannot be persisted. The
    /// in-memory session and credential are left untouched in that case.
    pub fn complete_login(&self, token: BearerToken) -> Result<(), Error> {
        let transition = self.transition.lock().unwrap_or_else(PoisonError::into_inner);

        let identity = match decode_identity(token.as_str()) {
            Ok(identity) => Some(identity),
            Err(e) => {
                tracing::debug!(error = %e, "Token claims unreadable, continuing without identity");
                None
            }
        };
        let session = Session::authenticated(token, identity);

        self.store.save(&session)?;
        self.injector.apply(session.token.as_ref());

        let subject = session
            .identity
            .as_ref()
            .and_then(|identity| identity.subject.clone());
        self.session.send_replace(session);
        tracing::info!(subject = ?subject, "Console login completed");
        drop(transition);

        self.navigator.navigate(Navigation::replace(self.home_path.as_str()));
        Ok(())
    }

    /// Drop the session everywhere and reload the public home view.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the persisted session cannot be removed.
    pub fn logout(&self) -> Result<(), Error> {
        let transition = self.transition.lock().unwrap_or_else(PoisonError::into_inner);

        self.store.clear()?;
        self.injector.apply(None);
        self.session.send_replace(Session::empty());
        tracing::info!("Console logout");
        drop(transition);

        self.navigator.navigate(Navigation::assign(self.home_path.as_str()));
        Ok(())
    }

    /// Current session snapshot.
    #[must_use]
    pub fn session(&self) -> Session {
        self.session.borrow().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.borrow().is_authenticated()
    }

    /// Read-only view that is notified on every transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    /// The credential injector this manager keeps in sync.
    #[must_use]
    pub fn injector(&self) -> &CredentialInjector {
        &self.injector
    }
}
