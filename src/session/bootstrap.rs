use std::sync::Arc;

use super::channel::{AuthChannel, MessagePort, auth_channel};
use super::config::ConsoleConfig;
use super::credentials::CredentialInjector;
use super::guard::RouteGuard;
use super::login::LoginInitiator;
use super::manager::SessionManager;
use super::store::{FileStore, SessionStore};
use super::traits::{KeyValueStore, Navigator, WindowOpener};
use crate::error::Error;

/// Every session component, wired from one [`ConsoleConfig`].
///
/// The caller drives `channel` (spawn [`AuthChannel::run`] or call
/// [`AuthChannel::drain`] from its event loop) and hands `port` to whatever
/// bridges host messages in.
pub struct ConsoleSession<K> {
    pub manager: Arc<SessionManager<K>>,
    pub channel: AuthChannel,
    pub port: MessagePort,
    pub login: LoginInitiator,
    pub guard: RouteGuard,
}

impl<K: KeyValueStore> ConsoleSession<K> {
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the persisted session cannot be read, or
    /// [`Error::Config`] if the OAuth endpoint URL is invalid.
    pub fn new(
        config: &ConsoleConfig,
        kv: K,
        injector: CredentialInjector,
        navigator: Arc<dyn Navigator>,
        opener: Arc<dyn WindowOpener>,
    ) -> Result<Self, Error> {
        let store = SessionStore::with_keys(kv, config.token_key(), config.identity_key());
        let manager = SessionManager::new(store, injector, navigator)?
            .with_home_path(config.home_path());
        // Manual entry posts as the console itself.
        let policy = config.origin_policy().clone().including(&config.app_origin());
        let (port, channel) = auth_channel(policy);
        let login = LoginInitiator::new(config, opener, port.clone())?;

        Ok(Self {
            manager: Arc::new(manager),
            channel,
            port,
            login,
            guard: RouteGuard::new(config.login_path()),
        })
    }
}

/// File-backed store for the configured storage directory and app origin.
///
/// `None` when no storage directory is configured.
#[must_use]
pub fn file_store(config: &ConsoleConfig) -> Option<FileStore> {
    config
        .storage_dir()
        .map(|dir| FileStore::new(dir, &config.app_origin()))
}
