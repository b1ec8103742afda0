//! Console authentication session lifecycle.
//!
//! One [`SessionManager`] owns the session. Everything else either feeds it
//! (the [`AuthChannel`], fed by the [`LoginInitiator`] and the OAuth completion
//! window) or projects it ([`SessionStore`], [`CredentialInjector`],
//! [`RouteGuard`]).
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use xeno_console_auth::session::{ConsoleConfig, ConsoleSession, CredentialInjector, file_store};
//!
//! // 1. Implement Navigator and WindowOpener for your host
//! // 2. Configure from environment
//! let config = ConsoleConfig::from_env()?;
//! let kv = file_store(&config).expect("XENO_STORAGE_DIR");
//!
//! // 3. Wire the components and start listening for auth messages
//! let console = ConsoleSession::new(&config, kv, CredentialInjector::new(), navigator, opener)?;
//! tokio::spawn(console.channel.run(console.manager.clone()));
//!
//! // 4. Gate views on every navigation
//! if console.guard.enforce(&console.manager.session(), "/customers", &*navigator) {
//!     render_customers();
//! }
//! ```

mod bootstrap;
mod channel;
mod config;
mod credentials;
mod guard;
mod login;
mod manager;
mod store;
mod traits;

pub use bootstrap::{ConsoleSession, file_store};
pub use channel::{
    AuthChannel, AuthMessage, ChannelMessage, Dispatch, MessagePort, OriginPolicy, auth_channel,
};
pub use config::ConsoleConfig;
pub use credentials::CredentialInjector;
pub use guard::{Access, RouteGuard};
pub use login::LoginInitiator;
pub use manager::SessionManager;
pub use store::{FileStore, IDENTITY_KEY, MemoryStore, SessionStore, TOKEN_KEY};
pub use traits::{
    BoxError, KeyValueStore, Navigation, NavigationKind, Navigator, RecordingNavigator,
    WindowFeatures, WindowOpener,
};
