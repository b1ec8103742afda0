#![doc = include_str!("../README.md")]

#[cfg(feature = "http")]
pub mod api;
pub mod error;
pub mod session;
pub mod token;
pub mod types;

// Re-exports for convenient access
#[cfg(feature = "http")]
pub use api::ApiClient;
pub use error::Error;
pub use session::{
    AuthChannel, ConsoleConfig, ConsoleSession, CredentialInjector, LoginInitiator, RouteGuard,
    SessionManager, SessionStore,
};
pub use token::{DecodeError, decode_identity};
pub use types::{BearerToken, IdentityClaims, Session};
