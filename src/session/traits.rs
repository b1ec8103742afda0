use std::sync::{Arc, Mutex};

use url::Url;

/// Boxed error returned by host-provided seams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Host-provided durable storage, scoped to the application origin.
///
/// Values are plain strings keyed by slot name. Each call is synchronous and
/// atomic for a single slot.
///
/// # Example
///
/// ```rust,ignore
/// impl KeyValueStore for LocalStorage {
///     fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
///         Ok(self.storage.get_item(key)?)
///     }
///     // ...
/// }
/// ```
pub trait KeyValueStore: Send + Sync + 'static {
    /// Read a slot. `Ok(None)` when the slot is empty.
    fn get(&self, key: &str) -> Result<Option<String>, BoxError>;

    /// Write a slot, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), BoxError>;

    /// Remove a slot. Removing an empty slot is not an error.
    fn remove(&self, key: &str) -> Result<(), BoxError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BoxError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), BoxError> {
        (**self).remove(key)
    }
}

/// How a navigation is carried out by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// Full document load that replaces the current history entry.
    Replace,
    /// Full document load that pushes a new history entry.
    Assign,
    /// In-app route change that replaces the current history entry.
    ClientReplace,
}

/// A navigation request issued by the session core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub path: String,
    pub kind: NavigationKind,
}

impl Navigation {
    #[must_use]
    pub fn replace(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: NavigationKind::Replace,
        }
    }

    #[must_use]
    pub fn assign(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: NavigationKind::Assign,
        }
    }

    #[must_use]
    pub fn client_replace(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: NavigationKind::ClientReplace,
        }
    }

    /// Whether the host must reload the whole document, discarding all
    /// in-memory view state.
    #[must_use]
    pub fn is_full_document(&self) -> bool {
        !matches!(self.kind, NavigationKind::ClientReplace)
    }
}

/// Host-provided navigation (document location and in-app router).
pub trait Navigator: Send + Sync + 'static {
    fn navigate(&self, navigation: Navigation);
}

/// Features of the second window opened for the OAuth exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowFeatures {
    pub width: u32,
    pub height: u32,
}

impl WindowFeatures {
    /// `width=600,height=700` form understood by browser hosts.
    #[must_use]
    pub fn to_feature_string(&self) -> String {
        format!("width={},height={}", self.width, self.height)
    }
}

/// Host-provided second-window opener.
pub trait WindowOpener: Send + Sync + 'static {
    /// Open `url` in a window named `name`.
    ///
    /// Returns `false` when the host refused to open it (popup blocked).
    fn open(&self, url: &Url, name: &str, features: &WindowFeatures) -> bool;
}

/// Navigator that records every request instead of acting on it.
///
/// For headless hosts and tests.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    history: Mutex<Vec<Navigation>>,
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All navigations requested so far, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<Navigation> {
        self.history
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn last(&self) -> Option<Navigation> {
        self.history().pop()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, navigation: Navigation) {
        self.history
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(navigation);
    }
}
