use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use super::traits::{BoxError, KeyValueStore};
use crate::error::Error;
use crate::types::{BearerToken, IdentityClaims, Session};

/// Default slot holding the raw bearer token.
pub const TOKEN_KEY: &str = "xeno_token";
/// Default slot holding the JSON-serialized identity.
pub const IDENTITY_KEY: &str = "xeno_user";

/// Durable projection of the [`Session`] onto two key-value slots.
///
/// Never an authority of its own: written on every login, cleared on logout,
/// and read once at startup to seed the in-memory session.
pub struct SessionStore<K> {
    kv: K,
    token_key: String,
    identity_key: String,
}

impl<K: KeyValueStore> SessionStore<K> {
    /// Store using the default slot names (`xeno_token`, `xeno_user`).
    #[must_use]
    pub fn new(kv: K) -> Self {
        Self::with_keys(kv, TOKEN_KEY, IDENTITY_KEY)
    }

    #[must_use]
    pub fn with_keys(kv: K, token_key: impl Into<String>, identity_key: impl Into<String>) -> Self {
        Self {
            kv,
            token_key: token_key.into(),
            identity_key: identity_key.into(),
        }
    }

    /// Read the persisted session.
    ///
    /// An unreadable identity slot only drops the identity; an invalid token
    /// slot yields an empty session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the underlying store fails to read.
    pub fn load(&self) -> Result<Session, Error> {
        let Some(raw_token) = self.kv.get(&self.token_key).map_err(storage(&self.token_key))? else {
            return Ok(Session::empty());
        };

        let token = match BearerToken::try_from(raw_token) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring persisted token");
                return Ok(Session::empty());
            }
        };

        let identity = match self
            .kv
            .get(&self.identity_key)
            .map_err(storage(&self.identity_key))?
        {
            Some(json) => serde_json::from_str::<Option<IdentityClaims>>(&json).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Persisted identity is unreadable, dropping it");
                None
            }),
            None => None,
        };

        Ok(Session::authenticated(token, identity))
    }

    /// Persist `session`. An empty session clears both slots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if a slot cannot be written.
    pub fn save(&self, session: &Session) -> Result<(), Error> {
        let Some(token) = &session.token else {
            return self.clear();
        };

        self.kv
            .set(&self.token_key, token.as_str())
            .map_err(storage(&self.token_key))?;

        match &session.identity {
            Some(identity) => {
                let json = serde_json::to_string(identity)
                    .map_err(|e| Error::Storage(format!("{}: {e}", self.identity_key)))?;
                self.kv
                    .set(&self.identity_key, &json)
                    .map_err(storage(&self.identity_key))
            }
            // No stale identity from an earlier login may outlive this token.
            None => self
                .kv
                .remove(&self.identity_key)
                .map_err(storage(&self.identity_key)),
        }
    }

    /// Remove both slots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if a slot cannot be removed.
    pub fn clear(&self) -> Result<(), Error> {
        self.kv
            .remove(&self.token_key)
            .map_err(storage(&self.token_key))?;
        self.kv
            .remove(&self.identity_key)
            .map_err(storage(&self.identity_key))
    }

    /// The underlying key-value store.
    #[must_use]
    pub fn backend(&self) -> &K {
        &self.kv
    }
}

fn storage(key: &str) -> impl Fn(BoxError) -> Error + '_ {
    move |e| Error::Storage(format!("{key}: {e}"))
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
        let slots = self.slots.lock().map_err(|_| "memory store poisoned")?;
        Ok(slots.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BoxError> {
        let mut slots = self.slots.lock().map_err(|_| "memory store poisoned")?;
        slots.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), BoxError> {
        let mut slots = self.slots.lock().map_err(|_| "memory store poisoned")?;
        slots.remove(key);
        Ok(())
    }
}

/// File-backed store: one JSON document per application origin.
///
/// Each write replaces the document through a temp file and a rename, so a
/// reader never sees a half-written slot. Stores opened on the same path share
/// one lock within the process.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl FileStore {
    /// Store for `origin` inside `dir`. The directory is created on first write.
    ///
    /// The file name is the form-urlencoded origin, so distinct origins never
    /// share a file.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>, origin: &str) -> Self {
        let file_name: String = url::form_urlencoded::byte_serialize(origin.as_bytes()).collect();
        let path = dir.as_ref().join(format!("{file_name}.json"));
        Self {
            lock: path_lock(&path),
            path,
        }
    }

    /// Path of the backing document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<BTreeMap<String, String>, BoxError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_document(&self, document: &BTreeMap<String, String>) -> Result<(), BoxError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(document)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, String>) -> bool,
    ) -> Result<(), BoxError> {
        let _guard = self.lock.lock().map_err(|_| "file store poisoned")?;
        let mut document = self.read_document()?;
        if apply(&mut document) {
            self.write_document(&document)?;
        }
        Ok(())
    }
}

fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();
    let mut locks = LOCKS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    locks.entry(path.to_path_buf()).or_default().clone()
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
        let _guard = self.lock.lock().map_err(|_| "file store poisoned")?;
        Ok(self.read_document()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), BoxError> {
        self.update(|document| {
            document.insert(key.to_owned(), value.to_owned());
            true
        })
    }

    fn remove(&self, key: &str) -> Result<(), BoxError> {
        self.update(|document| document.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADA: &str = "header.eyJuYW1lIjoiQWRhIiwiZW1haWwiOiJhQGIuY29tIiwic3ViIjoiMTIzIn0.sig";

    fn ada_session() -> Session {
        Session::authenticated(
            ADA.parse().unwrap(),
            Some(IdentityClaims {
                name: Some("Ada".into()),
                email: Some("a@b.com".into()),
                subject: Some("123".into()),
            }),
        )
    }

    struct FailingStore;

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, BoxError> {
            Err("quota exceeded".into())
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), BoxError> {
            Err("quota exceeded".into())
        }

        fn remove(&self, _key: &str) -> Result<(), BoxError> {
            Err("quota exceeded".into())
        }
    }

    #[test]
    fn empty_store_loads_empty_session() {
        let store = SessionStore::new(MemoryStore::new());
        assert_eq!(store.load().unwrap(), Session::empty());
    }

    #[test]
    fn save_then_load() {
        let store = SessionStore::new(MemoryStore::new());
        store.save(&ada_session()).unwrap();
        assert_eq!(store.load().unwrap(), ada_session());
        assert_eq!(
            store.backend().get(IDENTITY_KEY).unwrap().as_deref(),
            Some(r#"{"name":"Ada","email":"a@b.com","subject":"123"}"#)
        );
    }

    #[test]
    fn unreadable_identity_keeps_token() {
        let kv = MemoryStore::new();
        kv.set(TOKEN_KEY, ADA).unwrap();
        kv.set(IDENTITY_KEY, "{not json").unwrap();
        let session = SessionStore::new(kv).load().unwrap();
        assert_eq!(session.token.unwrap().as_str(), ADA);
        assert_eq!(session.identity, None);
    }

    #[test]
    fn null_identity_is_absent() {
        let kv = MemoryStore::new();
        kv.set(TOKEN_KEY, ADA).unwrap();
        kv.set(IDENTITY_KEY, "null").unwrap();
        let session = SessionStore::new(kv).load().unwrap();
        assert!(session.is_authenticated());
        assert_eq!(session.identity, None);
    }

    #[test]
    fn legacy_identity_record_loads() {
        let kv = MemoryStore::new();
        kv.set(TOKEN_KEY, ADA).unwrap();
        kv.set(IDENTITY_KEY, r#"{"name":"Ada","id":"123"}"#).unwrap();
        let identity = SessionStore::new(kv).load().unwrap().identity.unwrap();
        assert_eq!(identity.subject.as_deref(), Some("123"));
    }

    #[test]
    fn invalid_persisted_token_loads_empty() {
        let kv = MemoryStore::new();
        kv.set(TOKEN_KEY, "").unwrap();
        assert_eq!(SessionStore::new(kv).load().unwrap(), Session::empty());
    }

    #[test]
    fn identity_without_token_is_not_a_session() {
        let kv = MemoryStore::new();
        kv.set(IDENTITY_KEY, r#"{"name":"Ada"}"#).unwrap();
        assert_eq!(SessionStore::new(kv).load().unwrap(), Session::empty());
    }

    #[test]
    fn save_without_identity_drops_stale_identity() {
        let store = SessionStore::new(MemoryStore::new());
        store.save(&ada_session()).unwrap();
        store
            .save(&Session::authenticated("a.b.c".parse().unwrap(), None))
            .unwrap();
        assert_eq!(store.backend().get(IDENTITY_KEY).unwrap(), None);
        assert_eq!(store.load().unwrap().identity, None);
    }

    #[test]
    fn clear_removes_both_slots() {
        let store = SessionStore::new(MemoryStore::new());
        store.save(&ada_session()).unwrap();
        store.clear().unwrap();
        assert_eq!(store.backend().get(TOKEN_KEY).unwrap(), None);
        assert_eq!(store.backend().get(IDENTITY_KEY).unwrap(), None);
    }

    #[test]
    fn custom_slot_names() {
        let store = SessionStore::with_keys(MemoryStore::new(), "t", "u");
        store.save(&ada_session()).unwrap();
        assert_eq!(store.backend().get("t").unwrap().as_deref(), Some(ADA));
        assert_eq!(store.backend().get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn backend_failure_is_storage_error() {
        let store = SessionStore::new(FailingStore);
        assert!(matches!(store.load(), Err(Error::Storage(_))));
        assert!(matches!(store.save(&ada_session()), Err(Error::Storage(_))));
        assert!(matches!(store.clear(), Err(Error::Storage(_))));
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(FileStore::new(dir.path(), "http://localhost:5173"));
        store.save(&ada_session()).unwrap();
        assert!(
            store
                .backend()
                .path()
                .ends_with("http%3A%2F%2Flocalhost%3A5173.json")
        );

        let reopened = SessionStore::new(FileStore::new(dir.path(), "http://localhost:5173"));
        assert_eq!(reopened.load().unwrap(), ada_session());
    }

    #[test]
    fn file_store_is_scoped_by_origin() {
        let dir = tempfile::tempdir().unwrap();
        SessionStore::new(FileStore::new(dir.path(), "http://localhost:5173"))
            .save(&ada_session())
            .unwrap();
        let other = SessionStore::new(FileStore::new(dir.path(), "https://evil.example"));
        assert_eq!(other.load().unwrap(), Session::empty());
    }

    #[test]
    fn file_names_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let dotted = FileStore::new(dir.path(), "http://a.b");
        let underscored = FileStore::new(dir.path(), "http://a_b");
        assert_ne!(dotted.path(), underscored.path());

        dotted.set(TOKEN_KEY, ADA).unwrap();
        assert_eq!(underscored.get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn stores_on_one_path_do_not_lose_writes() {
        let dir = tempfile::tempdir().unwrap();
        let first = Arc::new(FileStore::new(dir.path(), "http://localhost:5173"));
        let second = Arc::new(FileStore::new(dir.path(), "http://localhost:5173"));
        assert!(Arc::ptr_eq(&first.lock, &second.lock));

        let writers: Vec<_> = [(first.clone(), "a"), (second, "b")]
            .into_iter()
            .map(|(kv, prefix)| {
                std::thread::spawn(move || {
                    for i in 0..25 {
                        kv.set(&format!("{prefix}{i}"), "v").unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        for i in 0..25 {
            assert!(first.get(&format!("a{i}")).unwrap().is_some());
            assert!(first.get(&format!("b{i}")).unwrap().is_some());
        }
    }

    #[test]
    fn file_store_clear_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let kv = FileStore::new(dir.path().join("nested"), "app");
        assert_eq!(kv.get(TOKEN_KEY).unwrap(), None);
        kv.remove(TOKEN_KEY).unwrap();
        assert!(!kv.path().exists());

        kv.set(TOKEN_KEY, ADA).unwrap();
        assert_eq!(kv.get(TOKEN_KEY).unwrap().as_deref(), Some(ADA));
        kv.remove(TOKEN_KEY).unwrap();
        assert_eq!(kv.get(TOKEN_KEY).unwrap(), None);
    }
}
