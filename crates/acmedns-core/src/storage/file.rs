// # File Credential Store
//
// File-based implementation of CredentialStore.
//
// ## Load Semantics
//
// - File absent: empty store (expected on the first run)
// - File present but unreadable: configuration error
// - File empty: empty store
// - File non-empty but not a JSON object of accounts: corruption error,
//   and nothing is written so the data stays available to the operator
//
// ## Atomic Writes
//
// `save()` writes the full mapping to `<path>.tmp` (created 0600 on unix),
// syncs it and renames it over `<path>`. Readers observe either the old file
// or the new one, never a truncated mix.
//
// ## File Format
//
// ```json
// {
//   "example.com": {
//     "username": "eabcdb41-d89f-4580-826f-3e62e9755ef2",
//     "password": "pbAXVjlIOE01xbut7YnAbkhMQIkcwoHO0ek2j4Q0",
//     "subdomain": "d420c923-bbd7-4056-ab64-c3ca54c9b3cf",
//     "fulldomain": "d420c923-bbd7-4056-ab64-c3ca54c9b3cf.auth.example.org"
//   }
// }
// ```

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::Error;
use crate::account::{Account, normalize_domain};
use crate::traits::credential_store::CredentialStore;

/// Permission bits for the storage file and its temporary sibling
#[cfg(unix)]
const STORAGE_FILE_MODE: u32 = 0o600;

/// File-based credential store
///
/// The whole mapping is loaded once by [`FileCredentialStore::load`] and
/// rewritten in full by [`CredentialStore::save`].
///
/// # Example
///
/// ```rust,no_run
/// use acmedns_core::storage::FileCredentialStore;
/// use acmedns_core::traits::CredentialStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileCredentialStore::load("/etc/letsencrypt/acmedns.json").await?;
///
///     if let Some(account) = store.fetch("example.com").await? {
///         println!("delegated to {}", account.fulldomain);
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    accounts: RwLock<BTreeMap<String, Account>>,
}

impl FileCredentialStore {
    /// Load the store from `path`
    ///
    /// # Errors
    ///
    /// - `Error::Config`: the path exists but cannot be read
    /// - `Error::StorageCorrupt`: the content is non-empty and does not parse
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let accounts = Self::read_accounts(&path).await?;

        tracing::debug!(
            "Loaded credential store {}: {} account(s)",
            path.display(),
            accounts.len()
        );

        Ok(Self {
            path,
            accounts: RwLock::new(accounts),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_accounts(path: &Path) -> Result<BTreeMap<String, Account>, Error> {
        let content = match fs::read(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("Storage file does not exist: {}", path.display());
                return Ok(BTreeMap::new());
            }
            Err(e) => {
                return Err(Error::config(format!(
                    "Storage file {} exists but cannot be read: {}",
                    path.display(),
                    e
                )));
            }
        };

        if content.is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_slice(&content).map_err(|e| {
            Error::storage_corrupt(format!("{}: {}", path.display(), e))
        })
    }

    /// Temporary sibling used for atomic replacement
    fn temp_path(&self) -> Result<PathBuf, Error> {
        let file_name = self.path.file_name().ok_or_else(|| {
            Error::config(format!(
                "Storage path {} does not name a file",
                self.path.display()
            ))
        })?;

        let mut temp_name = file_name.to_os_string();
        temp_name.push(".tmp");
        Ok(self.path.with_file_name(temp_name))
    }

    /// Write `json` to `temp_path` with owner-only permissions, synced to disk
    async fn write_temp(temp_path: &Path, json: &[u8]) -> std::io::Result<()> {
        // A stale temp file would keep its old permissions; start fresh.
        match fs::remove_file(temp_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(STORAGE_FILE_MODE);

        let mut file = options.open(temp_path).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(
                temp_path,
                std::fs::Permissions::from_mode(STORAGE_FILE_MODE),
            )
            .await?;
        }

        file.write_all(json).await?;
        file.flush().await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn fetch(&self, domain: &str) -> Result<Option<Account>, Error> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(normalize_domain(domain)).cloned())
    }

    async fn put(&self, domain: &str, account: Account) -> Result<(), Error> {
        let mut accounts = self.accounts.write().await;
        accounts.insert(normalize_domain(domain).to_string(), account);
        Ok(())
    }

    async fn save(&self) -> Result<(), Error> {
        let json = {
            let accounts = self.accounts.read().await;
            serde_json::to_vec_pretty(&*accounts)
                .map_err(|e| Error::state_store(format!("Failed to serialize accounts: {}", e)))?
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::state_store(format!(
                    "Could not create storage directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let temp_path = self.temp_path()?;

        if let Err(e) = Self::write_temp(&temp_path, &json).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(Error::state_store(format!(
                "Could not write storage file {}: {}",
                temp_path.display(),
                e
            )));
        }

        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(Error::state_store(format!(
                "Could not write storage file {}: {}",
                self.path.display(),
                e
            )));
        }

        tracing::debug!("Credential store written: {}", self.path.display());
        Ok(())
    }

    async fn domains(&self) -> Result<Vec<String>, Error> {
        let accounts = self.accounts.read().await;
        Ok(accounts.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn account(sub: &str) -> Account {
        Account {
            username: format!("user-{}", sub),
            password: format!("pass-{}", sub),
            subdomain: sub.to_string(),
            fulldomain: format!("{}.auth.example.net", sub),
            allowfrom: Vec::new(),
            extra: Default::default(),
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("acmedns.json");

        let store = FileCredentialStore::load(&path).await.unwrap();
        assert!(store.domains().await.unwrap().is_empty());
        assert!(store.fetch("example.com").await.unwrap().is_none());

        // Loading must not create the file
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_empty_file_is_empty_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("acmedns.json");
        fs::write(&path, b"").await.unwrap();

        let store = FileCredentialStore::load(&path).await.unwrap();
        assert!(store.domains().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("acmedns.json");
        fs::write(&path, b"corrupted json data").await.unwrap();

        let err = FileCredentialStore::load(&path).await.unwrap_err();
        assert!(matches!(err, Error::StorageCorrupt(_)), "got {:?}", err);

        // The corrupt file is left as it was
        let content = fs::read(&path).await.unwrap();
        assert_eq!(content, b"corrupted json data");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("acmedns.json");
        fs::write(&path, [0xff, 0xfe, 0x7b]).await.unwrap();

        let err = FileCredentialStore::load(&path).await.unwrap_err();
        assert!(matches!(err, Error::StorageCorrupt(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_whitespace_only_is_corrupt() {
        // Only a zero-length file counts as an empty store
        let dir = tempdir().unwrap();
        let path = dir.path().join("acmedns.json");
        fs::write(&path, b"  \n").await.unwrap();

        let err = FileCredentialStore::load(&path).await.unwrap_err();
        assert!(matches!(err, Error::StorageCorrupt(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_unknown_keys_survive_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("acmedns.json");
        fs::write(
            &path,
            br#"{"example.com": {"username": "u", "password": "p", "subdomain": "s",
                "fulldomain": "s.auth.example.org", "server_url": "https://auth.example.org"}}"#,
        )
        .await
        .unwrap();

        let store = FileCredentialStore::load(&path).await.unwrap();
        store.save().await.unwrap();

        let content = fs::read(&path).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&content).unwrap();
        assert_eq!(value["example.com"]["server_url"], "https://auth.example.org");
        assert_eq!(value["example.com"]["fulldomain"], "s.auth.example.org");
    }

    #[tokio::test]
    async fn test_wrong_shape_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("acmedns.json");

        fs::write(&path, b"[1, 2, 3]").await.unwrap();
        assert!(matches!(
            FileCredentialStore::load(&path).await,
            Err(Error::StorageCorrupt(_))
        ));

        fs::write(&path, br#"{"example.com": {"username": "u"}}"#)
            .await
            .unwrap();
        assert!(matches!(
            FileCredentialStore::load(&path).await,
            Err(Error::StorageCorrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_unreadable_path_is_config_error() {
        let dir = tempdir().unwrap();
        // A directory exists at the path but cannot be read as a file
        let path = dir.path().join("acmedns.json");
        fs::create_dir(&path).await.unwrap();

        let err = FileCredentialStore::load(&path).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("acmedns.json");

        let store = FileCredentialStore::load(&path).await.unwrap();
        store.put("example.com", account("a")).await.unwrap();
        let mut restricted = account("b");
        restricted.allowfrom = vec!["192.168.10.0/24".to_string(), "::1/128".to_string()];
        store.put("*.example.org", restricted.clone()).await.unwrap();
        store.save().await.unwrap();

        let reloaded = FileCredentialStore::load(&path).await.unwrap();
        assert_eq!(
            reloaded.domains().await.unwrap(),
            vec!["example.com", "example.org"]
        );
        assert_eq!(
            reloaded.fetch("example.com").await.unwrap(),
            Some(account("a"))
        );
        assert_eq!(
            reloaded.fetch("example.org").await.unwrap(),
            Some(restricted)
        );
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("acmedns.json");

        let store = FileCredentialStore::load(&path).await.unwrap();
        store.put("example.com", account("a")).await.unwrap();
        store.save().await.unwrap();

        let temp = store.temp_path().unwrap();
        assert!(path.exists());
        assert!(!temp.exists());
        assert_eq!(temp.file_name().unwrap(), "acmedns.json.tmp");
    }

    #[tokio::test]
    async fn test_save_replaces_previous_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("acmedns.json");
        // Longer pre-existing content must not leave a trailing remainder
        let long = serde_json::json!({
            "old.example": account("a-very-long-subdomain-identifier-that-takes-space"),
            "older.example": account("another-long-subdomain-identifier"),
        });
        fs::write(&path, serde_json::to_vec(&long).unwrap())
            .await
            .unwrap();

        let store = FileCredentialStore::load(&path).await.unwrap();
        store.put("old.example", account("x")).await.unwrap();
        store.save().await.unwrap();

        let raw = fs::read(&path).await.unwrap();
        let parsed: BTreeMap<String, Account> = serde_json::from_slice(&raw).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["old.example"], account("x"));
    }

    #[tokio::test]
    async fn test_save_creates_parent_directory() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("letsencrypt").join("acmedns.json");

        let store = FileCredentialStore::load(&path).await.unwrap();
        store.put("example.com", account("a")).await.unwrap();
        store.save().await.unwrap();
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("acmedns.json");
        // Pre-existing world-readable file gets replaced by a 0600 one
        fs::write(&path, b"{}").await.unwrap();
        fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644))
            .await
            .unwrap();

        let store = FileCredentialStore::load(&path).await.unwrap();
        store.put("example.com", account("a")).await.unwrap();
        store.save().await.unwrap();

        let mode = fs::metadata(&path).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_failed_save_keeps_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("acmedns.json");

        let store = FileCredentialStore::load(&path).await.unwrap();
        store.put("example.com", account("a")).await.unwrap();
        store.save().await.unwrap();
        let before = fs::read(&path).await.unwrap();

        // Block the temp path with a non-empty directory so the write fails
        let temp = store.temp_path().unwrap();
        fs::create_dir(&temp).await.unwrap();
        fs::write(temp.join("blocker"), b"x").await.unwrap();

        store.put("example.org", account("b")).await.unwrap();
        let err = store.save().await.unwrap_err();
        assert!(matches!(err, Error::StateStore(_)), "got {:?}", err);

        assert_eq!(fs::read(&path).await.unwrap(), before);
    }
}
