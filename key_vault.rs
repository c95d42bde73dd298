//! Key custody.
//!
//! The vault owns key material; operations only ever hold an opaque
//! [`KeyHandle`] resolved fresh at the start of each operation. Retrieval
//! goes through a single atomic get-or-create primitive so concurrent
//! callers can never create duplicate or divergent key material.
//!
//! Key bytes are zeroized on drop and, for the file-backed vault, written
//! with owner-only permissions on Unix.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use blake2::{Blake2s256, Digest};
use chacha20poly1305::{KeyInit, XChaCha20Poly1305};
use rand_core::{OsRng, RngCore};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{info, warn};
use zeroize::Zeroize;

use crate::error::FileCryptError;
use crate::key_policy::KeySpec;

/// Where a handle's key material came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Vault-generated or vault-persisted material.
    Derived,
    /// Caller-supplied custom material.
    Custom,
}

/// Opaque reference to key material, immutable once an operation has
/// begun using it.
pub struct KeyHandle {
    id: String,
    hardware_backed: bool,
    auth_gated: bool,
    source: KeySource,
    key_bytes: [u8; 32],
}

impl Drop for KeyHandle {
    fn drop(&mut self) {
        self.key_bytes.zeroize();
    }
}

impl KeyHandle {
    fn new(
        id: impl Into<String>,
        hardware_backed: bool,
        auth_gated: bool,
        source: KeySource,
        key_bytes: [u8; 32],
    ) -> Self {
        Self {
            id: id.into(),
            hardware_backed,
            auth_gated,
            source,
            key_bytes,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn hardware_backed(&self) -> bool {
        self.hardware_backed
    }

    pub fn auth_gated(&self) -> bool {
        self.auth_gated
    }

    pub fn source(&self) -> KeySource {
        self.source
    }

    /// Cipher instance for the storage provider.
    pub fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new_from_slice(&self.key_bytes)
            .expect("BUG: key_bytes is always 32 bytes, this should never fail")
    }
}

impl std::fmt::Debug for KeyHandle {
    // Never expose key bytes, even in debug output
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyHandle")
            .field("id", &self.id)
            .field("hardware_backed", &self.hardware_backed)
            .field("auth_gated", &self.auth_gated)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Key custody collaborator.
#[async_trait]
pub trait KeyVault: Send + Sync {
    /// Resolve the handle for a key spec, creating the key atomically on
    /// first use. Concurrent calls for the same identity must resolve to
    /// the same key material.
    async fn get_or_create(&self, spec: &KeySpec) -> Result<KeyHandle, FileCryptError>;
}

/// Derive a 256-bit key from caller-supplied material.
fn derive_custom_key(material: &str) -> [u8; 32] {
    let digest = Blake2s256::digest(material.as_bytes());
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}

/// File-backed vault: one 32-byte key file per key identity under a
/// directory. In production prefer an OS keyring or hardware key store;
/// handles from this vault honestly report `hardware_backed = false`.
pub struct FileKeyVault {
    key_dir: PathBuf,
    // Serializes in-process get-or-create; cross-process atomicity comes
    // from create_new(true) on the key file itself.
    create_lock: Mutex<()>,
}

impl FileKeyVault {
    pub fn new(key_dir: impl Into<PathBuf>) -> Self {
        Self {
            key_dir: key_dir.into(),
            create_lock: Mutex::new(()),
        }
    }

    fn key_path(&self, key_id: &str) -> PathBuf {
        self.key_dir.join(format!("{key_id}.key"))
    }

    async fn load_key(&self, key_id: &str) -> Result<[u8; 32], FileCryptError> {
        let path = self.key_path(key_id);
        let data = fs::read(&path)
            .await
            .map_err(|e| FileCryptError::key(format!("reading key {}: {e}", path.display())))?;
        if data.len() != 32 {
            warn!(path = %path.display(), found_bytes = data.len(), "invalid key size");
            return Err(FileCryptError::key(format!(
                "expected 32-byte key at {} but found {} bytes",
                path.display(),
                data.len()
            )));
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(&data);
        Ok(key)
    }

    async fn load_or_create(&self, key_id: &str) -> Result<[u8; 32], FileCryptError> {
        let path = self.key_path(key_id);
        let _guard = self.create_lock.lock().await;

        if fs::try_exists(&path).await.map_err(|e| {
            FileCryptError::key(format!("checking existence of {}: {e}", path.display()))
        })? {
            return self.load_key(key_id).await;
        }

        fs::create_dir_all(&self.key_dir).await.map_err(|e| {
            FileCryptError::key(format!(
                "creating key directory {}: {e}",
                self.key_dir.display()
            ))
        })?;

        info!(path = %path.display(), "generating new encryption key");
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);

        match write_key_file(path.clone(), key).await {
            Ok(()) => Ok(key),
            // Another process won the create race; its key is the key.
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                info!(path = %path.display(), "key created concurrently, reusing it");
                self.load_key(key_id).await
            }
            Err(e) => Err(FileCryptError::key(format!(
                "writing key to {}: {e}",
                path.display()
            ))),
        }
    }
}

/// Write a key file with create_new so a concurrent creator fails instead
/// of overwriting, restricted to owner read/write on Unix.
async fn write_key_file(path: PathBuf, key: [u8; 32]) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        tokio::task::spawn_blocking(move || {
            use std::fs::OpenOptions;
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;

            let mut f = OpenOptions::new()
                .write(true)
                .create_new(true)
                .mode(0o600)
                .open(&path)?;
            f.write_all(&key)
        })
        .await
        .map_err(|e| std::io::Error::other(format!("key write task failed: {e}")))?
    }
    #[cfg(not(unix))]
    {
        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        let mut f = options.open(&path).await?;
        use tokio::io::AsyncWriteExt;
        f.write_all(&key).await
    }
}

#[async_trait]
impl KeyVault for FileKeyVault {
    async fn get_or_create(&self, spec: &KeySpec) -> Result<KeyHandle, FileCryptError> {
        match spec {
            KeySpec::Custom { material } => Ok(KeyHandle::new(
                spec.key_id(),
                false,
                false,
                KeySource::Custom,
                derive_custom_key(material),
            )),
            KeySpec::Default => {
                let key = self.load_or_create(spec.key_id()).await?;
                Ok(KeyHandle::new(
                    spec.key_id(),
                    false,
                    false,
                    KeySource::Derived,
                    key,
                ))
            }
            KeySpec::HardwareAuthGated { .. } => {
                let key = self.load_or_create(spec.key_id()).await?;
                Ok(KeyHandle::new(
                    spec.key_id(),
                    false,
                    true,
                    KeySource::Derived,
                    key,
                ))
            }
        }
    }
}

/// In-memory vault for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryKeyVault {
    keys: StdMutex<HashMap<String, [u8; 32]>>,
}

#[async_trait]
impl KeyVault for MemoryKeyVault {
    async fn get_or_create(&self, spec: &KeySpec) -> Result<KeyHandle, FileCryptError> {
        if let KeySpec::Custom { material } = spec {
            return Ok(KeyHandle::new(
                spec.key_id(),
                false,
                false,
                KeySource::Custom,
                derive_custom_key(material),
            ));
        }

        let mut keys = self
            .keys
            .lock()
            .map_err(|e| FileCryptError::key(format!("vault lock poisoned: {e}")))?;
        let key = *keys.entry(spec.key_id().to_string()).or_insert_with(|| {
            let mut key = [0u8; 32];
            OsRng.fill_bytes(&mut key);
            key
        });
        let auth_gated = matches!(spec, KeySpec::HardwareAuthGated { .. });
        Ok(KeyHandle::new(
            spec.key_id(),
            false,
            auth_gated,
            KeySource::Derived,
            key,
        ))
    }
}
