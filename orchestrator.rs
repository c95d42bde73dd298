//! Operation orchestration.
//!
//! [`CryptoOrchestrator`] sequences a single encrypt or decrypt operation:
//! precondition checks, key and path resolution, the optional
//! authentication challenge, the byte-level transform, and the
//! post-operation plaintext handling. The flow is a straight line with one
//! suspension point (the challenge); every destructive step runs only
//! after the transform has fully succeeded.
//!
//! One logical operation is in flight per orchestrator at a time; callers
//! serialize operations per instance (or per source file) themselves.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, info, warn};

use crate::auth_gate::{AuthGate, AuthOutcome, Authenticator, ChallengeRequest, GrantAll};
use crate::capabilities::PlatformCapabilities;
use crate::config::{FileReference, OperationConfig};
use crate::error::{AuthFailure, FileCryptError};
use crate::key_policy::select_key_spec;
use crate::key_vault::{FileKeyVault, KeyVault};
use crate::path_resolver::{resolve_destination, ENCRYPTED_PREFIX};
use crate::storage::{StorageProvider, StreamingStorage};

/// Terminal outcome of a successful operation. Failures are the error
/// side of the `Result`; together they form the exactly-one-terminal
/// completion contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Encrypted(PathBuf),
    Decrypted(PathBuf),
}

impl OperationOutcome {
    pub fn result_path(&self) -> &Path {
        match self {
            Self::Encrypted(path) | Self::Decrypted(path) => path,
        }
    }
}

pub struct CryptoOrchestrator {
    vault: Arc<dyn KeyVault>,
    storage: Arc<dyn StorageProvider>,
    gate: AuthGate,
    caps: PlatformCapabilities,
}

impl CryptoOrchestrator {
    pub fn new(
        vault: Arc<dyn KeyVault>,
        storage: Arc<dyn StorageProvider>,
        authenticator: Arc<dyn Authenticator>,
        caps: PlatformCapabilities,
    ) -> Self {
        Self {
            vault,
            storage,
            gate: AuthGate::new(authenticator),
            caps,
        }
    }

    /// File-vault-backed orchestrator with streaming storage, no
    /// interactive authenticator, and detected platform capabilities.
    pub fn with_file_vault(key_dir: impl Into<PathBuf>) -> Self {
        Self::new(
            Arc::new(FileKeyVault::new(key_dir)),
            Arc::new(StreamingStorage),
            Arc::new(GrantAll),
            PlatformCapabilities::detect(),
        )
    }

    /// Encrypt `source` in place according to `config`.
    ///
    /// The plaintext source is untouched unless the transform fully
    /// succeeds; encryption never overwrites an existing destination.
    pub async fn encrypt(
        &self,
        source: &FileReference,
        config: &OperationConfig,
    ) -> Result<OperationOutcome, FileCryptError> {
        let source_path = source.path();
        if !fs::try_exists(source_path).await? {
            return Err(FileCryptError::configuration(format!(
                "source file does not exist: {}",
                source_path.display()
            )));
        }

        let spec = select_key_spec(config, self.caps);
        let dest = resolve_destination(source, config, ENCRYPTED_PREFIX);
        debug!(source = %source_path.display(), dest = %dest.display(), key = spec.key_id(), "encrypt resolved");

        if config.require_authentication {
            self.require_grant(&ChallengeRequest::new(
                "Lock?",
                "Would you like to lock this file?",
            ))
            .await?;
        }

        if fs::try_exists(&dest).await? {
            return Err(FileCryptError::Collision(dest));
        }

        let key = self.vault.get_or_create(&spec).await?;
        let aad = artifact_name(&dest);
        let staging = staging_path(&dest);

        let bytes = match self
            .storage
            .encrypt_file(&key, source_path, &staging, aad.as_bytes())
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                discard_staging(&staging).await;
                return Err(e);
            }
        };
        if let Err(e) = fs::rename(&staging, &dest).await {
            discard_staging(&staging).await;
            return Err(e.into());
        }

        // Plaintext handling only after the artifact is fully committed
        if config.delete_source_after_encrypt {
            debug!(source = %source_path.display(), "deleting plaintext source");
            fs::remove_file(source_path).await?;
        } else if config.zero_source_after_encrypt {
            debug!(source = %source_path.display(), "zeroing plaintext source");
            let file = fs::File::create(source_path).await?;
            file.sync_all().await?;
        }

        info!(dest = %dest.display(), bytes, "file encrypted");
        Ok(OperationOutcome::Encrypted(dest))
    }

    /// Restore `target` from its encrypted artifact according to `config`.
    ///
    /// Decryption always consumes the artifact once the plaintext has been
    /// fully restored.
    pub async fn decrypt(
        &self,
        target: &FileReference,
        config: &OperationConfig,
    ) -> Result<OperationOutcome, FileCryptError> {
        let spec = select_key_spec(config, self.caps);
        let artifact = resolve_destination(target, config, ENCRYPTED_PREFIX);
        if !fs::try_exists(&artifact).await? {
            return Err(FileCryptError::configuration(format!(
                "encrypted artifact does not exist: {}",
                artifact.display()
            )));
        }
        let target_path = target.path();
        debug!(artifact = %artifact.display(), target = %target_path.display(), key = spec.key_id(), "decrypt resolved");

        if config.require_authentication {
            self.require_grant(&ChallengeRequest::new(
                "Unlock?",
                "Would you like to unlock this file?",
            ))
            .await?;
        }

        let key = self.vault.get_or_create(&spec).await?;
        let aad = artifact_name(&artifact);
        let staging = staging_path(target_path);

        let bytes = match self
            .storage
            .decrypt_file(&key, &artifact, &staging, aad.as_bytes())
            .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                discard_staging(&staging).await;
                return Err(e);
            }
        };
        if let Err(e) = fs::rename(&staging, target_path).await {
            discard_staging(&staging).await;
            return Err(e.into());
        }

        fs::remove_file(&artifact).await?;

        info!(target = %target_path.display(), bytes, "file decrypted");
        Ok(OperationOutcome::Decrypted(target_path.to_path_buf()))
    }

    async fn require_grant(&self, request: &ChallengeRequest) -> Result<(), FileCryptError> {
        match self.gate.challenge(request).await? {
            AuthOutcome::Granted => Ok(()),
            AuthOutcome::Denied(reason) => {
                Err(FileCryptError::Authentication(AuthFailure::Denied(reason)))
            }
            AuthOutcome::Cancelled => {
                Err(FileCryptError::Authentication(AuthFailure::Cancelled))
            }
        }
    }
}

/// AAD for an artifact: its file name at rest.
fn artifact_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Sibling temporary path the transform writes to before the final
/// rename. Keeps a failed transform from leaving a partial file at the
/// destination itself.
fn staging_path(final_path: &Path) -> PathBuf {
    let name = artifact_name(final_path);
    final_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
        .join(format!(".{name}.tmp"))
}

async fn discard_staging(staging: &Path) {
    // Best effort; the operation already failed
    if let Err(e) = fs::remove_file(staging).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %staging.display(), error = %e, "could not remove staging file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staging_path_stays_in_destination_directory() {
        let staging = staging_path(Path::new("/tmp/Encrypted_report.txt"));
        assert_eq!(staging, PathBuf::from("/tmp/.Encrypted_report.txt.tmp"));
    }

    #[test]
    fn outcome_exposes_result_path() {
        let outcome = OperationOutcome::Encrypted(PathBuf::from("/tmp/x"));
        assert_eq!(outcome.result_path(), Path::new("/tmp/x"));
    }
}
