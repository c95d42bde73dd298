use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use filecrypt::auth_gate::{AuthOutcome, Authenticator, ChallengeRequest, GrantAll};
use filecrypt::capabilities::PlatformCapabilities;
use filecrypt::config::{FileReference, OperationConfig};
use filecrypt::error::{DenialReason, FileCryptError};
use filecrypt::key_vault::{FileKeyVault, MemoryKeyVault};
use filecrypt::orchestrator::{CryptoOrchestrator, OperationOutcome};
use filecrypt::storage::{StorageProvider, StreamingStorage};

/// Authenticator that always resolves to a fixed outcome.
struct Scripted(AuthOutcome);

#[async_trait]
impl Authenticator for Scripted {
    async fn authenticate(
        &self,
        _request: &ChallengeRequest,
    ) -> Result<AuthOutcome, FileCryptError> {
        Ok(self.0.clone())
    }
}

/// Storage provider whose transform always fails with an I/O error,
/// for verifying that no destructive cleanup happens afterwards.
struct FailingStorage;

#[async_trait]
impl StorageProvider for FailingStorage {
    async fn encrypt_file(
        &self,
        _key: &filecrypt::key_vault::KeyHandle,
        _source: &Path,
        _dest: &Path,
        _aad: &[u8],
    ) -> Result<u64, FileCryptError> {
        Err(FileCryptError::Io(std::io::Error::other("disk on fire")))
    }

    async fn decrypt_file(
        &self,
        _key: &filecrypt::key_vault::KeyHandle,
        _source: &Path,
        _dest: &Path,
        _aad: &[u8],
    ) -> Result<u64, FileCryptError> {
        Err(FileCryptError::Io(std::io::Error::other("disk on fire")))
    }
}

fn orchestrator_with_auth(authenticator: Arc<dyn Authenticator>) -> CryptoOrchestrator {
    CryptoOrchestrator::new(
        Arc::new(MemoryKeyVault::default()),
        Arc::new(StreamingStorage),
        authenticator,
        PlatformCapabilities::default(),
    )
}

fn orchestrator() -> CryptoOrchestrator {
    orchestrator_with_auth(Arc::new(GrantAll))
}

/// Write `report.txt` containing "hello" into a fresh temp dir.
fn setup_report() -> Result<(TempDir, PathBuf)> {
    let tmp = TempDir::new()?;
    let source = tmp.path().join("report.txt");
    std::fs::write(&source, b"hello")?;
    Ok((tmp, source))
}

#[tokio::test]
async fn encrypt_then_decrypt_round_trip_at_original_path() -> Result<()> {
    let (tmp, source) = setup_report()?;
    let orch = orchestrator();
    let file = FileReference::new(&source);
    let config = OperationConfig::default();

    let outcome = orch.encrypt(&file, &config).await?;
    let artifact = tmp.path().join("Encrypted_report.txt");
    assert_eq!(outcome, OperationOutcome::Encrypted(artifact.clone()));

    // Artifact exists and is non-empty; plaintext untouched (no cleanup requested)
    assert!(!std::fs::read(&artifact)?.is_empty());
    assert_eq!(std::fs::read(&source)?, b"hello");

    let outcome = orch.decrypt(&file, &config).await?;
    assert_eq!(outcome, OperationOutcome::Decrypted(source.clone()));
    assert_eq!(std::fs::read(&source)?, b"hello");
    assert!(!artifact.exists());

    Ok(())
}

#[tokio::test]
async fn round_trip_preserves_arbitrary_bytes() -> Result<()> {
    let tmp = TempDir::new()?;
    let source = tmp.path().join("blob.bin");
    let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
    std::fs::write(&source, &data)?;

    let orch = orchestrator();
    let file = FileReference::new(&source);
    let config = OperationConfig::default();

    orch.encrypt(&file, &config).await?;
    orch.decrypt(&file, &config).await?;
    assert_eq!(std::fs::read(&source)?, data);

    Ok(())
}

#[tokio::test]
async fn encrypt_never_overwrites_existing_destination() -> Result<()> {
    let (tmp, source) = setup_report()?;
    let artifact = tmp.path().join("Encrypted_report.txt");
    std::fs::write(&artifact, b"already here")?;

    let orch = orchestrator();
    let result = orch
        .encrypt(&FileReference::new(&source), &OperationConfig::default())
        .await;

    assert!(matches!(result, Err(FileCryptError::Collision(ref p)) if *p == artifact));
    // Neither file was modified
    assert_eq!(std::fs::read(&source)?, b"hello");
    assert_eq!(std::fs::read(&artifact)?, b"already here");

    Ok(())
}

#[tokio::test]
async fn missing_source_fails_before_any_side_effect() -> Result<()> {
    let tmp = TempDir::new()?;
    let source = tmp.path().join("ghost.txt");

    let orch = orchestrator();
    let result = orch
        .encrypt(&FileReference::new(&source), &OperationConfig::default())
        .await;

    assert!(matches!(result, Err(FileCryptError::Configuration(_))));
    assert!(!tmp.path().join("Encrypted_ghost.txt").exists());

    Ok(())
}

#[tokio::test]
async fn delete_source_removes_plaintext_after_success() -> Result<()> {
    let (tmp, source) = setup_report()?;
    let orch = orchestrator();
    let config = OperationConfig::builder()
        .delete_source_after_encrypt(true)
        .build()?;

    orch.encrypt(&FileReference::new(&source), &config).await?;

    assert!(!source.exists());
    assert!(tmp.path().join("Encrypted_report.txt").exists());

    Ok(())
}

#[tokio::test]
async fn zero_source_leaves_empty_file_in_place() -> Result<()> {
    let (tmp, source) = setup_report()?;
    let orch = orchestrator();
    let config = OperationConfig::builder()
        .zero_source_after_encrypt(true)
        .build()?;

    orch.encrypt(&FileReference::new(&source), &config).await?;

    assert!(source.exists());
    assert!(std::fs::read(&source)?.is_empty());
    assert!(tmp.path().join("Encrypted_report.txt").exists());

    Ok(())
}

#[tokio::test]
async fn denied_challenge_leaves_everything_untouched() -> Result<()> {
    let (tmp, source) = setup_report()?;
    let orch = orchestrator_with_auth(Arc::new(Scripted(AuthOutcome::Denied(
        DenialReason::Rejected("not you".into()),
    ))));
    let config = OperationConfig::builder()
        .require_authentication(true)
        .build()?;

    let result = orch.encrypt(&FileReference::new(&source), &config).await;
    let err = result.expect_err("denied challenge must fail the operation");

    assert!(matches!(err, FileCryptError::Authentication(_)));
    assert!(err.to_string().contains("denied"));
    assert_eq!(std::fs::read(&source)?, b"hello");
    assert!(!tmp.path().join("Encrypted_report.txt").exists());

    Ok(())
}

#[tokio::test]
async fn cancelled_challenge_is_distinguishable_from_denial() -> Result<()> {
    let (tmp, source) = setup_report()?;
    let orch = orchestrator_with_auth(Arc::new(Scripted(AuthOutcome::Cancelled)));
    let config = OperationConfig::builder()
        .require_authentication(true)
        .build()?;

    let err = orch
        .encrypt(&FileReference::new(&source), &config)
        .await
        .expect_err("cancelled challenge must fail the operation");

    assert!(err.to_string().contains("cancelled"));
    assert!(!err.to_string().contains("denied"));
    assert_eq!(std::fs::read(&source)?, b"hello");
    assert!(!tmp.path().join("Encrypted_report.txt").exists());

    Ok(())
}

#[tokio::test]
async fn missing_enrollment_surfaces_a_precise_reason() -> Result<()> {
    let (_tmp, source) = setup_report()?;
    let orch = orchestrator_with_auth(Arc::new(Scripted(AuthOutcome::Denied(
        DenialReason::NoEnrolledFactors,
    ))));
    let config = OperationConfig::builder()
        .require_authentication(true)
        .build()?;

    let err = orch
        .encrypt(&FileReference::new(&source), &config)
        .await
        .expect_err("denial must fail the operation");

    assert!(err.to_string().contains("no enrolled authentication factors"));

    Ok(())
}

#[tokio::test]
async fn denied_challenge_does_not_consume_encrypted_artifact() -> Result<()> {
    let (tmp, source) = setup_report()?;

    // Encrypt with an open gate first
    let orch = orchestrator();
    orch.encrypt(&FileReference::new(&source), &OperationConfig::default())
        .await?;
    std::fs::remove_file(&source)?;

    // The gate fires before any key resolution, so a fresh orchestrator
    // with a closed gate is enough
    let config = OperationConfig::builder()
        .require_authentication(true)
        .build()?;
    let gated = orchestrator_with_auth(Arc::new(Scripted(AuthOutcome::Cancelled)));
    let artifact = tmp.path().join("Encrypted_report.txt");

    let result = gated.decrypt(&FileReference::new(&source), &config).await;
    assert!(matches!(result, Err(FileCryptError::Authentication(_))));
    assert!(artifact.exists());
    assert!(!source.exists());

    Ok(())
}

#[tokio::test]
async fn failed_transform_performs_no_destructive_cleanup() -> Result<()> {
    let (tmp, source) = setup_report()?;
    let orch = CryptoOrchestrator::new(
        Arc::new(MemoryKeyVault::default()),
        Arc::new(FailingStorage),
        Arc::new(GrantAll),
        PlatformCapabilities::default(),
    );
    let config = OperationConfig::builder()
        .delete_source_after_encrypt(true)
        .build()?;

    let result = orch.encrypt(&FileReference::new(&source), &config).await;

    assert!(matches!(result, Err(FileCryptError::Io(_))));
    // Source survives a failed transform even with delete requested
    assert_eq!(std::fs::read(&source)?, b"hello");
    assert!(!tmp.path().join("Encrypted_report.txt").exists());

    Ok(())
}

#[tokio::test]
async fn explicit_destination_overrides_are_exact() -> Result<()> {
    let (_tmp, source) = setup_report()?;
    let out_dir = TempDir::new()?;

    let orch = orchestrator();
    let config = OperationConfig::builder()
        .destination_directory(out_dir.path())
        .destination_file_name("out.bin")
        .build()?;

    let outcome = orch.encrypt(&FileReference::new(&source), &config).await?;
    let expected = out_dir.path().join("out.bin");
    assert_eq!(outcome.result_path(), expected);
    assert!(expected.exists());

    // Same overrides locate the artifact on the way back
    std::fs::remove_file(&source)?;
    orch.decrypt(&FileReference::new(&source), &config).await?;
    assert_eq!(std::fs::read(&source)?, b"hello");
    assert!(!expected.exists());

    Ok(())
}

#[tokio::test]
async fn custom_key_material_round_trips_and_wrong_material_fails() -> Result<()> {
    let (_tmp, source) = setup_report()?;
    let orch = orchestrator();

    let config = OperationConfig::builder()
        .custom_key_material("correct horse")
        .build()?;
    orch.encrypt(&FileReference::new(&source), &config).await?;
    std::fs::remove_file(&source)?;

    let wrong = OperationConfig::builder()
        .custom_key_material("wrong horse")
        .build()?;
    let result = orch.decrypt(&FileReference::new(&source), &wrong).await;
    assert!(matches!(result, Err(FileCryptError::Crypto(_))));
    assert!(!source.exists());

    orch.decrypt(&FileReference::new(&source), &config).await?;
    assert_eq!(std::fs::read(&source)?, b"hello");

    Ok(())
}

#[tokio::test]
async fn separate_orchestrators_share_the_persisted_default_key() -> Result<()> {
    let (_tmp, source) = setup_report()?;
    let key_dir = TempDir::new()?;

    let encryptor = CryptoOrchestrator::with_file_vault(key_dir.path());
    let config = OperationConfig::default();
    encryptor
        .encrypt(&FileReference::new(&source), &config)
        .await?;
    std::fs::remove_file(&source)?;

    // A fresh orchestrator over the same key directory resolves the same
    // key and can decrypt what the first one wrote
    let decryptor = CryptoOrchestrator::with_file_vault(key_dir.path());
    decryptor
        .decrypt(&FileReference::new(&source), &config)
        .await?;
    assert_eq!(std::fs::read(&source)?, b"hello");

    Ok(())
}

#[tokio::test]
async fn concurrent_operations_agree_on_one_default_key() -> Result<()> {
    let key_dir = TempDir::new()?;
    let vault = Arc::new(FileKeyVault::new(key_dir.path()));

    let mut handles = Vec::new();
    for i in 0..4 {
        let vault = vault.clone();
        handles.push(tokio::spawn(async move {
            let tmp = TempDir::new()?;
            let source = tmp.path().join(format!("file_{i}.txt"));
            std::fs::write(&source, format!("content {i}"))?;

            let orch = CryptoOrchestrator::new(
                vault,
                Arc::new(StreamingStorage),
                Arc::new(GrantAll),
                PlatformCapabilities::default(),
            );
            let file = FileReference::new(&source);
            let config = OperationConfig::default();
            orch.encrypt(&file, &config).await?;
            std::fs::remove_file(&source)?;
            orch.decrypt(&file, &config).await?;
            anyhow::ensure!(std::fs::read(&source)? == format!("content {i}").into_bytes());
            Ok::<_, anyhow::Error>(())
        }));
    }
    for handle in handles {
        handle.await??;
    }

    // Exactly one key file was ever created
    let keys: Vec<_> = std::fs::read_dir(key_dir.path())?.collect();
    assert_eq!(keys.len(), 1);

    Ok(())
}

#[tokio::test]
async fn auth_gated_key_spec_still_round_trips_with_memory_vault() -> Result<()> {
    let (_tmp, source) = setup_report()?;

    // A platform that supports auth-gated keys routes require_authentication
    // through the gated key identity
    let orch = CryptoOrchestrator::new(
        Arc::new(MemoryKeyVault::default()),
        Arc::new(StreamingStorage),
        Arc::new(GrantAll),
        PlatformCapabilities::hardware_auth_gated(),
    );
    let config = OperationConfig::builder()
        .require_authentication(true)
        .build()?;

    orch.encrypt(&FileReference::new(&source), &config).await?;
    std::fs::remove_file(&source)?;
    orch.decrypt(&FileReference::new(&source), &config).await?;
    assert_eq!(std::fs::read(&source)?, b"hello");

    Ok(())
}
