//! Secure storage provider: the byte-level encrypt/decrypt transform.
//!
//! ## File format
//!
//! ```text
//! [version:1][chunk1][chunk2]...
//!
//! Each chunk:
//! [nonce:24][length:4][encrypted_data]
//! ```
//!
//! Files are processed in 64KB chunks so large files never need to be
//! resident in memory. The artifact's file name is passed as AAD, binding
//! ciphertext to its name at rest.

use std::path::Path;

use async_trait::async_trait;
use chacha20poly1305::aead::{Aead, AeadCore, OsRng, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::FileCryptError;
use crate::key_vault::KeyHandle;

/// Chunk size for streaming encryption (64KB).
/// Balances memory usage vs. overhead from per-chunk nonces and tags.
const CHUNK_SIZE: usize = 64 * 1024;

/// Format version written as the first byte of every artifact.
pub const STORAGE_FORMAT_VERSION: u8 = 1;

/// Byte-level transform collaborator. Implementations read every source
/// byte and fully write the destination before returning `Ok`; a partial
/// write always surfaces as an error.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Encrypt `source` into `dest`, returning plaintext bytes processed.
    async fn encrypt_file(
        &self,
        key: &KeyHandle,
        source: &Path,
        dest: &Path,
        aad: &[u8],
    ) -> Result<u64, FileCryptError>;

    /// Decrypt `source` into `dest`, returning plaintext bytes produced.
    async fn decrypt_file(
        &self,
        key: &KeyHandle,
        source: &Path,
        dest: &Path,
        aad: &[u8],
    ) -> Result<u64, FileCryptError>;
}

/// Default provider: chunked XChaCha20-Poly1305 over async file I/O.
#[derive(Default)]
pub struct StreamingStorage;

impl StreamingStorage {
    async fn encrypt_stream<R, W>(
        cipher: &XChaCha20Poly1305,
        reader: &mut R,
        writer: &mut W,
        aad: &[u8],
    ) -> Result<u64, FileCryptError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        writer.write_u8(STORAGE_FORMAT_VERSION).await?;

        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut total_bytes = 0u64;

        loop {
            let n = reader.read(&mut buffer).await?;
            if n == 0 {
                break; // EOF
            }

            // Fresh nonce per chunk
            let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
            let ciphertext = cipher
                .encrypt(
                    &nonce,
                    Payload {
                        msg: &buffer[..n],
                        aad,
                    },
                )
                .map_err(|e| FileCryptError::crypto(format!("chunk encryption failed: {e}")))?;

            writer.write_all(&nonce).await?;
            writer.write_u32(ciphertext.len() as u32).await?;
            writer.write_all(&ciphertext).await?;

            total_bytes += n as u64;
        }

        writer.flush().await?;
        Ok(total_bytes)
    }

    async fn decrypt_stream<R, W>(
        cipher: &XChaCha20Poly1305,
        reader: &mut R,
        writer: &mut W,
        aad: &[u8],
    ) -> Result<u64, FileCryptError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let version = reader.read_u8().await?;
        if version != STORAGE_FORMAT_VERSION {
            return Err(FileCryptError::crypto(format!(
                "unsupported artifact format version: {version}"
            )));
        }

        let mut total_bytes = 0u64;
        let mut nonce_buf = [0u8; 24];

        loop {
            match reader.read_exact(&mut nonce_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            #[allow(deprecated)]
            let nonce = XNonce::from_slice(&nonce_buf);

            let chunk_len = reader.read_u32().await? as usize;
            let mut ciphertext = vec![0u8; chunk_len];
            reader.read_exact(&mut ciphertext).await?;

            let plaintext = cipher
                .decrypt(
                    nonce,
                    Payload {
                        msg: &ciphertext,
                        aad,
                    },
                )
                .map_err(|e| FileCryptError::crypto(format!("chunk decryption failed: {e}")))?;

            writer.write_all(&plaintext).await?;
            total_bytes += plaintext.len() as u64;
        }

        writer.flush().await?;
        Ok(total_bytes)
    }
}

#[async_trait]
impl StorageProvider for StreamingStorage {
    async fn encrypt_file(
        &self,
        key: &KeyHandle,
        source: &Path,
        dest: &Path,
        aad: &[u8],
    ) -> Result<u64, FileCryptError> {
        debug!(source = %source.display(), dest = %dest.display(), "encrypting");
        let cipher = key.cipher();
        let mut reader = fs::File::open(source).await?;
        let mut writer = fs::File::create(dest).await?;
        let bytes = Self::encrypt_stream(&cipher, &mut reader, &mut writer, aad).await?;
        writer.sync_all().await?;
        Ok(bytes)
    }

    async fn decrypt_file(
        &self,
        key: &KeyHandle,
        source: &Path,
        dest: &Path,
        aad: &[u8],
    ) -> Result<u64, FileCryptError> {
        debug!(source = %source.display(), dest = %dest.display(), "decrypting");
        let cipher = key.cipher();
        let mut reader = fs::File::open(source).await?;
        let mut writer = fs::File::create(dest).await?;
        let bytes = Self::decrypt_stream(&cipher, &mut reader, &mut writer, aad).await?;
        writer.sync_all().await?;
        Ok(bytes)
    }
}
