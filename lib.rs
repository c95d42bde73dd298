//! # filecrypt - In-Place File Encryption with Key Policy and Auth Gating
//!
//! filecrypt encrypts a local file in place, optionally gated by a user
//! authentication check, and later decrypts it back, managing which key
//! material is used and what happens to the plaintext afterward.
//!
//! ## Components
//!
//! - **[`orchestrator::CryptoOrchestrator`]**: sequences an operation - precondition
//!   checks, key/path resolution, the optional authentication challenge, the
//!   byte-level transform, and plaintext cleanup
//! - **[`key_policy`]**: decides which key to request (custom, hardware-backed
//!   auth-gated, or the default get-or-create key)
//! - **[`auth_gate`]**: one suspending authentication challenge per operation
//! - **[`key_vault`]**: key custody behind an atomic get-or-create primitive
//! - **[`storage`]**: chunked XChaCha20-Poly1305 transform of the file bytes
//!
//! ## Quick Start
//!
//! ```no_run
//! use filecrypt::config::{FileReference, OperationConfig};
//! use filecrypt::orchestrator::CryptoOrchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let orchestrator = CryptoOrchestrator::with_file_vault("./keys");
//!     let file = FileReference::new("./report.txt");
//!     let config = OperationConfig::builder()
//!         .delete_source_after_encrypt(true)
//!         .build()?;
//!
//!     // Writes ./Encrypted_report.txt, then deletes ./report.txt
//!     let outcome = orchestrator.encrypt(&file, &config).await?;
//!     println!("encrypted to {}", outcome.result_path().display());
//!
//!     // Restores ./report.txt and consumes the encrypted artifact
//!     let config = OperationConfig::builder().build()?;
//!     orchestrator.decrypt(&file, &config).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Lifecycle guarantees
//!
//! - Encryption never overwrites an existing file at the destination
//! - Destructive steps (delete/zero the plaintext, consume the artifact)
//!   run only after the transform has fully succeeded
//! - Every operation ends in exactly one terminal outcome

pub mod auth_gate;
pub mod capabilities;
pub mod config;
pub mod error;
pub mod key_policy;
pub mod key_vault;
pub mod orchestrator;
pub mod path_resolver;
pub mod settings;
pub mod storage;

// Re-export common types for convenience
pub use error::FileCryptError;
pub use orchestrator::OperationOutcome;
