//! Destination path resolution.
//!
//! Pure computation, no I/O. The encrypted artifact's location is derived
//! from the plaintext file plus the optional overrides in the
//! configuration; the same resolution is used by encrypt (where to write)
//! and decrypt (where to read the artifact from).

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::config::{FileReference, OperationConfig};

/// Name prefix for encrypted artifacts when no explicit name is configured.
pub const ENCRYPTED_PREFIX: &str = "Encrypted_";

/// Resolve the destination path for an operation.
///
/// Precedence, first match wins:
/// 1. both directory and file name overridden -> `dir/name`
/// 2. only directory -> `dir/<prefix><source name>`
/// 3. only file name -> `<source parent>/name`
/// 4. neither -> `<source parent>/<prefix><source name>`
pub fn resolve_destination(
    source: &FileReference,
    config: &OperationConfig,
    prefix: &str,
) -> PathBuf {
    match (
        config.destination_directory.as_deref(),
        config.destination_file_name.as_deref(),
    ) {
        (Some(dir), Some(name)) => dir.join(name),
        (Some(dir), None) => dir.join(prefixed_name(source, prefix)),
        (None, Some(name)) => source.parent().join(name),
        (None, None) => source.parent().join(prefixed_name(source, prefix)),
    }
}

fn prefixed_name(source: &FileReference, prefix: &str) -> OsString {
    let mut name = OsString::from(prefix);
    if let Some(file_name) = source.path().file_name() {
        name.push(file_name);
    }
    name
}

/// Default encrypted path for a plaintext file, with no overrides applied.
pub fn default_encrypted_path(path: &Path) -> PathBuf {
    let source = FileReference::new(path);
    let mut dest = source.parent();
    dest.push(prefixed_name(&source, ENCRYPTED_PREFIX));
    dest
}

/// Default restore target for an encrypted artifact: the artifact's name
/// with the [`ENCRYPTED_PREFIX`] stripped, in the same directory.
/// `None` when the name does not carry the prefix.
pub fn default_plaintext_path(encrypted: &Path) -> Option<PathBuf> {
    let name = encrypted.file_name()?.to_str()?;
    let stripped = name.strip_prefix(ENCRYPTED_PREFIX)?;
    if stripped.is_empty() {
        return None;
    }
    Some(
        encrypted
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
            .join(stripped),
    )
}
