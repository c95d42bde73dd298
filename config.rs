//! Per-operation configuration.
//!
//! [`OperationConfig`] is an immutable record built and validated in full
//! before an operation starts; a contradictory configuration is rejected by
//! [`ConfigBuilder::build`] rather than surfacing deep inside the flow.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::FileCryptError;

/// Immutable configuration consumed by a single encrypt or decrypt operation.
#[derive(Debug, Clone, Default)]
pub struct OperationConfig {
    pub require_authentication: bool,
    pub delete_source_after_encrypt: bool,
    pub zero_source_after_encrypt: bool,
    pub custom_key_material: Option<String>,
    pub destination_directory: Option<PathBuf>,
    pub destination_file_name: Option<OsString>,
}

impl OperationConfig {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for [`OperationConfig`]. Every setter is last-write-wins;
/// `build` performs the full validation pass.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    require_authentication: bool,
    delete_source_after_encrypt: bool,
    zero_source_after_encrypt: bool,
    custom_key_material: Option<String>,
    destination_directory: Option<PathBuf>,
    destination_file_name: Option<OsString>,
}

impl ConfigBuilder {
    pub fn require_authentication(mut self, value: bool) -> Self {
        self.require_authentication = value;
        self
    }

    pub fn delete_source_after_encrypt(mut self, value: bool) -> Self {
        self.delete_source_after_encrypt = value;
        self
    }

    pub fn zero_source_after_encrypt(mut self, value: bool) -> Self {
        self.zero_source_after_encrypt = value;
        self
    }

    pub fn custom_key_material(mut self, material: impl Into<String>) -> Self {
        self.custom_key_material = Some(material.into());
        self
    }

    pub fn destination_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.destination_directory = Some(dir.into());
        self
    }

    pub fn destination_file_name(mut self, name: impl Into<OsString>) -> Self {
        self.destination_file_name = Some(name.into());
        self
    }

    /// Validate and freeze the configuration.
    ///
    /// Requesting both delete-source and zero-source is a configuration
    /// error, rejected here rather than silently resolved.
    pub fn build(self) -> Result<OperationConfig, FileCryptError> {
        if self.delete_source_after_encrypt && self.zero_source_after_encrypt {
            return Err(FileCryptError::configuration(
                "delete_source_after_encrypt and zero_source_after_encrypt are mutually exclusive",
            ));
        }
        if let Some(material) = &self.custom_key_material {
            if material.is_empty() {
                return Err(FileCryptError::configuration(
                    "custom key material cannot be empty",
                ));
            }
        }
        if let Some(name) = &self.destination_file_name {
            if name.is_empty() {
                return Err(FileCryptError::configuration(
                    "destination file name cannot be empty",
                ));
            }
        }
        Ok(OperationConfig {
            require_authentication: self.require_authentication,
            delete_source_after_encrypt: self.delete_source_after_encrypt,
            zero_source_after_encrypt: self.zero_source_after_encrypt,
            custom_key_material: self.custom_key_material,
            destination_directory: self.destination_directory,
            destination_file_name: self.destination_file_name,
        })
    }
}

/// Caller-owned reference to the plaintext file an operation works on.
/// Never mutated; only read to derive destination names.
#[derive(Debug, Clone)]
pub struct FileReference {
    path: PathBuf,
}

impl FileReference {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name component, lossy for display purposes.
    pub fn file_name(&self) -> Option<String> {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    }

    /// Parent directory; an empty path resolves relative to the
    /// current directory.
    pub fn parent(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_rejects_delete_and_zero_together() {
        let result = OperationConfig::builder()
            .delete_source_after_encrypt(true)
            .zero_source_after_encrypt(true)
            .build();
        assert!(matches!(result, Err(FileCryptError::Configuration(_))));
    }

    #[test]
    fn build_accepts_either_cleanup_mode_alone() {
        assert!(OperationConfig::builder()
            .delete_source_after_encrypt(true)
            .build()
            .is_ok());
        assert!(OperationConfig::builder()
            .zero_source_after_encrypt(true)
            .build()
            .is_ok());
    }

    #[test]
    fn setters_are_last_write_wins() {
        let config = OperationConfig::builder()
            .destination_file_name("first.bin")
            .destination_file_name("second.bin")
            .require_authentication(true)
            .require_authentication(false)
            .build()
            .unwrap();
        assert_eq!(
            config.destination_file_name.as_deref(),
            Some(std::ffi::OsStr::new("second.bin"))
        );
        assert!(!config.require_authentication);
    }

    #[test]
    fn build_rejects_empty_custom_key_material() {
        let result = OperationConfig::builder().custom_key_material("").build();
        assert!(matches!(result, Err(FileCryptError::Configuration(_))));
    }

    #[test]
    fn file_reference_exposes_name_and_parent() {
        let file = FileReference::new("/data/docs/report.txt");
        assert_eq!(file.file_name().as_deref(), Some("report.txt"));
        assert_eq!(file.parent(), PathBuf::from("/data/docs"));
    }
}
