//! Key selection policy.
//!
//! Decides which key the vault should be asked for, from the operation
//! configuration and the platform capability record. Pure decision logic;
//! any key creation happens behind the vault's atomic get-or-create.

use std::time::Duration;

use crate::capabilities::PlatformCapabilities;
use crate::config::OperationConfig;

/// How long a successful authentication keeps an auth-gated key usable
/// before the platform demands a fresh challenge.
pub const AUTH_VALIDITY_WINDOW: Duration = Duration::from_secs(60);

/// Identity of the default (non-gated) key.
pub const DEFAULT_KEY_ID: &str = "master_key_v1";

/// Identity of the hardware-backed, authentication-bound key.
pub const AUTH_GATED_KEY_ID: &str = "master_key_auth_v1";

/// What to request from the key vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySpec {
    /// Caller-supplied key material; never authentication-gated.
    Custom { material: String },
    /// Hardware-backed key whose use requires an authentication no older
    /// than `validity`.
    HardwareAuthGated { validity: Duration },
    /// The default key, created on first use.
    Default,
}

impl KeySpec {
    /// Stable identity used by vaults to persist and look up the key.
    pub fn key_id(&self) -> &str {
        match self {
            Self::Custom { .. } => "custom",
            Self::HardwareAuthGated { .. } => AUTH_GATED_KEY_ID,
            Self::Default => DEFAULT_KEY_ID,
        }
    }
}

/// Decision table:
///
/// | condition                                            | result            |
/// |------------------------------------------------------|-------------------|
/// | custom key material set                              | Custom            |
/// | auth required and platform supports auth-gated keys  | HardwareAuthGated |
/// | otherwise                                            | Default           |
pub fn select_key_spec(config: &OperationConfig, caps: PlatformCapabilities) -> KeySpec {
    if let Some(material) = &config.custom_key_material {
        return KeySpec::Custom {
            material: material.clone(),
        };
    }
    if config.require_authentication && caps.auth_gated_keys {
        return KeySpec::HardwareAuthGated {
            validity: AUTH_VALIDITY_WINDOW,
        };
    }
    KeySpec::Default
}
