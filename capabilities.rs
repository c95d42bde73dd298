//! Platform capability detection.
//!
//! Capability branching is collapsed into a single detection step executed
//! once; the resulting record is the only thing key selection consults.

use tracing::debug;

/// What the hosting platform's key custody can actually provide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlatformCapabilities {
    /// Key material can live in trusted hardware (TEE / secure element).
    pub hardware_backed_keys: bool,
    /// Key use can be bound to a recent successful user authentication.
    pub auth_gated_keys: bool,
}

impl PlatformCapabilities {
    /// Probe the current platform once, before any operation starts.
    ///
    /// A software key vault has no hardware custody to offer, so plain
    /// hosts report everything unavailable; an embedder with a real
    /// keystore constructs the record directly.
    pub fn detect() -> Self {
        let caps = Self::default();
        debug!(?caps, "platform capabilities detected");
        caps
    }

    /// Capabilities of a platform with hardware-backed, auth-gated keys.
    pub fn hardware_auth_gated() -> Self {
        Self {
            hardware_backed_keys: true,
            auth_gated_keys: true,
        }
    }
}
