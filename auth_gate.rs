//! Authentication gating.
//!
//! Wraps the authentication subsystem behind one suspending call: the
//! operation flow awaits [`AuthGate::challenge`] and cannot proceed until
//! the prompt resolves. The prompt itself (biometric dialog, credential
//! entry, stdin confirm) is the [`Authenticator`] implementation's concern.
//!
//! At most one challenge may be outstanding per gate; real-world prompt
//! latency is unbounded and no timeout is enforced here.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{AuthFailure, DenialReason, FileCryptError};

/// Terminal result of an authentication challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Granted,
    Denied(DenialReason),
    /// User dismissed the prompt. A normal abort, not a system fault.
    Cancelled,
}

/// What the authentication subsystem should show the user.
#[derive(Debug, Clone)]
pub struct ChallengeRequest {
    pub title: String,
    pub description: String,
}

impl ChallengeRequest {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Authentication subsystem collaborator. Resolving the prompt may take
/// arbitrarily long; cancellation is only ever user-driven.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(
        &self,
        request: &ChallengeRequest,
    ) -> Result<AuthOutcome, FileCryptError>;
}

/// Pass-through authenticator for non-interactive embedders.
pub struct GrantAll;

#[async_trait]
impl Authenticator for GrantAll {
    async fn authenticate(
        &self,
        _request: &ChallengeRequest,
    ) -> Result<AuthOutcome, FileCryptError> {
        Ok(AuthOutcome::Granted)
    }
}

/// Gate in front of a privileged operation. States: Idle -> Prompting ->
/// terminal outcome; the suspension point is the `.await` inside
/// [`AuthGate::challenge`].
pub struct AuthGate {
    authenticator: std::sync::Arc<dyn Authenticator>,
    // Held for the duration of a challenge; try_lock failure means a
    // second challenge was issued while one was pending.
    in_flight: Mutex<()>,
}

impl AuthGate {
    pub fn new(authenticator: std::sync::Arc<dyn Authenticator>) -> Self {
        Self {
            authenticator,
            in_flight: Mutex::new(()),
        }
    }

    /// Issue a challenge and suspend until the subsystem resolves it.
    pub async fn challenge(
        &self,
        request: &ChallengeRequest,
    ) -> Result<AuthOutcome, FileCryptError> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| FileCryptError::Authentication(AuthFailure::ChallengeInProgress))?;

        debug!(title = %request.title, "issuing authentication challenge");
        let outcome = self.authenticator.authenticate(request).await?;

        match &outcome {
            AuthOutcome::Granted => info!("authentication granted"),
            AuthOutcome::Denied(reason) => warn!(%reason, "authentication denied"),
            // User dismissal is a normal abort path, not a failure worth
            // alarming anyone about
            AuthOutcome::Cancelled => debug!("authentication cancelled by user"),
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::Notify;

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

    /// Signals when the prompt is showing, then waits to be released.
    struct Pending {
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Authenticator for Pending {
        async fn authenticate(
            &self,
            _request: &ChallengeRequest,
        ) -> Result<AuthOutcome, FileCryptError> {
            self.started.notify_one();
            self.release.notified().await;
            Ok(AuthOutcome::Granted)
        }
    }

    fn request() -> ChallengeRequest {
        ChallengeRequest::new("Lock?", "Would you like to lock this file?")
    }

    #[tokio::test]
    async fn grant_all_grants() {
        let gate = AuthGate::new(Arc::new(GrantAll));
        assert_eq!(gate.challenge(&request()).await.unwrap(), AuthOutcome::Granted);
    }

    #[tokio::test]
    async fn scripted_outcomes_pass_through() {
        let gate = AuthGate::new(Arc::new(Scripted(AuthOutcome::Cancelled)));
        assert_eq!(
            gate.challenge(&request()).await.unwrap(),
            AuthOutcome::Cancelled
        );

        let gate = AuthGate::new(Arc::new(Scripted(AuthOutcome::Denied(
            DenialReason::NoEnrolledFactors,
        ))));
        assert_eq!(
            gate.challenge(&request()).await.unwrap(),
            AuthOutcome::Denied(DenialReason::NoEnrolledFactors)
        );
    }

    #[tokio::test]
    async fn second_challenge_while_pending_is_an_error() {
        let pending = Arc::new(Pending {
            started: Notify::new(),
            release: Notify::new(),
        });
        let gate = Arc::new(AuthGate::new(pending.clone()));

        let first = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.challenge(&request()).await })
        };

        // Wait until the first challenge is actually suspended in the prompt
        pending.started.notified().await;

        let second = gate.challenge(&request()).await;
        assert!(matches!(
            second,
            Err(FileCryptError::Authentication(
                AuthFailure::ChallengeInProgress
            ))
        ));

        pending.release.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), AuthOutcome::Granted);
    }
}
