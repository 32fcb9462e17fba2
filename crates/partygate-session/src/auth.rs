//! Passkey verification hook.
//!
//! The party admits anyone who knows one shared secret. Checking that
//! secret sits behind the [`PasskeyVerifier`] trait so a deployment can
//! swap in something stricter (a rotating passkey, a lookup against an
//! invite list) without touching the party actor.

use crate::SessionError;

/// Decides whether a submitted passkey admits the caller.
///
/// `Send + Sync + 'static` because the verifier lives inside the party
/// actor task for the whole life of the server.
///
/// # Example
///
/// ```rust
/// use partygate_session::{PasskeyVerifier, SessionError};
///
/// /// Admits everyone. Handy for local demos.
/// struct OpenDoor;
///
/// impl PasskeyVerifier for OpenDoor {
///     async fn verify(&self, _passkey: &str) -> Result<(), SessionError> {
///         Ok(())
///     }
/// }
/// ```
pub trait PasskeyVerifier: Send + Sync + 'static {
    /// Returns `Ok(())` when `passkey` is accepted.
    ///
    /// # Errors
    /// [`SessionError::InvalidPasskey`] when it is not.
    fn verify(
        &self,
        passkey: &str,
    ) -> impl std::future::Future<Output = Result<(), SessionError>> + Send;
}

/// The single shared party passkey, compared exactly (case-sensitive, no
/// trimming).
#[derive(Debug, Clone)]
pub struct SharedPasskey {
    secret: String,
}

impl SharedPasskey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Synchronous form of [`PasskeyVerifier::verify`].
    pub fn matches(&self, passkey: &str) -> bool {
        // Compare every byte even after a mismatch so timing does not
        // reveal the length of the matching prefix.
        let a = self.secret.as_bytes();
        let b = passkey.as_bytes();
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

impl Default for SharedPasskey {
    fn default() -> Self {
        Self::new(partygate_protocol::DEFAULT_PASSKEY)
    }
}

impl PasskeyVerifier for SharedPasskey {
    async fn verify(&self, passkey: &str) -> Result<(), SessionError> {
        if self.matches(passkey) {
            Ok(())
        } else {
            Err(SessionError::InvalidPasskey)
        }
    }
}
