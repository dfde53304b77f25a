use serde_json::{Map, Value};
use thiserror::Error;

/// Verified claims, as decoded from an ID token payload.
pub type ClaimsMap = Map<String, Value>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error returned by a [`TokenVerifier`].
///
/// The cause (expired, malformed, bad signature, unknown key, ...) is kept as
/// the error source.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// The token itself was rejected.
    #[error("ID token verification failed: {0}")]
    Rejected(#[source] BoxError),

    /// The verifier could not check the token, e.g. the signing keys could
    /// not be fetched or decoded.
    #[error("ID token verifier unavailable: {0}")]
    Unavailable(#[source] BoxError),
}

impl VerificationError {
    /// Wraps the cause of a rejected token.
    pub fn new(source: impl Into<BoxError>) -> VerificationError {
        VerificationError::Rejected(source.into())
    }

    /// Wraps a server-side failure that kept the token from being checked.
    pub fn unavailable(source: impl Into<BoxError>) -> VerificationError {
        VerificationError::Unavailable(source.into())
    }

    /// Whether the failure lies with the verifier rather than the token.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, VerificationError::Unavailable(_))
    }
}

/// Verifies a raw ID token and returns its claims.
///
/// Signature checks and public key management live behind this trait. The
/// resolver only ever sees claims a verifier accepted.
pub trait TokenVerifier: Send + Sync {
    /// Verifies `token`, returning its claims or the reason it was rejected.
    fn verify(&self, token: &str) -> Result<ClaimsMap, VerificationError>;
}

#[cfg(feature = "firebase-auth")]
impl TokenVerifier for actix_firebase_auth::FirebaseAuth {
    fn verify(&self, token: &str) -> Result<ClaimsMap, VerificationError> {
        use actix_firebase_auth::Error;

        actix_firebase_auth::FirebaseAuth::verify::<ClaimsMap>(self, token).map_err(|err| {
            let unavailable = match &err {
                Error::PublicKeysError(_) => true,
                // the key decoding variant is not re-exported, so match it by name
                Error::VerificationError(inner) => format!("{inner:?}") == "CannotDecodePublicKeys",
                #[allow(unreachable_patterns)]
                _ => false,
            };

            if unavailable {
                VerificationError::unavailable(err)
            } else {
                VerificationError::new(err)
            }
        })
    }
}
