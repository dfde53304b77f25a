use std::sync::Arc;

use tracing::*;

use crate::resolver::IdentityResolver;
use crate::subject::AuthenticatedUser;
use crate::verifier::TokenVerifier;
use crate::Result;

/// Turns a raw Firebase ID token into a resolved user.
///
/// The token is verified first; the resolver never sees claims from a token
/// the verifier rejected. No prior session state is needed.
#[derive(Clone)]
pub struct FirebaseGuard {
    verifier: Arc<dyn TokenVerifier>,
    resolver: IdentityResolver,
}

impl std::fmt::Debug for FirebaseGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseGuard")
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl FirebaseGuard {
    /// Creates a guard from a verifier and a resolver.
    pub fn new(verifier: Arc<dyn TokenVerifier>, resolver: IdentityResolver) -> FirebaseGuard {
        FirebaseGuard { verifier, resolver }
    }

    /// The resolver users are resolved with.
    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Verifies `id_token` and resolves the user it identifies.
    pub async fn user(&self, id_token: &str) -> Result<AuthenticatedUser> {
        let claims = self.verifier.verify(id_token).inspect_err(|err| {
            warn!("Rejected Firebase ID token: {err}");
        })?;

        self.resolver.resolve_by_claims(&claims).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdentityConfig;
    use crate::store::MemoryUserStore;
    use crate::subject::Authenticatable;
    use crate::verifier::{ClaimsMap, VerificationError};
    use crate::Error;
    use actix_rt::test;
    use serde_json::json;

    struct FixedVerifier;

    impl TokenVerifier for FixedVerifier {
        fn verify(&self, token: &str) -> std::result::Result<ClaimsMap, VerificationError> {
            match token {
                "valid-token" => {
                    let mut claims = ClaimsMap::new();
                    claims.insert("sub".into(), json!("firebase-uid"));
                    claims.insert("email".into(), json!("test@example.com"));
                    Ok(claims)
                }
                "no-email" => {
                    let mut claims = ClaimsMap::new();
                    claims.insert("sub".into(), json!("firebase-uid"));
                    Ok(claims)
                }
                _ => Err(VerificationError::new("invalid signature")),
            }
        }
    }

    fn guard() -> (Arc<MemoryUserStore>, FirebaseGuard) {
        let store = Arc::new(MemoryUserStore::new());
        let resolver = IdentityResolver::new(store.clone(), IdentityConfig::default());
        (store, FirebaseGuard::new(Arc::new(FixedVerifier), resolver))
    }

    #[test]
    async fn resolves_user_for_valid_token() {
        let (store, guard) = guard();

        let user = guard.user("valid-token").await.unwrap();

        assert_eq!(user.auth_identifier(), Some("firebase-uid"));
        assert_eq!(store.writes(), 1);
    }

    #[test]
    async fn rejected_token_never_reaches_store() {
        let (store, guard) = guard();

        let result = guard.user("forged-token").await;

        assert!(matches!(result, Err(Error::Verification(_))));
        assert!(store.is_empty());
    }

    #[test]
    async fn incomplete_claims_fail_without_writes() {
        let (store, guard) = guard();

        let result = guard.user("no-email").await;

        assert!(matches!(result, Err(Error::MissingClaim("email"))));
        assert_eq!(store.writes(), 0);
    }
}
