use std::sync::Arc;

use tracing::{debug, error};

use shared_database::store::{BackendError, IdentityProvider};

use crate::models::{SessionError, SessionOutcome};

/// Resolves an access token into the signed-in identity.
#[derive(Clone)]
pub struct SessionResolver {
    identity: Arc<dyn IdentityProvider>,
}

impl SessionResolver {
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self { identity }
    }

    /// A missing, expired or revoked token is `Unauthenticated`. Only transport faults
    /// are errors, so callers can offer a retry instead of a redirect.
    pub async fn resolve(&self, access_token: Option<&str>) -> Result<SessionOutcome, SessionError> {
        let token = match access_token.map(str::trim) {
            Some(token) if !token.is_empty() => token,
            _ => {
                debug!("No access token supplied");
                return Ok(SessionOutcome::Unauthenticated);
            }
        };

        match self.identity.current_identity(token).await {
            Ok(Some(identity)) => {
                debug!("Session resolved for user: {}", identity.id);
                Ok(SessionOutcome::Authenticated(identity))
            }
            Ok(None) => Ok(SessionOutcome::Unauthenticated),
            Err(BackendError::Unauthorized(msg)) => {
                debug!("Identity service rejected the token: {}", msg);
                Ok(SessionOutcome::Unauthenticated)
            }
            Err(e) => {
                error!("Failed to resolve session: {}", e);
                Err(SessionError::Unavailable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_models::auth::Identity;
    use shared_utils::test_utils::InMemoryBackend;

    #[tokio::test]
    async fn test_resolve_known_token() {
        let store = InMemoryBackend::new();
        store.with_session("tok", Identity::new("U1"));
        let resolver = SessionResolver::new(store.backend().identity);

        let outcome = resolver.resolve(Some("tok")).await.unwrap();
        assert_eq!(outcome, SessionOutcome::Authenticated(Identity::new("U1")));
    }

    #[tokio::test]
    async fn test_missing_or_unknown_token_is_unauthenticated() {
        let store = InMemoryBackend::new();
        let resolver = SessionResolver::new(store.backend().identity);

        assert_matches!(resolver.resolve(None).await, Ok(SessionOutcome::Unauthenticated));
        assert_matches!(resolver.resolve(Some("  ")).await, Ok(SessionOutcome::Unauthenticated));
        assert_matches!(resolver.resolve(Some("nope")).await, Ok(SessionOutcome::Unauthenticated));

        store.fail_identity_with(BackendError::Unauthorized("JWT expired".to_string()));
        assert_matches!(resolver.resolve(Some("tok")).await, Ok(SessionOutcome::Unauthenticated));
    }

    #[tokio::test]
    async fn test_transport_fault_is_an_error() {
        let store = InMemoryBackend::new();
        store.fail_identity_with(BackendError::Unavailable("connection reset".to_string()));
        let resolver = SessionResolver::new(store.backend().identity);

        assert_matches!(resolver.resolve(Some("tok")).await, Err(SessionError::Unavailable));
    }
}
