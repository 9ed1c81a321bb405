use std::sync::Arc;

use regex::Regex;
use tracing::{debug, error, warn};

use shared_config::AppConfig;
use shared_database::store::{BackendError, IdentityProvider};
use shared_models::auth::{Credentials, Session};
use shared_models::routes;
use shared_models::validation::ValidationError;

use crate::models::{AccountError, PasswordChange};

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

pub const SIGN_UP_SENT: &str =
    "Check your email to verify your account. Then come back here to finish your registration.";
pub const LINK_SENT: &str = "Check your email for a secure sign-in link.";
pub const PASSWORD_UPDATED: &str = "Your password has been updated.";

/// Account-level operations: sign-up, sign-in, passwordless links, sign-out and
/// password changes. Service error text is logged, never returned.
pub struct AccountService {
    identity: Arc<dyn IdentityProvider>,
    config: Arc<AppConfig>,
    email_pattern: Option<Regex>,
}

impl AccountService {
    pub fn new(identity: Arc<dyn IdentityProvider>, config: Arc<AppConfig>) -> Self {
        Self {
            identity,
            config,
            email_pattern: Regex::new(EMAIL_PATTERN).ok(),
        }
    }

    fn check_email(&self, email: &str) -> Result<(), ValidationError> {
        match &self.email_pattern {
            Some(pattern) if !pattern.is_match(email) => Err(ValidationError::new(
                "email",
                "Please enter a valid email address.",
            )),
            _ => Ok(()),
        }
    }

    /// Registers a doctor account. The verification email sends them back to the
    /// sign-up completion page.
    pub async fn sign_up_doctor(&self, credentials: &Credentials) -> Result<&'static str, AccountError> {
        let email = credentials.email.trim();
        if email.is_empty() || credentials.password.is_empty() {
            return Err(ValidationError::new("email", "Please enter both email and password.").into());
        }
        self.check_email(email)?;

        let redirect_to = self.config.site_route(routes::DOCTOR_SIGNUP_COMPLETE);
        debug!("Signing up doctor account: {}", email);

        let normalized = Credentials {
            email: email.to_string(),
            password: credentials.password.clone(),
        };

        self.identity
            .sign_up(&normalized, &redirect_to)
            .await
            .map_err(|e| match e {
                BackendError::Rejected { status: 422, .. } => {
                    warn!("Sign-up rejected for existing account: {}", email);
                    AccountError::Failed("An account with this email already exists.".to_string())
                }
                other => {
                    error!("Sign-up failed: {}", other);
                    AccountError::Failed(
                        "We couldn't create your account. Please try again.".to_string(),
                    )
                }
            })?;

        Ok(SIGN_UP_SENT)
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session, AccountError> {
        let email = credentials.email.trim();
        if email.is_empty() || credentials.password.is_empty() {
            return Err(ValidationError::new("email", "Please enter your email and password.").into());
        }

        debug!("Signing in: {}", email);

        let normalized = Credentials {
            email: email.to_string(),
            password: credentials.password.clone(),
        };

        self.identity.sign_in(&normalized).await.map_err(|e| match e {
            BackendError::Rejected { status: 400, .. } | BackendError::Unauthorized(_) => {
                warn!("Sign-in rejected for: {}", email);
                AccountError::Unauthorized("Incorrect email or password.".to_string())
            }
            other => {
                error!("Sign-in failed: {}", other);
                AccountError::Failed("We couldn't sign you in just now. Please try again.".to_string())
            }
        })
    }

    /// Sends a one-time sign-in link that lands on the patient onboarding page.
    pub async fn send_patient_link(&self, email: &str) -> Result<&'static str, AccountError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(ValidationError::new("email", "Please enter your email address.").into());
        }
        self.check_email(email)?;

        let redirect_to = self.config.site_route(routes::PATIENT_ONBOARDING);
        debug!("Sending passwordless link to: {}", email);

        self.identity
            .send_passwordless_link(email, &redirect_to)
            .await
            .map_err(|e| {
                error!("Failed to send passwordless link: {}", e);
                AccountError::Failed("We couldn't send the link. Please try again.".to_string())
            })?;

        Ok(LINK_SENT)
    }

    /// Always lands on the home page; a failed revocation only gets logged.
    pub async fn sign_out(&self, access_token: &str) -> &'static str {
        if let Err(e) = self.identity.sign_out(access_token).await {
            warn!("Sign-out did not complete cleanly: {}", e);
        }
        routes::HOME
    }

    pub async fn change_password(
        &self,
        access_token: &str,
        change: &PasswordChange,
    ) -> Result<&'static str, AccountError> {
        if !change.is_requested() {
            return Err(ValidationError::new("new_password", "Please enter a new password.").into());
        }
        change.validate()?;

        self.identity
            .update_password(access_token, &change.new_password)
            .await
            .map_err(|e| {
                error!("Password update failed: {}", e);
                AccountError::Failed("We couldn't update your password. Please try again.".to_string())
            })?;

        Ok(PASSWORD_UPDATED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shared_models::auth::Identity;
    use shared_utils::test_utils::{InMemoryBackend, TestConfig};

    fn service(store: &Arc<InMemoryBackend>) -> AccountService {
        AccountService::new(store.backend().identity, TestConfig::default().to_arc())
    }

    fn credentials(email: &str, password: &str) -> Credentials {
        Credentials {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_sign_up_requires_both_fields() {
        let store = InMemoryBackend::new();
        let err = service(&store)
            .sign_up_doctor(&credentials("doc@example.com", ""))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Please enter both email and password.");
        assert!(store.signups().is_empty());
    }

    #[tokio::test]
    async fn test_sign_up_redirects_to_completion_page() {
        let store = InMemoryBackend::new();
        let message = service(&store)
            .sign_up_doctor(&credentials(" doc@example.com ", "secret1"))
            .await
            .unwrap();

        assert_eq!(message, SIGN_UP_SENT);
        assert_eq!(
            store.signups(),
            vec![(
                "doc@example.com".to_string(),
                "http://localhost:3000/signup/doctor/complete".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn test_sign_up_duplicate_account() {
        let store = InMemoryBackend::new();
        let accounts = service(&store);
        accounts.sign_up_doctor(&credentials("doc@example.com", "secret1")).await.unwrap();

        let err = accounts
            .sign_up_doctor(&credentials("doc@example.com", "secret1"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "An account with this email already exists.");
    }

    #[tokio::test]
    async fn test_sign_in() {
        let store = InMemoryBackend::new();
        store.with_account("doc@example.com", "secret1", Identity::new("U1"));
        let accounts = service(&store);

        let session = accounts.sign_in(&credentials("doc@example.com", "secret1")).await.unwrap();
        assert_eq!(session.identity.id, "U1");
        assert!(store.is_signed_in(&session.access_token));

        let err = accounts.sign_in(&credentials("doc@example.com", "wrong")).await.unwrap_err();
        assert_matches!(err, AccountError::Unauthorized(_));

        let err = accounts.sign_in(&credentials("", "secret1")).await.unwrap_err();
        assert_eq!(err.to_string(), "Please enter your email and password.");
    }

    #[tokio::test]
    async fn test_patient_link() {
        let store = InMemoryBackend::new();
        let accounts = service(&store);

        accounts.send_patient_link("  pat@example.com ").await.unwrap();
        assert_eq!(
            store.links_sent(),
            vec![(
                "pat@example.com".to_string(),
                "http://localhost:3000/patient/onboarding".to_string()
            )]
        );

        let err = accounts.send_patient_link("not-an-email").await.unwrap_err();
        assert_matches!(err, AccountError::Invalid(_));

        store.fail_links_with(BackendError::Unavailable("smtp down".to_string()));
        let err = accounts.send_patient_link("pat@example.com").await.unwrap_err();
        assert_eq!(err.to_string(), "We couldn't send the link. Please try again.");
    }

    #[tokio::test]
    async fn test_sign_out_goes_home() {
        let store = InMemoryBackend::new();
        store.with_session("tok", Identity::new("U1"));

        assert_eq!(service(&store).sign_out("tok").await, "/");
        assert!(!store.is_signed_in("tok"));
    }

    #[tokio::test]
    async fn test_change_password() {
        let store = InMemoryBackend::new();
        store.with_session("tok", Identity::new("U1"));
        let accounts = service(&store);

        let err = accounts
            .change_password("tok", &PasswordChange::new("abc123", "abc124"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Your passwords don't match.");
        assert_eq!(store.password_calls(), 0);

        accounts
            .change_password("tok", &PasswordChange::new("abc123", "abc123"))
            .await
            .unwrap();
        assert_eq!(store.password_for("U1").as_deref(), Some("abc123"));
    }
}
