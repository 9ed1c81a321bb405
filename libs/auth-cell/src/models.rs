use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::auth::Identity;
use shared_models::error::AppError;
use shared_models::validation::ValidationError;

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Optional password change carried by both onboarding forms. Blank means "keep the
/// current password". Never serialized back to clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PasswordChange {
    pub new_password: String,
    pub confirm_password: String,
}

impl PasswordChange {
    pub fn new(new_password: impl Into<String>, confirm_password: impl Into<String>) -> Self {
        Self {
            new_password: new_password.into(),
            confirm_password: confirm_password.into(),
        }
    }

    pub fn is_requested(&self) -> bool {
        !self.new_password.is_empty()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.is_requested() {
            return Ok(());
        }

        if self.new_password != self.confirm_password {
            return Err(ValidationError::new(
                "confirm_password",
                "Your passwords don't match.",
            ));
        }

        if self.new_password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(ValidationError::new(
                "new_password",
                format!(
                    "Your new password must be at least {} characters.",
                    MIN_PASSWORD_LENGTH
                ),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MagicLinkRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub user_id: String,
    pub redirect_to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectResponse {
    pub redirect_to: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<Identity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Authenticated(Identity),
    Unauthenticated,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("We couldn't check your sign-in just now. Please try again.")]
    Unavailable,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Failed(String),
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Invalid(e) => e.into(),
            AccountError::Unauthorized(msg) => AppError::Auth(msg),
            AccountError::Failed(msg) => AppError::ExternalService(msg),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        AppError::ExternalService(err.to_string())
    }
}
