use std::sync::Arc;

use axum::{
    extract::{Extension, Json, State},
    http::HeaderMap,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use tracing::debug;

use shared_models::auth::{Credentials, User};
use shared_models::error::AppError;
use shared_models::routes;
use shared_utils::extractor::bearer_token;
use shared_utils::state::AppState;

use crate::models::{
    MagicLinkRequest, MessageResponse, PasswordChange, RedirectResponse, SessionOutcome,
    SessionResponse, SignInResponse,
};
use crate::services::{AccountService, SessionResolver};

fn accounts(state: &AppState) -> AccountService {
    AccountService::new(state.backend.identity.clone(), state.config.clone())
}

#[axum::debug_handler]
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<MessageResponse>, AppError> {
    let message = accounts(&state).sign_up_doctor(&credentials).await?;

    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}

#[axum::debug_handler]
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<SignInResponse>, AppError> {
    let session = accounts(&state).sign_in(&credentials).await?;

    Ok(Json(SignInResponse {
        access_token: session.access_token,
        refresh_token: session.refresh_token,
        expires_in: session.expires_in,
        user_id: session.identity.id,
        redirect_to: routes::DOCTOR_DASHBOARD.to_string(),
    }))
}

#[axum::debug_handler]
pub async fn magic_link(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MagicLinkRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let message = accounts(&state).send_patient_link(&request.email).await?;

    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}

/// Reports whether the caller has a live session. No token is a normal answer, not an
/// error; only an unreachable identity service fails.
#[axum::debug_handler]
pub async fn session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<SessionResponse>, AppError> {
    let token = bearer_token(&headers).ok();
    let resolver = SessionResolver::new(state.backend.identity.clone());

    let response = match resolver.resolve(token.as_deref()).await? {
        SessionOutcome::Authenticated(identity) => SessionResponse {
            authenticated: true,
            identity: Some(identity),
            redirect_to: None,
        },
        SessionOutcome::Unauthenticated => SessionResponse {
            authenticated: false,
            identity: None,
            redirect_to: Some(routes::SIGN_IN.to_string()),
        },
    };

    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn sign_out(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<RedirectResponse>, AppError> {
    debug!("Signing out user: {}", user.id);
    let redirect_to = accounts(&state).sign_out(auth.token()).await;

    Ok(Json(RedirectResponse {
        redirect_to: redirect_to.to_string(),
    }))
}

#[axum::debug_handler]
pub async fn update_password(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(change): Json<PasswordChange>,
) -> Result<Json<MessageResponse>, AppError> {
    debug!("Updating password for user: {}", user.id);
    let message = accounts(&state).change_password(auth.token(), &change).await?;

    Ok(Json(MessageResponse {
        message: message.to_string(),
    }))
}
