//! Authentication API handlers
//!
//! Sign-up and sign-in are public. The join endpoints sit behind the
//! credential validator and answer with a freshly minted credential.

use super::record_id;
use crate::audit::RequestContext;
use crate::auth::{
    AuthResponse, Principal, SignInRequest, SignUpRequest, TokenResponse, Validated,
    ASSOCIATION_NOT_FOUND, COMMUNITY_NOT_FOUND,
};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

fn outcome<T>(result: &Result<T, AppError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(_) => "failure",
    }
}

/// Register a new account
///
/// New accounts always get the `regular` role.
#[utoipa::path(
    post,
    path = "/api/auth/sign_up",
    tag = "auth",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody),
    )
)]
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    context: RequestContext,
    Validated(request): Validated<SignUpRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let result = state.identity.sign_up(request, &context).await;
    state.metrics.record_auth("sign_up", outcome(&result));

    Ok((StatusCode::CREATED, Json(result?)))
}

/// Sign in with email and password
#[utoipa::path(
    post,
    path = "/api/auth/sign_in",
    tag = "auth",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = TokenResponse),
        (status = 400, description = "Wrong email/password combination", body = ErrorBody),
    )
)]
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    context: RequestContext,
    Validated(request): Validated<SignInRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let result = state.identity.sign_in(request, &context).await;
    state.metrics.record_auth("sign_in", outcome(&result));

    Ok(Json(result?))
}

/// Join a community and receive an updated credential
#[utoipa::path(
    get,
    path = "/api/auth/join/communities/{communityId}",
    tag = "auth",
    params(("communityId" = i64, Path, description = "Community to join")),
    responses(
        (status = 200, description = "Joined", body = AuthResponse),
        (status = 401, description = "Missing or invalid credential", body = ErrorBody),
        (status = 404, description = "Unknown community", body = ErrorBody),
    ),
    security(("bearer_auth" = []))
)]
pub async fn join_community(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    context: RequestContext,
    Path(community_id): Path<String>,
) -> Result<Json<AuthResponse>, AppError> {
    let community_id = record_id(&community_id, COMMUNITY_NOT_FOUND)?;

    let result = state
        .membership
        .join_community(&principal.claims, community_id, &context)
        .await;
    state.metrics.record_auth("join_community", outcome(&result));

    Ok(Json(result?))
}

/// Join an association and receive an updated credential
#[utoipa::path(
    get,
    path = "/api/auth/join/associations/{associationId}",
    tag = "auth",
    params(("associationId" = i64, Path, description = "Association to join")),
    responses(
        (status = 200, description = "Joined", body = AuthResponse),
        (status = 400, description = "Outside the association's community", body = ErrorBody),
        (status = 401, description = "Missing or invalid credential", body = ErrorBody),
        (status = 404, description = "Unknown association", body = ErrorBody),
    ),
    security(("bearer_auth" = []))
)]
pub async fn join_association(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    context: RequestContext,
    Path(association_id): Path<String>,
) -> Result<Json<AuthResponse>, AppError> {
    let association_id = record_id(&association_id, ASSOCIATION_NOT_FOUND)?;

    let result = state
        .membership
        .join_association(&principal.claims, association_id, &context)
        .await;
    state.metrics.record_auth("join_association", outcome(&result));

    Ok(Json(result?))
}
