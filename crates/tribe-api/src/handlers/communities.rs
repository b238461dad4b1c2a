//! Community handlers
//!
//! Thin wrappers over the store. Creation and management are gated by
//! capability in the router, not here.

use super::{non_empty, record_id, store_error, UpdateEntityRequest};
use crate::auth::{InputRules, Validated};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tribe_core::{Community, EntityProfile};
use utoipa::ToSchema;
use validator::Validate;

pub const UNKNOWN_COMMUNITY: &str = "The community with that Id is not found";

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct CreateCommunityRequest {
    #[validate(length(min = 1, message = "Community name cannot be empty"))]
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl InputRules for CreateCommunityRequest {
    const FIELD_ORDER: &'static [&'static str] = &["name"];

    fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommunityResponse {
    pub community: Community,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommunitiesResponse {
    pub communities: Vec<Community>,
}

#[utoipa::path(
    get,
    path = "/api/communities",
    tag = "communities",
    responses((status = 200, description = "All communities", body = CommunitiesResponse)),
    security(("bearer_auth" = []))
)]
pub async fn list_communities(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CommunitiesResponse>, AppError> {
    let communities = state.store.list_communities().await?;
    Ok(Json(CommunitiesResponse { communities }))
}

#[utoipa::path(
    post,
    path = "/api/communities",
    tag = "communities",
    request_body = CreateCommunityRequest,
    responses(
        (status = 201, description = "Community created", body = CommunityResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 403, description = "Missing create_community capability", body = ErrorBody),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_community(
    State(state): State<Arc<AppState>>,
    Validated(request): Validated<CreateCommunityRequest>,
) -> Result<(StatusCode, Json<CommunityResponse>), AppError> {
    let community = state
        .store
        .create_community(EntityProfile {
            name: request.name,
            description: non_empty(request.description),
            image: non_empty(request.image),
        })
        .await?;

    tracing::info!(community_id = community.id, "Community created");
    Ok((StatusCode::CREATED, Json(CommunityResponse { community })))
}

#[utoipa::path(
    get,
    path = "/api/communities/{communityId}",
    tag = "communities",
    params(("communityId" = i64, Path, description = "Community id")),
    responses(
        (status = 200, description = "Community", body = CommunityResponse),
        (status = 404, description = "Unknown community", body = ErrorBody),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_community(
    State(state): State<Arc<AppState>>,
    Path(community_id): Path<String>,
) -> Result<Json<CommunityResponse>, AppError> {
    let id = record_id(&community_id, UNKNOWN_COMMUNITY)?;

    let community = state
        .store
        .find_community(id)
        .await?
        .ok_or_else(|| AppError::NotFound(UNKNOWN_COMMUNITY.to_string()))?;

    Ok(Json(CommunityResponse { community }))
}

#[utoipa::path(
    put,
    path = "/api/communities/{communityId}",
    tag = "communities",
    params(("communityId" = i64, Path, description = "Community id")),
    request_body = UpdateEntityRequest,
    responses(
        (status = 200, description = "Community updated", body = CommunityResponse),
        (status = 403, description = "Missing manage_communities capability", body = ErrorBody),
        (status = 404, description = "Unknown community", body = ErrorBody),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_community(
    State(state): State<Arc<AppState>>,
    Path(community_id): Path<String>,
    Validated(request): Validated<UpdateEntityRequest>,
) -> Result<Json<CommunityResponse>, AppError> {
    let id = record_id(&community_id, UNKNOWN_COMMUNITY)?;

    let community = state
        .store
        .update_community(id, request.into())
        .await
        .map_err(|e| store_error(e, UNKNOWN_COMMUNITY))?;

    Ok(Json(CommunityResponse { community }))
}

/// Delete a community with its associations
#[utoipa::path(
    delete,
    path = "/api/communities/{communityId}",
    tag = "communities",
    params(("communityId" = i64, Path, description = "Community id")),
    responses(
        (status = 200, description = "Community deleted"),
        (status = 403, description = "Missing manage_communities capability", body = ErrorBody),
        (status = 404, description = "Unknown community", body = ErrorBody),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_community(
    State(state): State<Arc<AppState>>,
    Path(community_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = record_id(&community_id, UNKNOWN_COMMUNITY)?;

    if !state.store.delete_community(id).await? {
        return Err(AppError::NotFound(UNKNOWN_COMMUNITY.to_string()));
    }

    tracing::info!(community_id = id, "Community deleted");
    Ok(Json(serde_json::json!({})))
}
