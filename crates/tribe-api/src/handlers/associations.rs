//! Association handlers
//!
//! An association is created under the actor's current community and
//! chaired by the actor.

use super::{non_empty, record_id, store_error, UpdateEntityRequest};
use crate::auth::{InputRules, Principal, Validated};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tribe_core::{Association, EntityProfile, NewAssociation, RecordKind};
use utoipa::ToSchema;
use validator::Validate;

pub const UNKNOWN_ASSOCIATION: &str = "The association with that Id is not found";
pub const COMMUNITY_REQUIRED: &str = "You must be part of a community to create an association";
pub const OWN_COMMUNITY_MISSING: &str = "Your community is not in our database";
pub const ASSOCIATION_NAME_EMPTY: &str = "Association name cannot be empty";

/// Creation body; the name is checked after the actor's community
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct CreateAssociationRequest {
    pub name: String,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl InputRules for CreateAssociationRequest {
    const FIELD_ORDER: &'static [&'static str] = &[];

    fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AssociationResponse {
    pub association: Association,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AssociationsResponse {
    pub associations: Vec<Association>,
}

#[utoipa::path(
    get,
    path = "/api/associations",
    tag = "associations",
    responses((status = 200, description = "All associations", body = AssociationsResponse)),
    security(("bearer_auth" = []))
)]
pub async fn list_associations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AssociationsResponse>, AppError> {
    let associations = state.store.list_associations().await?;
    Ok(Json(AssociationsResponse { associations }))
}

#[utoipa::path(
    post,
    path = "/api/associations",
    tag = "associations",
    request_body = CreateAssociationRequest,
    responses(
        (status = 201, description = "Association created", body = AssociationResponse),
        (status = 400, description = "No community membership or empty name", body = ErrorBody),
        (status = 404, description = "Actor's community no longer exists", body = ErrorBody),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_association(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Validated(request): Validated<CreateAssociationRequest>,
) -> Result<(StatusCode, Json<AssociationResponse>), AppError> {
    let community_id = principal
        .claims
        .community_id
        .ok_or_else(|| AppError::BadRequest(COMMUNITY_REQUIRED.to_string()))?;

    if !state.store.exists(RecordKind::Community, community_id).await? {
        return Err(AppError::NotFound(OWN_COMMUNITY_MISSING.to_string()));
    }

    if request.name.is_empty() {
        return Err(AppError::Validation(ASSOCIATION_NAME_EMPTY.to_string()));
    }

    let association = state
        .store
        .create_association(NewAssociation {
            community_id,
            chairman: principal.claims.name,
            profile: EntityProfile {
                name: request.name,
                description: non_empty(request.description),
                image: non_empty(request.image),
            },
        })
        .await
        .map_err(|e| store_error(e, OWN_COMMUNITY_MISSING))?;

    tracing::info!(
        association_id = association.id,
        community_id,
        "Association created"
    );
    Ok((StatusCode::CREATED, Json(AssociationResponse { association })))
}

#[utoipa::path(
    get,
    path = "/api/associations/{associationId}",
    tag = "associations",
    params(("associationId" = i64, Path, description = "Association id")),
    responses(
        (status = 200, description = "Association", body = AssociationResponse),
        (status = 404, description = "Unknown association", body = ErrorBody),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_association(
    State(state): State<Arc<AppState>>,
    Path(association_id): Path<String>,
) -> Result<Json<AssociationResponse>, AppError> {
    let id = record_id(&association_id, UNKNOWN_ASSOCIATION)?;

    let association = state
        .store
        .find_association(id)
        .await?
        .ok_or_else(|| AppError::NotFound(UNKNOWN_ASSOCIATION.to_string()))?;

    Ok(Json(AssociationResponse { association }))
}

#[utoipa::path(
    put,
    path = "/api/associations/{associationId}",
    tag = "associations",
    params(("associationId" = i64, Path, description = "Association id")),
    request_body = UpdateEntityRequest,
    responses(
        (status = 200, description = "Association updated", body = AssociationResponse),
        (status = 403, description = "Missing manage_associations capability", body = ErrorBody),
        (status = 404, description = "Unknown association", body = ErrorBody),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_association(
    State(state): State<Arc<AppState>>,
    Path(association_id): Path<String>,
    Validated(request): Validated<UpdateEntityRequest>,
) -> Result<Json<AssociationResponse>, AppError> {
    let id = record_id(&association_id, UNKNOWN_ASSOCIATION)?;

    let association = state
        .store
        .update_association(id, request.into())
        .await
        .map_err(|e| store_error(e, UNKNOWN_ASSOCIATION))?;

    Ok(Json(AssociationResponse { association }))
}

#[utoipa::path(
    delete,
    path = "/api/associations/{associationId}",
    tag = "associations",
    params(("associationId" = i64, Path, description = "Association id")),
    responses(
        (status = 200, description = "Association deleted"),
        (status = 403, description = "Missing manage_associations capability", body = ErrorBody),
        (status = 404, description = "Unknown association", body = ErrorBody),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_association(
    State(state): State<Arc<AppState>>,
    Path(association_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = record_id(&association_id, UNKNOWN_ASSOCIATION)?;

    if !state.store.delete_association(id).await? {
        return Err(AppError::NotFound(UNKNOWN_ASSOCIATION.to_string()));
    }

    tracing::info!(association_id = id, "Association deleted");
    Ok(Json(serde_json::json!({})))
}
