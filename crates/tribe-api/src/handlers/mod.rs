//! API handlers

pub mod associations;
pub mod auth;
pub mod communities;
pub mod health;

use crate::auth::InputRules;
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use tribe_core::{ProfileChanges, RecordId, StoreError};
use utoipa::ToSchema;
use validator::Validate;

/// Parse a path id; text that is not an integer names no record
pub(crate) fn record_id(raw: &str, not_found: &str) -> Result<RecordId, AppError> {
    raw.trim()
        .parse::<RecordId>()
        .map_err(|_| AppError::NotFound(not_found.to_string()))
}

/// Map a store miss to the route's own not-found message
pub(crate) fn store_error(err: StoreError, not_found: &str) -> AppError {
    match err {
        StoreError::NotFound { .. } => AppError::NotFound(not_found.to_string()),
        other => other.into(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Partial update body for a community or association
///
/// Missing or empty fields keep the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct UpdateEntityRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

impl InputRules for UpdateEntityRequest {
    const FIELD_ORDER: &'static [&'static str] = &[];
}

impl From<UpdateEntityRequest> for ProfileChanges {
    fn from(request: UpdateEntityRequest) -> Self {
        ProfileChanges {
            name: non_empty(request.name),
            description: non_empty(request.description),
            image: non_empty(request.image),
        }
    }
}
