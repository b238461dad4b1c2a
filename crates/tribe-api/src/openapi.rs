//! OpenAPI document

use crate::auth::{AuthResponse, SignInRequest, SignUpRequest, TokenResponse};
use crate::error::ErrorBody;
use crate::handlers::{
    self,
    associations::{AssociationResponse, AssociationsResponse, CreateAssociationRequest},
    communities::{CommunitiesResponse, CommunityResponse, CreateCommunityRequest},
    health::{HealthResponse, ReadinessChecks, ReadinessResponse, WelcomeResponse},
    UpdateEntityRequest,
};
use tribe_core::{AccountView, Association, Capability, Community, Role};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "tribe API",
        description = "Sign-up, sign-in and membership credentials for communities and associations"
    ),
    paths(
        handlers::health::welcome,
        handlers::health::health_check,
        handlers::health::readiness_check,
        handlers::auth::sign_up,
        handlers::auth::sign_in,
        handlers::auth::join_community,
        handlers::auth::join_association,
        handlers::communities::list_communities,
        handlers::communities::create_community,
        handlers::communities::get_community,
        handlers::communities::update_community,
        handlers::communities::delete_community,
        handlers::associations::list_associations,
        handlers::associations::create_association,
        handlers::associations::get_association,
        handlers::associations::update_association,
        handlers::associations::delete_association,
    ),
    components(schemas(
        ErrorBody,
        Role,
        Capability,
        AccountView,
        Community,
        Association,
        SignUpRequest,
        SignInRequest,
        AuthResponse,
        TokenResponse,
        CreateCommunityRequest,
        CreateAssociationRequest,
        UpdateEntityRequest,
        CommunityResponse,
        CommunitiesResponse,
        AssociationResponse,
        AssociationsResponse,
        WelcomeResponse,
        HealthResponse,
        ReadinessResponse,
        ReadinessChecks,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Liveness and readiness"),
        (name = "auth", description = "Credentials and membership"),
        (name = "communities", description = "Communities"),
        (name = "associations", description = "Associations"),
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
