//! API route definitions
//!
//! Every route except sign-up and sign-in passes the credential validator.
//! Routes that need more than a valid credential also pass a capability gate.

use crate::auth::{credential_validator, require_capability};
use crate::handlers::{associations, auth, communities};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post, put, MethodRouter},
    Router,
};
use std::sync::Arc;
use tribe_core::Capability;

/// Routes mounted under `/api`
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no credential required)
    let public_routes = Router::new()
        .route("/auth/sign_up", post(auth::sign_up))
        .route("/auth/sign_in", post(auth::sign_in));

    // Protected routes (credential required)
    let protected_routes = Router::new()
        .route(
            "/auth/join/communities/:communityId",
            gated(get(auth::join_community), Capability::JoinCommunity),
        )
        .route(
            "/auth/join/associations/:associationId",
            gated(get(auth::join_association), Capability::JoinAssociation),
        )
        // Communities
        .route(
            "/communities",
            get(communities::list_communities).merge(gated(
                post(communities::create_community),
                Capability::CreateCommunity,
            )),
        )
        .route(
            "/communities/:communityId",
            get(communities::get_community).merge(gated(
                put(communities::update_community).delete(communities::delete_community),
                Capability::ManageCommunities,
            )),
        )
        // Associations
        .route(
            "/associations",
            get(associations::list_associations).merge(gated(
                post(associations::create_association),
                Capability::CreateAssociation,
            )),
        )
        .route(
            "/associations/:associationId",
            get(associations::get_association).merge(gated(
                put(associations::update_association).delete(associations::delete_association),
                Capability::ManageAssociations,
            )),
        )
        .route_layer(middleware::from_fn_with_state(state, credential_validator));

    Router::new().merge(public_routes).merge(protected_routes)
}

/// Put `route` behind the role gate for `capability`
fn gated(
    route: MethodRouter<Arc<AppState>>,
    capability: Capability,
) -> MethodRouter<Arc<AppState>> {
    route.route_layer(middleware::from_fn(require_capability(capability)))
}
