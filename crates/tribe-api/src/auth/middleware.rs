//! Credential validation and role gating
//!
//! `credential_validator` guards every protected route: it verifies the
//! bearer credential and stores the resulting [`Principal`] in the request
//! extensions. `require_capability` runs after it and admits only principals
//! whose role grants the capability the route needs.

use super::jwt::{Claims, CredentialCodec};
use crate::audit::{audit_log, AuditEvent, RequestContext};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tribe_core::{Capability, Role};

/// Verified identity attached to a request
///
/// Extract it in handlers behind `credential_validator`:
///
/// ```ignore
/// async fn handler(principal: Principal) -> String {
///     format!("Hello, {}!", principal.claims.name)
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub claims: Claims,
}

impl Principal {
    pub fn role(&self) -> Role {
        self.claims.role
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(AppError::Unauthenticated)
    }
}

/// Bearer token from the `authorization` header
///
/// The scheme name is case-insensitive. A missing header, another scheme or
/// an empty token count as no credential at all.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AppError::Unauthenticated)?
        .to_str()
        .map_err(|_| AppError::InvalidCredential)?;

    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AppError::Unauthenticated)?;

    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AppError::Unauthenticated);
    }

    Ok(token)
}

/// Verify the request's credential
///
/// Rejections are audited with the internal reason; the caller only ever
/// sees `InvalidCredential`.
pub fn authenticate(
    codec: &CredentialCodec,
    headers: &HeaderMap,
    context: &RequestContext,
) -> Result<Principal, AppError> {
    let token = extract_bearer(headers)?;

    match codec.verify(token) {
        Ok(claims) => Ok(Principal { claims }),
        Err(e) => {
            audit_log(&AuditEvent::CredentialRejected {
                reason: e.to_string(),
                ip_address: context.ip_address.clone(),
                user_agent: context.user_agent.clone(),
            });
            Err(e.into())
        }
    }
}

/// Middleware requiring a valid credential
///
/// ```ignore
/// let protected = Router::new()
///     .route("/api/communities", get(list_communities))
///     .route_layer(middleware::from_fn_with_state(state.clone(), credential_validator));
/// ```
pub async fn credential_validator(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let context = RequestContext::from_headers(request.headers());

    let principal = match authenticate(&state.codec, request.headers(), &context) {
        Ok(principal) => principal,
        Err(e) => {
            state.metrics.record_auth("credential", "rejected");
            return Err(e);
        }
    };

    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

/// Role Gate decision: does `claims.role` grant `capability`
pub fn authorize(claims: &Claims, capability: Capability) -> Result<(), AppError> {
    if claims.role.grants(capability) {
        Ok(())
    } else {
        Err(AppError::Forbidden(capability))
    }
}

type GateFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, AppError>> + Send>>;

/// Middleware factory for capability-based access control
///
/// Must sit inside `credential_validator`:
///
/// ```ignore
/// let app = Router::new()
///     .route("/api/communities", post(create_community)
///         .route_layer(middleware::from_fn(require_capability(Capability::CreateCommunity))))
///     .route_layer(middleware::from_fn_with_state(state, credential_validator));
/// ```
pub fn require_capability(
    capability: Capability,
) -> impl Fn(Request<Body>, Next) -> GateFuture + Clone {
    move |request: Request<Body>, next: Next| {
        Box::pin(async move {
            let principal = request
                .extensions()
                .get::<Principal>()
                .cloned()
                .ok_or(AppError::Unauthenticated)?;

            if let Err(denied) = authorize(&principal.claims, capability) {
                let context = RequestContext::from_headers(request.headers());
                audit_log(&AuditEvent::AccessDenied {
                    account_id: principal.claims.id,
                    email: principal.claims.email.clone(),
                    required_capability: capability,
                    resource: format!("{} {}", request.method(), request.uri().path()),
                    ip_address: context.ip_address,
                    user_agent: context.user_agent,
                });
                return Err(denied);
            }

            Ok(next.run(request).await)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn claims(role: Role) -> Claims {
        Claims {
            iss: "tribe".to_string(),
            jti: "jti".to_string(),
            iat: 0,
            exp: 0,
            id: 1,
            name: "John Doe".to_string(),
            email: "johndoe@example.com".to_string(),
            role,
            community_id: None,
            association_id: None,
        }
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(&headers("Bearer abc.def.ghi")), Ok("abc.def.ghi"));
        assert_eq!(extract_bearer(&headers("bearer abc")), Ok("abc"));
    }

    #[test]
    fn test_missing_or_empty_bearer_is_unauthenticated() {
        assert_eq!(extract_bearer(&HeaderMap::new()), Err(AppError::Unauthenticated));
        assert_eq!(extract_bearer(&headers("Bearer ")), Err(AppError::Unauthenticated));
        assert_eq!(extract_bearer(&headers("Basic dXNlcg==")), Err(AppError::Unauthenticated));
        assert_eq!(extract_bearer(&headers("abc.def.ghi")), Err(AppError::Unauthenticated));
    }

    #[test]
    fn test_authenticate_rejects_garbage_uniformly() {
        let codec = CredentialCodec::new(b"secret", "tribe", std::time::Duration::from_secs(60));
        let result = authenticate(&codec, &headers("Bearer not-a-jwt"), &RequestContext::default());
        assert_eq!(result, Err(AppError::InvalidCredential));
    }

    #[test]
    fn test_authorize_by_capability() {
        let regular = claims(Role::Regular);
        let admin = claims(Role::Admin);

        assert_eq!(authorize(&regular, Capability::JoinCommunity), Ok(()));
        assert_eq!(authorize(&regular, Capability::CreateAssociation), Ok(()));
        assert_eq!(
            authorize(&regular, Capability::CreateCommunity),
            Err(AppError::Forbidden(Capability::CreateCommunity))
        );
        assert_eq!(authorize(&admin, Capability::CreateCommunity), Ok(()));
        assert_eq!(authorize(&admin, Capability::ManageAssociations), Ok(()));
    }
}
