//! Authentication and authorization
//!
//! - Credential codec (JWT, HS256)
//! - Password hashing with Argon2id
//! - Request body validation
//! - Credential validator and role gate middleware
//! - Identity (sign-up, sign-in) and membership (join) services

pub mod jwt;
pub mod membership;
pub mod middleware;
pub mod password;
pub mod service;
pub mod validation;

pub use jwt::{Claims, CodecError, CredentialCodec};
pub use membership::{
    MembershipService, ASSOCIATION_NOT_FOUND, COMMUNITY_NOT_FOUND, OUTSIDE_ASSOCIATION_COMMUNITY,
};
pub use middleware::{
    authenticate, authorize, credential_validator, extract_bearer, require_capability, Principal,
};
pub use password::{hash_password_with_config, verify_password, PasswordConfig, PasswordError};
pub use service::{AuthResponse, IdentityService, TokenResponse};
pub use validation::{InputRules, SignInRequest, SignUpRequest, Validated};
