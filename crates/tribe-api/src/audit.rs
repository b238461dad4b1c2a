//! Security audit logging
//!
//! Every authentication and authorization decision worth reviewing later is
//! written as a structured event on the "audit" tracing target, so it can be
//! filtered and routed apart from application logs. Internal failure reasons
//! (which check rejected a credential, whether an email was unknown) are
//! recorded here and nowhere else.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::info;
use tribe_core::{Capability, RecordId, RecordKind};

/// Security audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    SignUpSuccess {
        account_id: RecordId,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    SignUpFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    SignInSuccess {
        account_id: RecordId,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// `reason` distinguishes unknown email from wrong password
    SignInFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Malformed, forged or expired credential presented
    CredentialRejected {
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    AccessDenied {
        account_id: RecordId,
        email: String,
        required_capability: Capability,
        resource: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    MembershipJoined {
        account_id: RecordId,
        target_kind: String,
        target_id: RecordId,
        ip_address: Option<String>,
    },
}

impl AuditEvent {
    pub fn membership_joined(
        account_id: RecordId,
        kind: RecordKind,
        target_id: RecordId,
        context: &RequestContext,
    ) -> Self {
        AuditEvent::MembershipJoined {
            account_id,
            target_kind: kind.to_string(),
            target_id,
            ip_address: context.ip_address.clone(),
        }
    }

    fn summary(&self) -> &'static str {
        match self {
            AuditEvent::SignUpSuccess { .. } => "Sign-up successful",
            AuditEvent::SignUpFailure { .. } => "Sign-up failed",
            AuditEvent::SignInSuccess { .. } => "Sign-in successful",
            AuditEvent::SignInFailure { .. } => "Sign-in failed",
            AuditEvent::CredentialRejected { .. } => "Credential rejected",
            AuditEvent::AccessDenied { .. } => "Access denied",
            AuditEvent::MembershipJoined { .. } => "Membership joined",
        }
    }

    fn ip_address(&self) -> Option<&str> {
        match self {
            AuditEvent::SignUpSuccess { ip_address, .. }
            | AuditEvent::SignUpFailure { ip_address, .. }
            | AuditEvent::SignInSuccess { ip_address, .. }
            | AuditEvent::SignInFailure { ip_address, .. }
            | AuditEvent::CredentialRejected { ip_address, .. }
            | AuditEvent::AccessDenied { ip_address, .. }
            | AuditEvent::MembershipJoined { ip_address, .. } => ip_address.as_deref(),
        }
    }
}

/// Log a security audit event at INFO on the "audit" target
///
/// The whole event is serialized to JSON in the `event` field so log
/// aggregators get one self-describing record.
pub fn audit_log(event: &AuditEvent) {
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    info!(
        target: "audit",
        event = %event_json,
        ip_address = ?event.ip_address(),
        "{}",
        event.summary()
    );
}

/// Client metadata captured for audit events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Client IP from `x-forwarded-for` (first hop) or `x-real-ip`
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(first_ip) = xff_str.split(',').next() {
                let first_ip = first_ip.trim();
                if !first_ip.is_empty() {
                    return Some(first_ip.to_string());
                }
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|ip| ip.to_str().ok())
        .map(|s| s.trim().to_string())
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}
