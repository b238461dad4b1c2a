//! Input validation for request bodies
//!
//! [`Validated`] parses a JSON body, normalizes it and runs its `validator`
//! rules before the handler sees it. Only the first failing field is
//! reported, in the order given by [`InputRules::FIELD_ORDER`].

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::error::{AppError, INVALID_BODY};

/// Per-payload validation policy
pub trait InputRules: DeserializeOwned + Validate + Send {
    /// Fields in the order their failures take precedence
    const FIELD_ORDER: &'static [&'static str];

    /// Canonicalize fields before the rules run
    fn normalize(&mut self) {}

    /// Error for a body that is not valid JSON for this payload
    fn rejection(_err: &JsonRejection) -> AppError {
        AppError::Validation(INVALID_BODY.to_string())
    }

    /// Error for the first failing rule
    fn failure(message: String) -> AppError {
        AppError::Validation(message)
    }

    /// Normalize, then apply the rules
    fn checked(mut self) -> Result<Self, AppError>
    where
        Self: Sized,
    {
        self.normalize();

        if let Err(errors) = self.validate() {
            let message = first_failure(&errors, Self::FIELD_ORDER);
            tracing::debug!(%message, "Input failed validation");
            return Err(Self::failure(message));
        }

        Ok(self)
    }
}

/// Extractor yielding a body that passed its [`InputRules`]
#[derive(Debug, Clone)]
pub struct Validated<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Validated<T>
where
    T: InputRules,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|e| {
            tracing::debug!(error = %e, "Request body rejected");
            T::rejection(&e)
        })?;

        value.checked().map(Validated)
    }
}

/// Message of the first failing field in `order`
pub fn first_failure(errors: &ValidationErrors, order: &[&str]) -> String {
    let field_errors = errors.field_errors();

    order
        .iter()
        .filter_map(|field| field_errors.get(*field))
        .filter_map(|errs| errs.first())
        .map(|err| match &err.message {
            Some(message) => message.to_string(),
            None => err.code.to_string(),
        })
        .next()
        .unwrap_or_else(|| INVALID_BODY.to_string())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Sign-up payload
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct SignUpRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password length must be at least 8"))]
    pub password: String,
}

impl InputRules for SignUpRequest {
    const FIELD_ORDER: &'static [&'static str] = &["name", "email", "password"];

    fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        self.email = normalize_email(&self.email);
    }
}

/// Sign-in payload
///
/// Every failure here reports the same message as a password mismatch, so a
/// malformed request tells the caller nothing an honest mismatch would not.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct SignInRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

impl InputRules for SignInRequest {
    const FIELD_ORDER: &'static [&'static str] = &["email", "password"];

    fn normalize(&mut self) {
        self.email = normalize_email(&self.email);
    }

    fn rejection(_err: &JsonRejection) -> AppError {
        AppError::InvalidCredentials
    }

    fn failure(_message: String) -> AppError {
        AppError::InvalidCredentials
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::header};
    use proptest::prelude::*;

    fn sign_up(name: &str, email: &str, password: &str) -> SignUpRequest {
        let mut request = SignUpRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        request.normalize();
        request
    }

    fn check(request: &SignUpRequest) -> Result<(), String> {
        request
            .validate()
            .map_err(|errors| first_failure(&errors, SignUpRequest::FIELD_ORDER))
    }

    async fn extract<T: InputRules>(body: &str) -> Result<T, AppError> {
        let request = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        Validated::<T>::from_request(request, &())
            .await
            .map(|Validated(value)| value)
    }

    #[test]
    fn test_valid_sign_up() {
        let request = sign_up("John Doe", "johndoe@example.com", "password1");
        assert_eq!(check(&request), Ok(()));
    }

    #[test]
    fn test_sign_up_messages() {
        assert_eq!(
            check(&sign_up("", "johndoe@example.com", "password1")),
            Err("Name cannot be empty".to_string())
        );
        assert_eq!(
            check(&sign_up("John Doe", "emaemail", "password1")),
            Err("Invalid email address".to_string())
        );
        assert_eq!(
            check(&sign_up("John Doe", "johndoe@example.com", "short")),
            Err("Password length must be at least 8".to_string())
        );
    }

    #[test]
    fn test_first_failure_follows_field_order() {
        assert_eq!(
            check(&sign_up("   ", "bad", "x")),
            Err("Name cannot be empty".to_string())
        );
        assert_eq!(
            check(&sign_up("John Doe", "", "")),
            Err("Invalid email address".to_string())
        );
    }

    #[test]
    fn test_email_normalized() {
        let request = sign_up(" John Doe ", "  JohnDoe@Example.COM ", "password1");
        assert_eq!(request.name, "John Doe");
        assert_eq!(request.email, "johndoe@example.com");
    }

    #[tokio::test]
    async fn test_missing_fields_read_as_empty() {
        let result = extract::<SignUpRequest>(r#"{"email":"johndoe@example.com"}"#).await;
        assert_eq!(
            result.unwrap_err(),
            AppError::Validation("Name cannot be empty".to_string())
        );
    }

    #[tokio::test]
    async fn test_unparseable_sign_up_body() {
        let result = extract::<SignUpRequest>("{not json").await;
        assert_eq!(
            result.unwrap_err(),
            AppError::Validation(INVALID_BODY.to_string())
        );
    }

    #[tokio::test]
    async fn test_sign_in_failures_are_uniform() {
        for body in [
            "{not json",
            r#"{"email":"emaemail","password":"password1"}"#,
            r#"{"email":"johndoe@example.com"}"#,
            r#"{}"#,
        ] {
            let result = extract::<SignInRequest>(body).await;
            assert_eq!(result.unwrap_err(), AppError::InvalidCredentials, "body: {body}");
        }
    }

    #[tokio::test]
    async fn test_sign_in_passes_structurally_valid_body() {
        let request = extract::<SignInRequest>(
            r#"{"email":"JohnDoe@example.com","password":"anything"}"#,
        )
        .await
        .unwrap();
        assert_eq!(request.email, "johndoe@example.com");
    }

    #[test]
    fn test_checked_rejects_incomplete_addresses() {
        for email in ["root@", "@", "@example.com"] {
            let request = SignUpRequest {
                name: "Root".to_string(),
                email: email.to_string(),
                password: "password1".to_string(),
            };
            assert_eq!(
                request.checked().unwrap_err(),
                AppError::Validation("Invalid email address".to_string()),
                "email: {email}"
            );
        }
    }

    #[test]
    fn test_checked_returns_normalized_input() {
        let request = SignUpRequest {
            name: "  Root ".to_string(),
            email: " Root@Example.com".to_string(),
            password: "password1".to_string(),
        }
        .checked()
        .unwrap();

        assert_eq!(request.name, "Root");
        assert_eq!(request.email, "root@example.com");
    }

    proptest! {
        #[test]
        fn short_passwords_always_rejected(password in "[a-zA-Z0-9]{0,7}") {
            let request = sign_up("John Doe", "johndoe@example.com", &password);
            prop_assert_eq!(
                check(&request),
                Err("Password length must be at least 8".to_string())
            );
        }

        #[test]
        fn blank_names_always_rejected(name in "[ \t]{0,6}", password in ".{0,20}") {
            let request = sign_up(&name, "not-an-email", &password);
            prop_assert_eq!(check(&request), Err("Name cannot be empty".to_string()));
        }

        #[test]
        fn long_enough_passwords_accepted(password in "[a-zA-Z0-9!@#]{8,64}") {
            let request = sign_up("John Doe", "johndoe@example.com", &password);
            prop_assert_eq!(check(&request), Ok(()));
        }
    }
}
