//! Extractor for the per-request vendor credentials.
//!
//! Resource routes are stateless: the console sends its access token,
//! contract ID and environment on every call.

use axum::{extract::FromRequestParts, http::request::Parts};
use display_toggle_core::Environment;
use display_toggle_core::wire::{ACCESS_TOKEN_HEADER, CONTRACT_ID_HEADER, ENVIRONMENT_HEADER};
use secrecy::SecretString;

use crate::error::GatewayError;
use crate::smaregi::VendorSession;

/// Extractor that requires all three credential headers.
///
/// Any missing or empty header rejects with 401. An environment other than
/// `dev` or `prod` rejects with 400.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireVendorSession(session): RequireVendorSession) -> impl IntoResponse {
///     format!("contract {}", session.contract_id)
/// }
/// ```
pub struct RequireVendorSession(pub VendorSession);

impl<S> FromRequestParts<S> for RequireVendorSession
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let (Some(access_token), Some(contract_id), Some(environment)) = (
            header(ACCESS_TOKEN_HEADER),
            header(CONTRACT_ID_HEADER),
            header(ENVIRONMENT_HEADER),
        ) else {
            tracing::debug!("Rejecting request without credential headers");
            return Err(GatewayError::MissingCredentials);
        };

        let environment: Environment = environment
            .parse()
            .map_err(|e: display_toggle_core::EnvironmentError| {
                GatewayError::validation(e.to_string())
            })?;

        Ok(Self(VendorSession {
            access_token: SecretString::from(access_token.to_string()),
            contract_id: contract_id.to_string(),
            environment,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{Request, StatusCode};

    use super::*;

    async fn extract(headers: &[(&str, &str)]) -> Result<VendorSession, GatewayError> {
        let mut builder = Request::builder().uri("/products");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (mut parts, ()) = builder.body(()).unwrap().into_parts();
        RequireVendorSession::from_request_parts(&mut parts, &())
            .await
            .map(|RequireVendorSession(session)| session)
    }

    #[tokio::test]
    async fn test_extracts_session() {
        let session = extract(&[
            (ACCESS_TOKEN_HEADER, "tok"),
            (CONTRACT_ID_HEADER, "skaa0001"),
            (ENVIRONMENT_HEADER, "prod"),
        ])
        .await
        .unwrap();

        assert_eq!(session.contract_id, "skaa0001");
        assert_eq!(session.environment, Environment::Prod);
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let err = extract(&[(ACCESS_TOKEN_HEADER, "tok"), (ENVIRONMENT_HEADER, "dev")])
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_empty_header_is_unauthorized() {
        let err = extract(&[
            (ACCESS_TOKEN_HEADER, ""),
            (CONTRACT_ID_HEADER, "skaa0001"),
            (ENVIRONMENT_HEADER, "dev"),
        ])
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_environment_is_bad_request() {
        let err = extract(&[
            (ACCESS_TOKEN_HEADER, "tok"),
            (CONTRACT_ID_HEADER, "skaa0001"),
            (ENVIRONMENT_HEADER, "staging"),
        ])
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
