//! Credential exchange route.

use std::collections::BTreeMap;

use axum::{Json, body::Bytes, extract::State};
use display_toggle_core::{
    Environment, EnvironmentError,
    wire::{AuthRequest, AuthSuccess},
};
use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use super::parse_body;
use crate::error::{GatewayError, Result};
use crate::state::AppState;

/// Exchange a contract's client credentials for an access token.
///
/// All four fields are required; when any is missing the 400 response lists
/// which ones arrived under `received`.
#[instrument(skip_all)]
pub async fn exchange(State(state): State<AppState>, body: Bytes) -> Result<Json<AuthSuccess>> {
    let request: AuthRequest = parse_body(&body)?;
    let client_secret = SecretString::from(request.client_secret);

    let received = BTreeMap::from([
        ("contractId", !request.contract_id.is_empty()),
        ("clientId", !request.client_id.is_empty()),
        ("clientSecret", !client_secret.expose_secret().is_empty()),
        ("environment", !request.environment.is_empty()),
    ]);
    if received.values().any(|present| !present) {
        return Err(GatewayError::Validation {
            message: "Missing required fields.".to_string(),
            received: Some(received),
        });
    }

    let environment: Environment = request
        .environment
        .parse()
        .map_err(|e: EnvironmentError| GatewayError::validation(e.to_string()))?;

    tracing::info!(
        contract_id = %request.contract_id,
        environment = %environment,
        "Exchanging client credentials"
    );

    let grant = state
        .smaregi()
        .exchange_token(
            environment,
            &request.contract_id,
            &request.client_id,
            &client_secret,
        )
        .await?;

    Ok(Json(AuthSuccess {
        success: true,
        access_token: grant.access_token.expose_secret().to_string(),
        expires_in: grant.expires_in,
        token_type: grant.token_type,
        scope: grant.scope,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header::AUTHORIZATION};
    use axum::routing::post;
    use axum::{Form, Router};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::routes::routes;
    use crate::test_support::{offline_state, read_json, spawn_vendor, state_for};

    fn auth_request(body: &Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/auth")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// Identity endpoint that accepts `id:secret` for contract `c1`.
    fn identity() -> Router {
        Router::new().route(
            "/app/{contract}/token",
            post(
                |axum::extract::Path(contract): axum::extract::Path<String>,
                 headers: axum::http::HeaderMap,
                 Form(form): Form<BTreeMap<String, String>>| async move {
                    // "id:secret"
                    let expected = "Basic aWQ6c2VjcmV0";
                    let auth = headers
                        .get(AUTHORIZATION)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default();
                    if contract != "c1" || auth != expected {
                        return (
                            StatusCode::UNAUTHORIZED,
                            Json(json!({
                                "error": "invalid_client",
                                "error_description": "Client authentication failed"
                            })),
                        );
                    }
                    (
                        StatusCode::OK,
                        Json(json!({
                            "access_token": "tok-abc",
                            "expires_in": 3600,
                            "token_type": "Bearer",
                            "scope": form.get("scope"),
                            "grant_type": form.get("grant_type"),
                        })),
                    )
                },
            ),
        )
    }

    #[tokio::test]
    async fn test_missing_fields_report_received() {
        let response = routes()
            .with_state(offline_state())
            .oneshot(auth_request(&json!({"contractId": "c1", "environment": "dev"})))
            .await
            .unwrap();

        let (status, body) = read_json(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["received"],
            json!({
                "clientId": false,
                "clientSecret": false,
                "contractId": true,
                "environment": true,
            })
        );
    }

    #[tokio::test]
    async fn test_unknown_environment_is_rejected() {
        let response = routes()
            .with_state(offline_state())
            .oneshot(auth_request(&json!({
                "contractId": "c1",
                "clientId": "id",
                "clientSecret": "secret",
                "environment": "staging",
            })))
            .await
            .unwrap();

        let (status, body) = read_json(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("staging"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let response = routes()
            .with_state(offline_state())
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/auth")
                    .body(Body::from("{\"contractId\":"))
                    .unwrap(),
            )
            .await
            .unwrap();

        let (status, body) = read_json(response).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .starts_with("Failed to parse request body")
        );
    }

    #[tokio::test]
    async fn test_exchange_success() {
        let vendor = spawn_vendor(identity()).await;
        let response = routes()
            .with_state(state_for(&vendor))
            .oneshot(auth_request(&json!({
                "contractId": "c1",
                "clientId": "id",
                "clientSecret": "secret",
                "environment": "prod",
            })))
            .await
            .unwrap();

        let (status, body) = read_json(response).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["access_token"], "tok-abc");
        assert_eq!(body["expires_in"], 3600);
        assert!(body["scope"].as_str().unwrap().contains("pos.products:write"));
    }

    #[tokio::test]
    async fn test_vendor_rejection_passes_status_and_description() {
        let vendor = spawn_vendor(identity()).await;
        let response = routes()
            .with_state(state_for(&vendor))
            .oneshot(auth_request(&json!({
                "contractId": "c1",
                "clientId": "id",
                "clientSecret": "wrong",
                "environment": "dev",
            })))
            .await
            .unwrap();

        let (status, body) = read_json(response).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Client authentication failed");
    }
}
