//! GraphQL HTTP and WebSocket endpoints
//!
//! Both endpoints resolve the caller's bearer credential before any operation
//! runs. A missing credential just means "no current user"; a credential that
//! fails verification rejects the request (HTTP 401) or refuses the
//! subscription connection.

use async_graphql::http::GraphiQLSource;
use async_graphql::{Data, ErrorExtensions, ServerError};
use async_graphql_axum::{GraphQLProtocol, GraphQLRequest, GraphQLResponse, GraphQLWebSocket};
use axum::Router;
use axum::extract::{State, WebSocketUpgrade};
use axum::http::header::{ACCEPT, AUTHORIZATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;

use crate::app::AppState;
use crate::graphql::{CatalogError, CurrentUser};
use crate::services::{AuthError, AuthService};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/graphql", get(graphiql).post(graphql_handler))
        .route("/graphql/ws", get(graphql_ws_handler))
}

/// Extract bearer token from Authorization header
fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

/// Extract the credential from a `connection_init` payload
fn payload_token(params: &serde_json::Value) -> Option<String> {
    params
        .get("authorization")
        .or_else(|| params.get("Authorization"))
        .and_then(|v| v.as_str())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim().to_string())
}

async fn resolve_user(auth: &AuthService, token: &str) -> Result<Option<CurrentUser>, AuthError> {
    let user = auth.resolve_current_user(token).await?;
    Ok(user.map(CurrentUser))
}

/// Build the response for a request whose credential could not be accepted
fn rejected(err: AuthError) -> Response {
    let status = match err {
        AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::UNAUTHORIZED,
    };

    let err = CatalogError::from(err).extend();
    let mut server_error = ServerError::new(err.message, None);
    server_error.extensions = err.extensions;

    let body = async_graphql::Response::from_errors(vec![server_error]);
    (status, axum::Json(body)).into_response()
}

/// GraphQL query/mutation handler with auth context
async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    req: GraphQLRequest,
) -> Response {
    let mut request = req.into_inner();

    if let Some(token) = extract_token(&headers) {
        match resolve_user(&state.auth, &token).await {
            Ok(Some(user)) => {
                tracing::debug!(user_id = %user.0.id, "Request authenticated");
                request = request.data(user);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Rejecting request with unusable credential");
                return rejected(e);
            }
        }
    }

    GraphQLResponse::from(state.schema.execute(request).await).into_response()
}

/// GraphiQL interactive playground (only for browsers)
async fn graphiql(headers: HeaderMap) -> impl IntoResponse {
    let accepts_html = headers
        .get(ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("text/html"))
        .unwrap_or(false);

    if accepts_html {
        Html(
            GraphiQLSource::build()
                .endpoint("/graphql")
                .subscription_endpoint("/graphql/ws")
                .finish(),
        )
        .into_response()
    } else {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            axum::Json(serde_json::json!({
                "error": "GET requests are not supported for GraphQL queries. Use POST with Content-Type: application/json"
            })),
        )
            .into_response()
    }
}

/// Authenticate a subscription connection.
///
/// The payload credential wins over the upgrade request's header. Returning an
/// error makes the transport refuse the connection.
pub(crate) async fn connection_init(
    auth: AuthService,
    header_token: Option<String>,
    params: serde_json::Value,
) -> async_graphql::Result<Data> {
    let mut data = Data::default();

    let Some(token) = payload_token(&params).or(header_token) else {
        return Ok(data);
    };

    match resolve_user(&auth, &token).await {
        Ok(Some(user)) => {
            tracing::debug!(user_id = %user.0.id, "Subscription connection authenticated");
            data.insert(user);
            Ok(data)
        }
        Ok(None) => Ok(data),
        Err(e) => {
            tracing::warn!(error = %e, "Refusing subscription connection");
            Err(CatalogError::from(e).extend())
        }
    }
}

/// GraphQL WebSocket handler for subscriptions with auth
async fn graphql_ws_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    protocol: GraphQLProtocol,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let header_token = extract_token(&headers);

    ws.protocols(["graphql-transport-ws", "graphql-ws"])
        .on_upgrade(move |socket| {
            let auth = state.auth.clone();
            GraphQLWebSocket::new(socket, state.schema.clone(), protocol)
                .on_connection_init(move |params| connection_init(auth, header_token, params))
                .serve()
        })
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use axum::http::header::CONTENT_TYPE;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::app::{build_app, tests::test_state};
    use crate::db::{CreateUserOutcome, UserRecord};

    async fn register(state: &AppState, username: &str) -> UserRecord {
        match state
            .auth
            .register(username.to_string(), "refactoring".to_string())
            .await
            .unwrap()
        {
            CreateUserOutcome::Created(user) => user,
            CreateUserOutcome::UsernameTaken => panic!("username taken"),
        }
    }

    async fn post(state: &AppState, token: Option<&str>, query: &str) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method("POST")
            .uri("/graphql")
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = request
            .body(Body::from(json!({ "query": query }).to_string()))
            .unwrap();

        let response = build_app(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[test]
    fn test_extract_token_requires_bearer_scheme() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        headers.insert(AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(extract_token(&headers), None);

        headers.insert(AUTHORIZATION, "Bearer abc.def".parse().unwrap());
        assert_eq!(extract_token(&headers), Some("abc.def".to_string()));
    }

    #[test]
    fn test_payload_token_accepts_both_casings() {
        assert_eq!(
            payload_token(&json!({ "authorization": "Bearer lower" })),
            Some("lower".to_string())
        );
        assert_eq!(
            payload_token(&json!({ "Authorization": "Bearer upper" })),
            Some("upper".to_string())
        );
        assert_eq!(payload_token(&json!({})), None);
        assert_eq!(payload_token(&json!({ "authorization": 42 })), None);
    }

    #[tokio::test]
    async fn test_invalid_token_is_rejected_with_401() {
        let state = test_state().await;

        let (status, body) = post(&state, Some("not-a-jwt"), "{ me { username } }").await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["errors"][0]["extensions"]["code"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn test_rejected_mutation_writes_nothing() {
        let state = test_state().await;

        let (status, _) = post(
            &state,
            Some("not-a-jwt"),
            r#"mutation { addBook(title: "Dune", author: "Frank Herbert", published: 1965, genres: []) { id } }"#,
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(state.db.books().count().await.unwrap(), 0);
        assert_eq!(state.db.authors().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_valid_token_sets_current_user() {
        let state = test_state().await;
        let user = register(&state, "mluukkai").await;
        let token = state.auth.issue_token(&user).unwrap();

        let (status, body) = post(&state, Some(&token), "{ me { username favoriteGenre } }").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["data"]["me"],
            json!({ "username": "mluukkai", "favoriteGenre": "refactoring" })
        );
    }

    #[tokio::test]
    async fn test_missing_header_is_anonymous() {
        let state = test_state().await;

        let (status, body) = post(&state, None, "{ me { username } }").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["me"], Value::Null);

        let (status, body) = post(
            &state,
            None,
            r#"mutation { addBook(title: "Dune", author: "Frank Herbert", published: 1965, genres: []) { id } }"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["errors"][0]["extensions"]["code"], "UNAUTHENTICATED");
    }

    #[tokio::test]
    async fn test_get_without_html_is_refused() {
        let state = test_state().await;
        let response = build_app(state)
            .oneshot(Request::builder().uri("/graphql").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_connection_init_refuses_invalid_token() {
        let state = test_state().await;

        let result = connection_init(
            state.auth.clone(),
            None,
            json!({ "authorization": "Bearer forged" }),
        )
        .await;
        let err = result.err().unwrap();
        assert_eq!(
            err.extensions.unwrap().get("code"),
            Some(&async_graphql::Value::from("INVALID_TOKEN"))
        );

        let result = connection_init(state.auth.clone(), Some("forged".to_string()), json!({})).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_connection_init_accepts_valid_or_missing_token() {
        let state = test_state().await;
        let user = register(&state, "root").await;
        let token = state.auth.issue_token(&user).unwrap();

        let with_payload = connection_init(
            state.auth.clone(),
            None,
            json!({ "authorization": format!("Bearer {}", token) }),
        )
        .await;
        assert!(with_payload.is_ok());

        let with_header = connection_init(state.auth.clone(), Some(token), json!({})).await;
        assert!(with_header.is_ok());

        let anonymous = connection_init(state.auth.clone(), None, json!({})).await;
        assert!(anonymous.is_ok());
    }
}
