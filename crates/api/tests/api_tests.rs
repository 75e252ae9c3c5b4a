//! Router-level tests. The identity provider is an `httpmock` server and bearer
//! tokens are signed with the fixture key published at the realm's JWKS URL.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_ORIGIN,
            ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, AUTHORIZATION,
            CONTENT_TYPE, ORIGIN,
        },
        Method, Request, StatusCode,
    },
    Router,
};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use httpmock::Mock;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

use iam_bff_api::{build_router, AppState};
use iam_bff_config::{AppConfig, KeycloakConfig};
use iam_bff_keycloak::IamServices;

type TestResult<T = ()> = anyhow::Result<T>;

const SIGNING_KEY: &str = include_str!("fixtures/signing_key.pem");
const FOREIGN_KEY: &str = include_str!("fixtures/foreign_key.pem");
const MODULUS: &str = include_str!("fixtures/signing_key.n");
const KID: &str = "realm-key";

const CERTS_PATH: &str = "/realms/test/protocol/openid-connect/certs";
const ADMIN_TOKEN_PATH: &str = "/realms/master/protocol/openid-connect/token";
const USERS_PATH: &str = "/admin/realms/test/users";

struct TestContext {
    server: MockServer,
    state: AppState,
}

impl TestContext {
    async fn new() -> TestResult<Self> {
        let server = MockServer::start_async().await;
        let mut config = AppConfig::default();
        config.keycloak = KeycloakConfig {
            server_url: server.base_url(),
            realm: "test".into(),
            client_id: "bff".into(),
            client_secret: Some("bff-secret".into()),
            admin_username: "admin".into(),
            admin_password: "admin-pass".into(),
            ..KeycloakConfig::default()
        };

        let state = AppState::new(IamServices::from_config(&config)?);
        Ok(Self { server, state })
    }

    fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    async fn publish_keys(&self) -> Mock<'_> {
        self.server
            .mock_async(|when, then| {
                when.method(GET).path(CERTS_PATH);
                then.status(200).json_body(json!({
                    "keys": [{
                        "kid": KID,
                        "kty": "RSA",
                        "alg": "RS256",
                        "use": "sig",
                        "n": MODULUS.trim(),
                        "e": "AQAB"
                    }]
                }));
            })
            .await
    }

    async fn admin_token(&self) -> Mock<'_> {
        self.server
            .mock_async(|when, then| {
                when.method(POST).path(ADMIN_TOKEN_PATH);
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({
                        "access_token": "admin-token",
                        "token_type": "Bearer",
                        "expires_in": 300
                    }));
            })
            .await
    }

    async fn user_lookup(&self, username: &str, id: &str) -> Mock<'_> {
        let username = username.to_string();
        let id = id.to_string();
        self.server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(USERS_PATH)
                    .query_param("username", username.as_str())
                    .query_param("exact", "true");
                then.status(200).json_body(json!([{
                    "id": id,
                    "username": username,
                    "email": "a@x.com",
                    "enabled": true,
                    "emailVerified": false
                }]));
            })
            .await
    }

    fn bearer(&self) -> TestResult<String> {
        self.sign_with(SIGNING_KEY)
    }

    fn sign_with(&self, pem: &str) -> TestResult<String> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(KID.to_string());
        let claims = json!({
            "sub": "u-1",
            "iss": format!("{}/realms/test", self.server.base_url()),
            "exp": now() + 300,
            "preferred_username": "alice",
            "name": "Alice Liddell",
            "email": "a@x.com"
        });
        let key = EncodingKey::from_rsa_pem(pem.as_bytes())?;
        Ok(format!("Bearer {}", encode(&header, &claims, &key)?))
    }
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}

fn json_request(method: Method, uri: &str, body: Value) -> TestResult<Request<Body>> {
    Ok(Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body)?))?)
}

async fn read_json(response: axum::response::Response) -> TestResult<Value> {
    let body = response.into_body().collect().await?.to_bytes();
    Ok(serde_json::from_slice(&body)?)
}

mod router_tests {
    use super::*;

    #[tokio::test]
    async fn health_is_anonymous() -> TestResult {
        let ctx = TestContext::new().await?;
        let response = ctx
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty())?)
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json(response).await?;
        assert_eq!(payload["status"], "ok");
        Ok(())
    }

    #[tokio::test]
    async fn openapi_document_is_served_without_token() -> TestResult {
        let ctx = TestContext::new().await?;
        let response = ctx
            .router()
            .oneshot(
                Request::builder()
                    .uri("/api-docs/openapi.json")
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json(response).await?;
        assert!(payload["paths"]["/api/users/iam/register"].is_object());
        assert!(payload["components"]["securitySchemes"]["bearerAuth"].is_object());
        Ok(())
    }

    #[tokio::test]
    async fn cors_preflight_allows_authorization_header() -> TestResult {
        let ctx = TestContext::new().await?;
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/admin/iam")
            .header(ORIGIN, "https://portal.example.com")
            .header(ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .header(ACCESS_CONTROL_REQUEST_HEADERS, "authorization, content-type")
            .body(Body::empty())?;

        let response = ctx.router().oneshot(request).await?;
        assert!(
            response.status().is_success(),
            "expected CORS preflight to succeed, got {}",
            response.status()
        );

        let allow_origin = response
            .headers()
            .get(ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        assert_eq!(allow_origin, "*");

        let allow_headers = response
            .headers()
            .get(ACCESS_CONTROL_ALLOW_HEADERS)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        assert!(allow_headers.contains("authorization"));
        Ok(())
    }
}

mod security_tests {
    use super::*;

    #[tokio::test]
    async fn protected_route_without_token_is_401() -> TestResult {
        let ctx = TestContext::new().await?;
        let response = ctx
            .router()
            .oneshot(Request::builder().uri("/api/admin/iam").body(Body::empty())?)
            .await?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let payload = read_json(response).await?;
        assert_eq!(payload["error"], "401");
        assert!(payload["message"].is_string());
        Ok(())
    }

    #[tokio::test]
    async fn realm_signed_token_is_admitted() -> TestResult {
        let ctx = TestContext::new().await?;
        ctx.publish_keys().await;

        let response = ctx
            .router()
            .oneshot(
                Request::builder()
                    .uri("/api/users/iam/me")
                    .header(AUTHORIZATION, ctx.bearer()?)
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json(response).await?;
        assert_eq!(payload, json!({"name": "Alice Liddell", "email": "a@x.com"}));
        Ok(())
    }

    #[tokio::test]
    async fn token_signed_by_another_key_is_401() -> TestResult {
        let ctx = TestContext::new().await?;
        ctx.publish_keys().await;

        let response = ctx
            .router()
            .oneshot(
                Request::builder()
                    .uri("/api/users/iam/me")
                    .header(AUTHORIZATION, ctx.sign_with(FOREIGN_KEY)?)
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_signing_keys_answer_503() -> TestResult {
        let ctx = TestContext::new().await?;
        ctx.server
            .mock_async(|when, then| {
                when.method(GET).path(CERTS_PATH);
                then.status(503);
            })
            .await;

        let response = ctx
            .router()
            .oneshot(
                Request::builder()
                    .uri("/api/users/iam/me")
                    .header(AUTHORIZATION, ctx.bearer()?)
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        Ok(())
    }
}

mod user_flow_tests {
    use super::*;

    #[tokio::test]
    async fn registered_user_is_visible_to_admins() -> TestResult {
        let ctx = TestContext::new().await?;
        ctx.publish_keys().await;
        ctx.admin_token().await;
        let create = ctx
            .server
            .mock_async(|when, then| {
                when.method(POST).path(USERS_PATH);
                then.status(201);
            })
            .await;
        ctx.user_lookup("alice", "u-1").await;
        ctx.server
            .mock_async(|when, then| {
                when.method(PUT).path(format!("{USERS_PATH}/u-1/reset-password"));
                then.status(204);
            })
            .await;

        let register = json_request(
            Method::POST,
            "/api/users/iam/register",
            json!({"username": "alice", "email": "a@x.com", "password": "p", "enabled": true}),
        )?;
        let response = ctx.router().oneshot(register).await?;
        assert_eq!(response.status(), StatusCode::OK);
        create.assert_async().await;

        let response = ctx
            .router()
            .oneshot(
                Request::builder()
                    .uri("/api/admin/iam/alice")
                    .header(AUTHORIZATION, ctx.bearer()?)
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        let payload = read_json(response).await?;
        assert_eq!(payload["username"], "alice");
        assert_eq!(payload["email"], "a@x.com");
        assert_eq!(payload["enabled"], true);
        Ok(())
    }

    #[tokio::test]
    async fn failed_password_step_rolls_back_and_answers_500() -> TestResult {
        let ctx = TestContext::new().await?;
        ctx.admin_token().await;
        ctx.server
            .mock_async(|when, then| {
                when.method(POST).path(USERS_PATH);
                then.status(201);
            })
            .await;
        ctx.user_lookup("alice", "u-1").await;
        ctx.server
            .mock_async(|when, then| {
                when.method(PUT).path(format!("{USERS_PATH}/u-1/reset-password"));
                then.status(400)
                    .json_body(json!({"errorMessage": "invalidPasswordMinLengthMessage"}));
            })
            .await;
        let rollback = ctx
            .server
            .mock_async(|when, then| {
                when.method(DELETE).path(format!("{USERS_PATH}/u-1"));
                then.status(204);
            })
            .await;

        let register = json_request(
            Method::POST,
            "/api/users/iam/register",
            json!({"username": "alice", "email": "a@x.com", "password": "p"}),
        )?;
        let response = ctx.router().oneshot(register).await?;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        rollback.assert_async().await;
        let payload = read_json(response).await?;
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("set-password"), "unexpected message {message}");
        Ok(())
    }

    #[tokio::test]
    async fn forgot_password_for_unknown_user_sends_nothing() -> TestResult {
        let ctx = TestContext::new().await?;
        ctx.admin_token().await;
        ctx.server
            .mock_async(|when, then| {
                when.method(GET).path(USERS_PATH).query_param("username", "ghost");
                then.status(200).json_body(json!([]));
            })
            .await;
        let email = ctx
            .server
            .mock_async(|when, then| {
                when.method(PUT).path_contains("execute-actions-email");
                then.status(204);
            })
            .await;

        let request = json_request(
            Method::POST,
            "/api/users/iam/forgot-password",
            json!({"username": "ghost", "newPassword": "n3w"}),
        )?;
        let response = ctx.router().oneshot(request).await?;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        email.assert_hits_async(0).await;
        Ok(())
    }

    #[tokio::test]
    async fn rejected_login_is_401() -> TestResult {
        let ctx = TestContext::new().await?;
        ctx.server
            .mock_async(|when, then| {
                when.method(POST).path("/realms/test/protocol/openid-connect/token");
                then.status(401).json_body(json!({
                    "error": "invalid_grant",
                    "error_description": "Invalid user credentials"
                }));
            })
            .await;

        let request = json_request(
            Method::POST,
            "/api/users/iam/login",
            json!({"username": "alice", "password": "wrong"}),
        )?;
        let response = ctx.router().oneshot(request).await?;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn logout_answers_no_content() -> TestResult {
        let ctx = TestContext::new().await?;
        let logout = ctx
            .server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/realms/test/protocol/openid-connect/logout")
                    .body_contains("refresh_token=rt-1");
                then.status(204);
            })
            .await;

        let request = json_request(
            Method::POST,
            "/api/users/iam/logout",
            json!({"refreshToken": "rt-1"}),
        )?;
        let response = ctx.router().oneshot(request).await?;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        logout.assert_async().await;
        Ok(())
    }

    fn authorized_json(bearer: String, uri: &str, body: Value) -> TestResult<Request<Body>> {
        let mut request = json_request(Method::POST, uri, body)?;
        request.headers_mut().insert(AUTHORIZATION, bearer.parse()?);
        Ok(request)
    }

    #[tokio::test]
    async fn password_reset_for_another_user_is_forbidden() -> TestResult {
        let ctx = TestContext::new().await?;
        ctx.publish_keys().await;
        ctx.admin_token().await;
        ctx.user_lookup("bob", "u-2").await;
        let reset = ctx
            .server
            .mock_async(|when, then| {
                when.method(PUT).path_contains("reset-password");
                then.status(204);
            })
            .await;

        let request = authorized_json(
            ctx.bearer()?,
            "/api/users/iam/bob/change-password",
            json!({"newPassword": "taken-over"}),
        )?;
        let response = ctx.router().oneshot(request).await?;

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        reset.assert_hits_async(0).await;
        let payload = read_json(response).await?;
        assert_eq!(payload["error"], "403");
        Ok(())
    }

    #[tokio::test]
    async fn own_password_reset_without_old_password_succeeds() -> TestResult {
        let ctx = TestContext::new().await?;
        ctx.publish_keys().await;
        ctx.admin_token().await;
        ctx.user_lookup("alice", "u-1").await;
        let reset = ctx
            .server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path(format!("{USERS_PATH}/u-1/reset-password"))
                    .json_body_partial(r#"{"value": "fresh-secret"}"#);
                then.status(204);
            })
            .await;

        let request = authorized_json(
            ctx.bearer()?,
            "/api/users/iam/alice/change-password",
            json!({"newPassword": "fresh-secret"}),
        )?;
        let response = ctx.router().oneshot(request).await?;

        assert_eq!(response.status(), StatusCode::OK);
        reset.assert_async().await;
        Ok(())
    }
}

mod logging_tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            self.0
                .lock()
                .map(|buffer| String::from_utf8_lossy(&buffer).into_owned())
                .unwrap_or_default()
        }
    }

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0
                .lock()
                .map_err(|_| io::Error::new(io::ErrorKind::Other, "log buffer poisoned"))?
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn request_log_leaves_out_the_query_string() -> TestResult {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let ctx = TestContext::new().await?;
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/users/iam/introspect?token=eyJSECRET.ACCESS.TOKEN")
            .body(Body::empty())?;
        let response = ctx.router().oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let output = logs.contents();
        assert!(output.contains("Request completed"), "no request log in {output}");
        assert!(output.contains("/api/users/iam/introspect"), "path missing in {output}");
        assert!(!output.contains("eyJSECRET"), "token leaked into {output}");
        Ok(())
    }
}

mod admin_tests {
    use super::*;

    #[tokio::test]
    async fn unknown_role_is_404_and_mappings_untouched() -> TestResult {
        let ctx = TestContext::new().await?;
        ctx.publish_keys().await;
        ctx.admin_token().await;
        ctx.user_lookup("alice", "u-1").await;
        ctx.server
            .mock_async(|when, then| {
                when.method(GET).path("/admin/realms/test/roles/ghost");
                then.status(404)
                    .json_body(json!({"error": "Could not find role"}));
            })
            .await;
        let mapping = ctx
            .server
            .mock_async(|when, then| {
                when.path(format!("{USERS_PATH}/u-1/role-mappings/realm"));
                then.status(204);
            })
            .await;

        let response = ctx
            .router()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/admin/iam/alice/roles/ghost")
                    .header(AUTHORIZATION, ctx.bearer()?)
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        mapping.assert_hits_async(0).await;
        let payload = read_json(response).await?;
        assert_eq!(payload["error"], "404");
        Ok(())
    }

    #[tokio::test]
    async fn deleting_a_user_answers_no_content() -> TestResult {
        let ctx = TestContext::new().await?;
        ctx.publish_keys().await;
        ctx.admin_token().await;
        ctx.user_lookup("alice", "u-1").await;
        let delete = ctx
            .server
            .mock_async(|when, then| {
                when.method(DELETE).path(format!("{USERS_PATH}/u-1"));
                then.status(204);
            })
            .await;

        let response = ctx
            .router()
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/api/admin/iam/alice")
                    .header(AUTHORIZATION, ctx.bearer()?)
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        delete.assert_async().await;
        Ok(())
    }
}

mod client_tests {
    use super::*;

    #[tokio::test]
    async fn client_creation_overrides_caller_flow_settings() -> TestResult {
        let ctx = TestContext::new().await?;
        ctx.publish_keys().await;
        ctx.admin_token().await;
        let create = ctx
            .server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/admin/realms/test/clients")
                    .json_body_partial(
                        json!({
                            "clientId": "billing",
                            "protocol": "openid-connect",
                            "clientAuthenticatorType": "client-secret",
                            "publicClient": false,
                            "serviceAccountsEnabled": true,
                            "standardFlowEnabled": false
                        })
                        .to_string(),
                    );
                then.status(201);
            })
            .await;

        let mut request = json_request(
            Method::POST,
            "/api/iam/clients",
            json!({
                "clientId": "billing",
                "protocol": "saml",
                "publicClient": true,
                "standardFlowEnabled": true
            }),
        )?;
        request
            .headers_mut()
            .insert(AUTHORIZATION, ctx.bearer()?.parse()?);

        let response = ctx.router().oneshot(request).await?;

        assert_eq!(response.status(), StatusCode::OK);
        create.assert_async().await;
        Ok(())
    }

    #[tokio::test]
    async fn scope_check_answers_bool() -> TestResult {
        let ctx = TestContext::new().await?;
        ctx.publish_keys().await;
        ctx.admin_token().await;
        ctx.server
            .mock_async(|when, then| {
                when.method(GET).path("/admin/realms/test/client-scopes");
                then.status(200)
                    .json_body(json!([{"name": "profile"}, {"name": "billing:read"}]));
            })
            .await;

        let response = ctx
            .router()
            .oneshot(
                Request::builder()
                    .uri("/api/iam/clients/scopes/billing:read/check")
                    .header(AUTHORIZATION, ctx.bearer()?)
                    .body(Body::empty())?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await?, json!(true));
        Ok(())
    }

    #[tokio::test]
    async fn service_token_endpoint_is_anonymous() -> TestResult {
        let ctx = TestContext::new().await?;
        let grant = ctx
            .server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/realms/test/protocol/openid-connect/token")
                    .body_contains("grant_type=client_credentials")
                    .body_contains("client_id=billing");
                then.status(200).json_body(json!({
                    "access_token": "svc-token",
                    "expires_in": 300,
                    "token_type": "Bearer"
                }));
            })
            .await;

        let request = json_request(
            Method::POST,
            "/api/iam/token",
            json!({"clientId": "billing", "clientSecret": "s3cret"}),
        )?;
        let response = ctx.router().oneshot(request).await?;

        assert_eq!(response.status(), StatusCode::OK);
        grant.assert_async().await;
        assert_eq!(read_json(response).await?["access_token"], "svc-token");
        Ok(())
    }
}
