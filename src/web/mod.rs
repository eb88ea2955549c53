//! JSON HTTP surface
//!
//! The caller's identity arrives in the `x-user-email` header, set by the
//! session layer in front of this service.

mod error;
mod handlers;

pub use error::ApiError;

use crate::pipeline::ReportService;
use axum::extract::{DefaultBodyLimit, FromRequestParts};
use axum::http::request::Parts;
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use tower_http::cors::CorsLayer;

pub const IDENTITY_HEADER: &str = "x-user-email";

/// Uploaded lookup tables can be several megabytes
const UPLOAD_LIMIT: usize = 16 * 1024 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: ReportService,
}

impl AppState {
    pub fn new(service: ReportService) -> Self {
        Self { service }
    }
}

/// API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

/// Caller email from [`IDENTITY_HEADER`]
pub struct Identity(pub String);

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(IDENTITY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Identity(v.to_string()))
            .ok_or_else(ApiError::unauthorized)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/login", post(handlers::login))
        .route("/api/admin/bootstrap", post(handlers::bootstrap))
        .route("/api/admin/users", get(handlers::list_users))
        .route("/api/admin/approval", post(handlers::set_approval))
        .route("/api/usage", get(handlers::usage))
        .route(
            "/api/lookup",
            post(handlers::lookup).layer(DefaultBodyLimit::max(UPLOAD_LIMIT)),
        )
        .route("/api/projection", post(handlers::projection))
        .route("/api/report", post(handlers::report))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessControl;
    use crate::ledger::{PeriodType, Store};
    use crate::narrative::testing::ScriptedGenerator;
    use crate::report::PdfRenderer;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::{IntoResponse, Response};
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    const ADMIN: &str = "admin@example.com";
    const USER: &str = "user@example.com";

    fn app_with(generator: ScriptedGenerator) -> (Router, Store) {
        let store = Store::in_memory().unwrap();
        let access = AccessControl::new(store.clone(), ADMIN, SecretString::from("s3cret".to_string()));
        let service = ReportService::new(
            store.clone(),
            access,
            Arc::new(generator),
            Arc::new(PdfRenderer::new()),
        );
        (router(AppState::new(service)), store)
    }

    fn app() -> (Router, Store) {
        app_with(ScriptedGenerator::replying("Executive summary\nNext steps"))
    }

    fn json_request(method: &str, uri: &str, who: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(who) = who {
            builder = builder.header(IDENTITY_HEADER, who);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_request(uri: &str, who: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(who) = who {
            builder = builder.header(IDENTITY_HEADER, who);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn login(app: &Router, email: &str) {
        let response = send(app, json_request("POST", "/api/login", None, json!({ "email": email }))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    fn report_form() -> Value {
        json!({
            "sales": 900000000,
            "income_rate": 12.0,
            "insurance_class": "regional",
            "employees": 5,
            "industry_code": "552101",
            "concerns": "audit",
            "tone": "quiet_premium"
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app();
        let response = send(&app, get_request("/api/health", None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["data"], "OK");
    }

    #[tokio::test]
    async fn test_login_returns_user_and_usage() {
        let (app, _) = app();
        let response = send(
            &app,
            json_request("POST", "/api/login", None, json!({ "email": "Admin@Example.com" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["data"]["user"]["email"], ADMIN);
        assert_eq!(body["data"]["user"]["is_admin"], true);
        assert_eq!(body["data"]["usage"]["daily_left"], 5);
    }

    #[tokio::test]
    async fn test_login_rejects_blank_email() {
        let (app, _) = app();
        let response = send(&app, json_request("POST", "/api/login", None, json!({ "email": " " }))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthorized() {
        let (app, _) = app();
        let response = send(&app, get_request("/api/usage", None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(&app, get_request("/api/usage", Some("ghost@example.com"))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_admin_routes_are_forbidden_to_users() {
        let (app, _) = app();
        login(&app, USER).await;

        let response = send(&app, get_request("/api/admin/users", Some(USER))).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send(
            &app,
            json_request(
                "POST",
                "/api/admin/approval",
                Some(USER),
                json!({ "target": USER, "approved": true }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_bootstrap_with_key() {
        let (app, _) = app();
        login(&app, USER).await;

        let response = send(
            &app,
            json_request("POST", "/api/admin/bootstrap", Some(USER), json!({ "key": "wrong" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = send(
            &app,
            json_request("POST", "/api/admin/bootstrap", Some(USER), json!({ "key": "s3cret" })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, get_request("/api/admin/users", Some(USER))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_lookup_resolves_uploaded_csv() {
        let (app, _) = app();
        login(&app, USER).await;

        let header_row = (0..17).map(|i| format!("c{}", i)).collect::<Vec<_>>().join(",");
        let mut search = vec![String::new(); 17];
        search[2] = "B-1".into();
        search[5] = "552101".into();
        let mut key = vec![String::new(); 17];
        key[10] = "B-1".into();
        key[16] = "88.5".into();
        let csv = format!("{}\n{}\n{}\n", header_row, search.join(","), key.join(","));

        let request = Request::builder()
            .method("POST")
            .uri("/api/lookup?code=552101")
            .header(IDENTITY_HEADER, USER)
            .header(header::CONTENT_TYPE, "text/csv")
            .body(Body::from(csv))
            .unwrap();
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["data"]["status"], "OK");
        assert_eq!(body["data"]["business_code"], "B-1");
        assert_eq!(body["data"]["income_rate"], 11.5);
    }

    #[tokio::test]
    async fn test_lookup_resolves_uploaded_xlsx() {
        use crate::table::loader::testing::xlsx_bytes;
        use crate::table::CellValue;

        let (app, _) = app();
        login(&app, USER).await;

        let header_row: Vec<CellValue> = (0..17).map(|i| CellValue::Text(format!("c{}", i))).collect();
        let mut search = vec![CellValue::Empty; 17];
        search[2] = CellValue::from("B-1");
        search[5] = CellValue::Number(552101.0);
        let mut key = vec![CellValue::Empty; 17];
        key[10] = CellValue::from("B-1");
        key[16] = CellValue::Number(88.5);

        let request = Request::builder()
            .method("POST")
            .uri("/api/lookup?code=552101")
            .header(IDENTITY_HEADER, USER)
            .header(
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            )
            .body(Body::from(xlsx_bytes(&[header_row, search, key])))
            .unwrap();
        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["data"]["status"], "OK");
        assert_eq!(body["data"]["business_code"], "B-1");
        assert_eq!(body["data"]["income_rate"], 11.5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_requests_share_the_store() {
        let (app, store) = app();
        let logins: Vec<_> = (0..8)
            .map(|i| {
                let app = app.clone();
                tokio::spawn(async move {
                    let email = format!("user{}@example.com", i);
                    send(&app, json_request("POST", "/api/login", None, json!({ "email": email })))
                        .await
                        .status()
                })
            })
            .collect();
        for login in logins {
            assert_eq!(login.await.unwrap(), StatusCode::OK);
        }
        assert_eq!(store.list_users().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_failed_background_task_is_500() {
        let join_error = tokio::task::spawn_blocking::<_, ()>(|| panic!("worker died")).await.unwrap_err();
        let response = ApiError::from(crate::pipeline::PipelineError::Task(join_error)).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_projection_validates_and_projects() {
        let (app, _) = app();
        login(&app, USER).await;

        let response = send(
            &app,
            json_request(
                "POST",
                "/api/projection",
                Some(USER),
                json!({ "sales": 900000000, "income_rate": 12.0, "base_year": 2025 }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["rows"].as_array().unwrap().len(), 5);
        assert_eq!(body["data"]["rows"][0]["year"], 2025);
        assert_eq!(body["data"]["rows"][0]["conversion_delta"], 4_743_360);

        let response = send(
            &app,
            json_request(
                "POST",
                "/api/projection",
                Some(USER),
                json!({ "sales": 1000, "income_rate": 150.0 }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_projection_rejects_oversized_sales() {
        let (app, _) = app();
        login(&app, USER).await;

        let response = send(
            &app,
            json_request(
                "POST",
                "/api/projection",
                Some(USER),
                json!({ "sales": 2_000_000_000_000_000_000i64, "income_rate": 50.0 }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_report_requires_approval() {
        let (app, _) = app();
        login(&app, USER).await;

        let response = send(&app, json_request("POST", "/api/report", Some(USER), report_form())).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_report_returns_pdf_attachment() {
        let (app, store) = app();
        login(&app, ADMIN).await;
        login(&app, USER).await;
        let response = send(
            &app,
            json_request(
                "POST",
                "/api/admin/approval",
                Some(ADMIN),
                json!({ "target": USER, "approved": true }),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(&app, json_request("POST", "/api/report", Some(USER), report_form())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert!(disposition.starts_with("attachment; filename=\"consulting_report_user_"));
        assert_eq!(response.headers()["x-usage-daily-left"], "4");

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"%PDF-"));

        let events = store.recent_audit(20).unwrap();
        assert!(events.iter().any(|e| e.event_type == "render_ok"));
    }

    #[tokio::test]
    async fn test_report_quota_is_429() {
        let (app, store) = app();
        login(&app, ADMIN).await;
        login(&app, USER).await;
        send(
            &app,
            json_request(
                "POST",
                "/api/admin/approval",
                Some(ADMIN),
                json!({ "target": USER, "approved": true }),
            ),
        )
        .await;

        let (daily, _) = crate::clock::period_keys(&crate::clock::now_local());
        store.usage_put(USER, PeriodType::Daily, &daily, 5).unwrap();

        let response = send(&app, json_request("POST", "/api/report", Some(USER), report_form())).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["data"]["daily_left"], 0);
    }

    #[tokio::test]
    async fn test_report_narrative_failure_is_502() {
        let (app, _) = app_with(ScriptedGenerator::failing());
        login(&app, ADMIN).await;

        let response = send(&app, json_request("POST", "/api/report", Some(ADMIN), report_form())).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
