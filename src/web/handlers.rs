use super::error::ApiError;
use super::{ApiResponse, AppState, Identity};
use crate::ledger::{User, UsageStatus};
use crate::clock;
use crate::pipeline::{ProjectionInput, ReportRequest};
use crate::projection::{ProjectionRow, ProjectionSummary};
use crate::table::{resolve_upload, IndustryLookupResult};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Json, Response};
use log::info;
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct LoginBody {
    pub email: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user: User,
    pub usage: UsageStatus,
}

#[derive(Deserialize)]
pub struct BootstrapBody {
    pub key: String,
}

#[derive(Deserialize)]
pub struct ApprovalBody {
    pub target: String,
    pub approved: bool,
}

#[derive(Deserialize)]
pub struct LookupQuery {
    #[serde(default)]
    pub code: String,
}

#[derive(Serialize)]
pub struct ProjectionResponse {
    pub rows: Vec<ProjectionRow>,
    pub summary: ProjectionSummary,
}

/// GET /api/health
pub async fn health() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/login
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let service = state.service;
    let response = blocking(move || {
        let user = service.access().login(&body.email)?;
        let usage = service.ledger().status(&user.email);
        Ok(LoginResponse { user, usage })
    })
    .await?;
    Ok(Json(ApiResponse::ok(response)))
}

/// POST /api/admin/bootstrap
pub async fn bootstrap(
    State(state): State<AppState>,
    Identity(email): Identity,
    Json(body): Json<BootstrapBody>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let service = state.service;
    let user = blocking(move || Ok(service.access().bootstrap_admin(&email, &body.key)?)).await?;
    Ok(Json(ApiResponse::ok(user)))
}

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    Identity(email): Identity,
) -> Result<Json<ApiResponse<Vec<User>>>, ApiError> {
    let service = state.service;
    let users = blocking(move || Ok(service.access().list_users(&email)?)).await?;
    Ok(Json(ApiResponse::ok(users)))
}

/// POST /api/admin/approval
pub async fn set_approval(
    State(state): State<AppState>,
    Identity(email): Identity,
    Json(body): Json<ApprovalBody>,
) -> Result<Json<ApiResponse<User>>, ApiError> {
    let service = state.service;
    let user = blocking(move || {
        Ok(service
            .access()
            .set_approval(&email, &body.target, body.approved)?)
    })
    .await?;
    Ok(Json(ApiResponse::ok(user)))
}

/// GET /api/usage
pub async fn usage(
    State(state): State<AppState>,
    Identity(email): Identity,
) -> Result<Json<ApiResponse<UsageStatus>>, ApiError> {
    let service = state.service;
    let status = blocking(move || {
        let user = service.access().current_user(&email)?;
        Ok(service.ledger().status(&user.email))
    })
    .await?;
    Ok(Json(ApiResponse::ok(status)))
}

/// POST /api/lookup?code=
///
/// Accepts an .xlsx workbook or CSV body. Lookup failures are reported in
/// the result status, not as HTTP errors.
pub async fn lookup(
    State(state): State<AppState>,
    Identity(email): Identity,
    Query(query): Query<LookupQuery>,
    body: Bytes,
) -> Result<Json<ApiResponse<IndustryLookupResult>>, ApiError> {
    let service = state.service;
    let result = blocking(move || {
        service.access().current_user(&email)?;
        if query.code.trim().is_empty() {
            return Err(ApiError::bad_request("code is required"));
        }
        let result = resolve_upload(&body, &query.code);
        info!("lookup {} by {}: {}", result.industry_code, email, result.status.note());
        Ok(result)
    })
    .await?;
    Ok(Json(ApiResponse::ok(result)))
}

/// POST /api/projection
pub async fn projection(
    State(state): State<AppState>,
    Identity(email): Identity,
    Json(input): Json<ProjectionInput>,
) -> Result<Json<ApiResponse<ProjectionResponse>>, ApiError> {
    let service = state.service;
    blocking(move || Ok(service.access().current_user(&email)?)).await?;

    let projection = input.project(&clock::now_local())?;
    let summary = projection.summary();
    Ok(Json(ApiResponse::ok(ProjectionResponse {
        rows: projection.rows,
        summary,
    })))
}

/// POST /api/report
pub async fn report(
    State(state): State<AppState>,
    Identity(email): Identity,
    Json(request): Json<ReportRequest>,
) -> Result<Response, ApiError> {
    let report = state.service.generate(&email, &request).await?;

    let disposition = format!("attachment; filename=\"{}\"", report.filename);
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| ApiError::bad_request(format!("unusable filename: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(report.content_type)),
            (header::CONTENT_DISPOSITION, disposition),
            (
                header::HeaderName::from_static("x-usage-daily-left"),
                HeaderValue::from(report.usage.daily_left),
            ),
            (
                header::HeaderName::from_static("x-usage-monthly-left"),
                HeaderValue::from(report.usage.monthly_left),
            ),
        ],
        report.bytes,
    )
        .into_response())
}

/// Run store-bound work on the blocking pool
async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::internal(format!("background task failed: {e}")))?
}
