use crate::alignment::{self, DisplayOptions};
use crate::config::Config;
use crate::errors::AppError;
use crate::lead_detail::LeadDetailService;
use crate::models::{AlignmentSource, RawServiceMatch, Service};
use crate::session::{SessionContext, ViewRegistry, ViewSlot};
use crate::view_state::{LeadView, ViewPhase};
use axum::{
    body::Bytes,
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Header carrying the session id issued by `POST /api/v1/sessions`.
pub const SESSION_HEADER: &str = "x-session-id";

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Per-session lead-detail views.
    pub views: ViewRegistry,
    /// Lead fetch, alignment and validation orchestration.
    pub lead_detail: LeadDetailService,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, AppError> {
        Ok(Self {
            views: ViewRegistry::new(config.session_idle_ttl()),
            lead_detail: LeadDetailService::new(&config)?,
            config,
        })
    }

    async fn slot(&self, session: &SessionContext) -> Result<Arc<ViewSlot>, AppError> {
        self.views
            .slot(session)
            .await
            .ok_or_else(|| AppError::Unauthorized("Session expired".to_string()))
    }
}

/// Body of `POST /api/v1/leads/:lead_id/view`.
#[derive(Debug, Default, Deserialize)]
pub struct OpenViewRequest {
    /// Alignment computed when the lead was created, handed over to skip recomputation.
    #[serde(default)]
    pub initial_alignment: Option<Vec<RawServiceMatch>>,
}

impl OpenViewRequest {
    /// Parses the optional request body. An empty body means no navigation payload;
    /// anything else must be a valid request.
    pub fn from_body(body: &[u8]) -> Result<Self, AppError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid view request body: {}", e)))
    }
}

/// A view snapshot with its render phase.
#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub phase: ViewPhase,
    #[serde(flatten)]
    pub view: LeadView,
}

impl From<LeadView> for ViewResponse {
    fn from(view: LeadView) -> Self {
        Self {
            phase: view.phase(),
            view,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicesResponse<'a> {
    pub lead_id: &'a str,
    pub source: AlignmentSource,
    pub categories: Vec<&'a str>,
    pub services: Vec<&'a Service>,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "lead-detail-bff",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Rejects requests without the configured bearer token. No-op when `API_KEY` is unset.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(ref expected) = state.config.api_key else {
        return Ok(next.run(request).await);
    };

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    if !constant_time_compare(token.trim(), expected) {
        return Err(AppError::Unauthorized("Invalid bearer token".to_string()));
    }

    Ok(next.run(request).await)
}

/// Resolves the `X-Session-Id` header into a [`SessionContext`] extension.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session_id = request
        .headers()
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Unauthorized("Missing X-Session-Id header".to_string()))?;

    let session = state
        .views
        .session(&session_id)
        .await
        .ok_or_else(|| AppError::Unauthorized(format!("Unknown session {}", session_id)))?;

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes()
        .iter()
        .zip(b.as_bytes().iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// POST /api/v1/sessions
pub async fn create_session(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let session = state.views.create_session().await;
    (
        StatusCode::CREATED,
        Json(json!({ "session_id": session.session_id })),
    )
}

/// POST /api/v1/leads/:lead_id/view
///
/// Opens the lead-detail view for this session. Returns once the lead is loaded;
/// alignment and validation keep loading in the background.
pub async fn open_view(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Path(lead_id): Path<String>,
    body: Bytes,
) -> Result<Json<ViewResponse>, AppError> {
    if lead_id.trim().is_empty() {
        return Err(AppError::BadRequest("lead_id cannot be empty".to_string()));
    }
    tracing::info!(
        "POST /leads/{}/view (session {})",
        lead_id,
        session.session_id
    );

    let navigation = OpenViewRequest::from_body(&body)?.initial_alignment;
    let slot = state.slot(&session).await?;
    let activity = state.lead_detail.open(slot, &lead_id, navigation).await?;

    Ok(Json(activity.view.into()))
}

/// GET /api/v1/view
pub async fn get_view(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<ViewResponse>, AppError> {
    let view = state
        .slot(&session)
        .await?
        .snapshot()
        .await
        .ok_or_else(|| AppError::NotFound("No lead view is open".to_string()))?;

    Ok(Json(view.into()))
}

/// GET /api/v1/view/services?sort=match|confidence&category=..&hide_low=true
pub async fn get_services(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
    Query(options): Query<DisplayOptions>,
) -> Result<Json<serde_json::Value>, AppError> {
    let view = state
        .slot(&session)
        .await?
        .snapshot()
        .await
        .ok_or_else(|| AppError::NotFound("No lead view is open".to_string()))?;

    let resolved = view.alignment().ok_or_else(|| {
        AppError::Conflict(format!(
            "Service alignment for lead {} is not resolved",
            view.lead_id
        ))
    })?;

    let response = ServicesResponse {
        lead_id: &view.lead_id,
        source: resolved.source,
        categories: alignment::categories(&resolved.services),
        services: alignment::display_services(&resolved.services, &options),
    };

    serde_json::to_value(&response)
        .map(Json)
        .map_err(|e| AppError::InternalError(format!("Failed to serialize services: {}", e)))
}

/// POST /api/v1/view/validation/retry
pub async fn retry_validation(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SessionContext>,
) -> Result<(StatusCode, Json<ViewResponse>), AppError> {
    let slot = state.slot(&session).await?;
    let activity = state.lead_detail.retry_validation(slot).await?;
    Ok((StatusCode::ACCEPTED, Json(activity.view.into())))
}
