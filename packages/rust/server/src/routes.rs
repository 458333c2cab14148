//! Control surface handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use leadsync_core::{SchedulerStatus, SilentProgress};
use leadsync_mailer::MailRequest;
use leadsync_shared::{LeadSyncError, PassReport};

use crate::AppState;
use crate::error::ApiError;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sync-leads", post(trigger_sync))
        .route("/sync-status", get(sync_status))
        .route("/send-email", post(send_email))
        .route("/health", get(health))
}

// ---------------------------------------------------------------------------
// POST /sync-leads
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SyncAccepted {
    pub message: &'static str,
    pub pass_running: bool,
}

/// Start a pass in the background, or refuse if one is already running.
#[instrument(level = "info", skip_all)]
async fn trigger_sync(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SyncAccepted>), ApiError> {
    let permit = state
        .orchestrator
        .try_begin()
        .ok_or(LeadSyncError::PassInProgress)?;

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        let report = orchestrator.run_with_permit(permit, &SilentProgress).await;
        info!(pass_id = %report.pass_id, status = %report.status, "manual pass finished");
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(SyncAccepted {
            message: "Lead synchronization started in background",
            pass_running: true,
        }),
    ))
}

// ---------------------------------------------------------------------------
// GET /sync-status
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    #[serde(flatten)]
    pub scheduler: SchedulerStatus,
    pub pass_running: bool,
    pub last_pass: Option<PassReport>,
}

async fn sync_status(State(state): State<AppState>) -> Json<SyncStatusResponse> {
    Json(SyncStatusResponse {
        scheduler: state.scheduler.status(),
        pass_running: state.orchestrator.is_running(),
        last_pass: state.orchestrator.last_report().await,
    })
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub scheduler_running: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        scheduler_running: state.scheduler.is_running(),
    })
}

// ---------------------------------------------------------------------------
// POST /send-email
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SendEmailRequest {
    pub email: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub template_name: Option<String>,
    #[serde(default)]
    pub template_data: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[instrument(level = "info", skip_all)]
async fn send_email(
    State(state): State<AppState>,
    Json(req): Json<SendEmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let to = req.email.trim();
    if to.is_empty() || !to.contains('@') {
        return Err(ApiError::InvalidInput(format!(
            "'{}' is not an email address",
            req.email
        )));
    }
    if let Some(data) = &req.template_data {
        if !data.is_object() {
            return Err(ApiError::InvalidInput(
                "template_data must be a JSON object".to_string(),
            ));
        }
    }

    let request = MailRequest {
        to: to.to_string(),
        subject: req.subject.filter(|s| !s.trim().is_empty()),
        template_name: req.template_name,
        template_data: req.template_data,
        ..MailRequest::default()
    };
    state.orchestrator.mail().send_mail(&request).await?;

    Ok(Json(MessageResponse {
        message: "Email sent successfully",
    }))
}
