//! Request handlers and wire types.

use crate::error::ApiError;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use nfce_core::{JobId, Receipt};
use nfce_jobs::{JobSnapshot, JobStatus};
use nfce_scraper::CaptchaChallenge;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// `POST /jobs` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    /// Access key, any formatting
    #[serde(default)]
    pub access_key: String,
}

/// `POST /jobs` response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    /// Id of the new job
    pub job_id: String,
}

/// `POST /jobs/:id/captcha` body.
#[derive(Debug, Deserialize)]
pub struct SubmitCaptchaRequest {
    /// Text read from the image
    #[serde(default)]
    pub solution: String,
}

/// `POST /jobs/:id/captcha` response.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitCaptchaResponse {
    /// Job status after the handoff
    pub status: JobStatus,
}

/// Pending challenge with the image inlined.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptchaResponse {
    /// Base64 image bytes
    pub image: String,
    /// Image content type
    pub content_type: String,
    /// Challenge id
    pub id: String,
}

impl From<CaptchaChallenge> for CaptchaResponse {
    fn from(challenge: CaptchaChallenge) -> Self {
        Self {
            image: BASE64.encode(&challenge.image),
            content_type: challenge.content_type,
            id: challenge.id,
        }
    }
}

/// `GET /jobs/:id` response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    /// Job id
    pub id: String,
    /// Current status
    pub status: JobStatus,
    /// Key being retrieved
    pub access_key: String,
    /// Registration time
    pub created_at: DateTime<Utc>,
    /// Receipt, once completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Receipt>,
    /// Error message, once failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Pending challenge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captcha: Option<CaptchaResponse>,
}

impl From<JobSnapshot> for JobResponse {
    fn from(snapshot: JobSnapshot) -> Self {
        Self {
            id: snapshot.id.to_string(),
            status: snapshot.status,
            access_key: snapshot.access_key.to_string(),
            created_at: snapshot.created_at,
            result: snapshot.result,
            error: snapshot.error,
            captcha: snapshot.captcha.map(CaptchaResponse::from),
        }
    }
}

pub(crate) async fn healthz() -> &'static str {
    "ok"
}

pub(crate) async fn create_job(
    State(state): State<AppState>,
    request: Result<Json<CreateJobRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateJobResponse>), ApiError> {
    let Json(request) = request.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if request.access_key.trim().is_empty() {
        return Err(ApiError::BadRequest("accessKey is required".to_string()));
    }

    let job = state.jobs.submit(&request.access_key)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateJobResponse {
            job_id: job.id().to_string(),
        }),
    ))
}

pub(crate) async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = lookup(&state, &id)?;
    Ok(Json(JobResponse::from(job.snapshot())))
}

pub(crate) async fn submit_captcha(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Result<Json<SubmitCaptchaRequest>, JsonRejection>,
) -> Result<Json<SubmitCaptchaResponse>, ApiError> {
    let Json(request) = request.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if request.solution.trim().is_empty() {
        return Err(ApiError::BadRequest("solution is required".to_string()));
    }

    let job = lookup(&state, &id)?;
    job.submit_captcha(request.solution.trim())?;

    Ok(Json(SubmitCaptchaResponse {
        status: job.status(),
    }))
}

fn lookup(state: &AppState, id: &str) -> Result<Arc<nfce_jobs::Job>, ApiError> {
    JobId::new(id)
        .ok()
        .and_then(|id| state.jobs.get(&id))
        .ok_or_else(|| ApiError::JobNotFound(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_captcha_image_is_base64() {
        let response = CaptchaResponse::from(CaptchaChallenge {
            id: "17".to_string(),
            image: b"GIF89a".to_vec(),
            content_type: "image/gif".to_string(),
        });
        assert_eq!(response.image, "R0lGODlh");

        let json = serde_json::to_value(&response).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({ "image": "R0lGODlh", "contentType": "image/gif", "id": "17" })
        );
    }
}
