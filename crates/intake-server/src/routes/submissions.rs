//! Submission endpoints

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use intake_spec::{
    FormId, InstitutionId, Submission, SubmissionProcessor, SubmitRequest, values_from_entries,
};
use uuid::Uuid;

use crate::auth::{MaybePrincipal, Principal};
use crate::models::{ApiResponse, SubmitBody};
use crate::{ApiError, AppState};

/// Validate and store a submission. An authenticated caller is always
/// recorded as the submitter.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    MaybePrincipal(principal): MaybePrincipal,
    Path((institution_id, form_id)): Path<(Uuid, u64)>,
    body: Result<Json<SubmitBody>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Submission>>), ApiError> {
    let submitted_by = match principal {
        Some(principal) => Some(principal.id),
        None if state.auth.public_submissions => None,
        None => return Err(ApiError::Unauthenticated),
    };
    let Json(body) = body?;

    let mut request = SubmitRequest::new(values_from_entries(body.values)?);
    request.submitted_by = submitted_by.or(body.submitted_by);
    request.idempotency_key = body.idempotency_key;

    let institution = InstitutionId(institution_id);
    let form_id = FormId(form_id);
    let retry = state.retry;
    let submission = state
        .spawn("submit", move |store| {
            SubmissionProcessor::new(store)
                .with_retry(retry)
                .submit(institution, form_id, request)
        })
        .await?;
    tracing::debug!(
        %institution,
        %form_id,
        submission_id = %submission.id,
        values = submission.values.len(),
        "submit request served"
    );
    Ok((StatusCode::CREATED, Json(ApiResponse::success(submission))))
}

pub async fn list_submissions(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path((institution_id, form_id)): Path<(Uuid, u64)>,
) -> Result<Json<ApiResponse<Vec<Submission>>>, ApiError> {
    let institution = InstitutionId(institution_id);
    principal.authorize(institution)?;

    let form_id = FormId(form_id);
    let submissions = state
        .run("list submissions", move |store| {
            store.list_submissions(institution, form_id)
        })
        .await?;
    Ok(Json(ApiResponse::success(submissions)))
}
