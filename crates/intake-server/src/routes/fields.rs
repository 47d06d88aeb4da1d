//! Field list replacement

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::http::header::IF_MATCH;
use intake_spec::{FieldDefinition, FormId, InstitutionId};
use uuid::Uuid;

use crate::auth::Principal;
use crate::models::ApiResponse;
use crate::{ApiError, AppState};

/// Replace the complete field list of a form. An `If-Match` header carrying
/// the form version makes the swap conditional.
pub async fn replace_fields(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path((institution_id, form_id)): Path<(Uuid, u64)>,
    headers: HeaderMap,
    body: Result<Json<Vec<FieldDefinition>>, JsonRejection>,
) -> Result<Json<ApiResponse<Vec<FieldDefinition>>>, ApiError> {
    let institution = InstitutionId(institution_id);
    principal.authorize(institution)?;
    let expected = expected_version(&headers)?;
    let Json(fields) = body?;

    let form_id = FormId(form_id);
    let saved = state
        .run("replace fields", move |store| {
            store.replace_fields(institution, form_id, fields.clone(), expected)
        })
        .await?;
    Ok(Json(ApiResponse::success(saved)))
}

pub(crate) fn expected_version(headers: &HeaderMap) -> Result<Option<u64>, ApiError> {
    let Some(value) = headers.get(IF_MATCH) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| ApiError::BadRequest("If-Match must be visible ASCII".into()))?;
    let version = raw.trim().trim_start_matches("W/").trim_matches('"');
    version
        .parse()
        .map(Some)
        .map_err(|_| ApiError::BadRequest(format!("If-Match '{raw}' is not a form version")))
}
