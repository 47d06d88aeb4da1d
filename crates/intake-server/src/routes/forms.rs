//! Form management endpoints

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use intake_spec::{Form, FormDocument, FormError, FormId, FormPatch, InstitutionId, NewForm};
use uuid::Uuid;

use super::{fields, submissions};
use crate::auth::{MaybePrincipal, Principal};
use crate::models::{ApiResponse, Deleted, ListParams};
use crate::{ApiError, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:institution_id", get(list_forms).post(create_form))
        .route(
            "/:institution_id/:form_id",
            get(get_form).put(update_form).delete(delete_form),
        )
        .route("/:institution_id/:form_id/fields", post(fields::replace_fields))
        .route("/:institution_id/:form_id/submit", post(submissions::submit))
        .route(
            "/:institution_id/:form_id/submissions",
            get(submissions::list_submissions),
        )
}

/// List forms of an institution, newest first. Inactive forms are only
/// listed for principals allowed to manage the institution.
pub async fn list_forms(
    State(state): State<Arc<AppState>>,
    MaybePrincipal(principal): MaybePrincipal,
    Path(institution_id): Path<Uuid>,
    Query(params): Query<ListParams>,
) -> Result<Json<ApiResponse<Vec<Form>>>, ApiError> {
    let institution = InstitutionId(institution_id);
    if params.include_inactive {
        principal
            .as_ref()
            .ok_or(ApiError::Unauthenticated)?
            .authorize(institution)?;
    }
    let include_inactive = params.include_inactive;
    let forms = state
        .run("list forms", move |store| {
            store.list_forms(institution, include_inactive)
        })
        .await?;
    Ok(Json(ApiResponse::success(forms)))
}

/// Get a form with its ordered fields.
pub async fn get_form(
    State(state): State<Arc<AppState>>,
    MaybePrincipal(principal): MaybePrincipal,
    Path((institution_id, form_id)): Path<(Uuid, u64)>,
) -> Result<Json<ApiResponse<FormDocument>>, ApiError> {
    let institution = InstitutionId(institution_id);
    let form_id = FormId(form_id);
    let document = state
        .run("get form", move |store| store.get_form(institution, form_id))
        .await?;
    if !document.form.is_active {
        match principal {
            Some(principal) => principal.authorize(institution)?,
            None => return Err(FormError::not_found("form", form_id).into()),
        }
    }
    Ok(Json(ApiResponse::success(document)))
}

pub async fn create_form(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(institution_id): Path<Uuid>,
    body: Result<Json<NewForm>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Form>>), ApiError> {
    let institution = InstitutionId(institution_id);
    principal.authorize(institution)?;
    let Json(input) = body?;

    let form = state
        .run("create form", move |store| {
            store.create_form(institution, input.clone())
        })
        .await?;
    tracing::debug!(%institution, form_id = %form.id, principal = %principal.id, "create form request served");
    Ok((StatusCode::CREATED, Json(ApiResponse::success(form))))
}

/// Partially update a form header. Honours `If-Match` like the field list.
pub async fn update_form(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path((institution_id, form_id)): Path<(Uuid, u64)>,
    headers: HeaderMap,
    body: Result<Json<FormPatch>, JsonRejection>,
) -> Result<Json<ApiResponse<Form>>, ApiError> {
    let institution = InstitutionId(institution_id);
    principal.authorize(institution)?;
    let expected = fields::expected_version(&headers)?;
    let Json(patch) = body?;

    let form_id = FormId(form_id);
    let form = state
        .run("update form", move |store| {
            store.update_form(institution, form_id, patch.clone(), expected)
        })
        .await?;
    Ok(Json(ApiResponse::success(form)))
}

/// Delete a form together with its fields and submissions.
pub async fn delete_form(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path((institution_id, form_id)): Path<(Uuid, u64)>,
) -> Result<Json<ApiResponse<Deleted>>, ApiError> {
    let institution = InstitutionId(institution_id);
    principal.authorize(institution)?;

    let form_id = FormId(form_id);
    state
        .run("delete form", move |store| store.delete_form(institution, form_id))
        .await?;
    tracing::debug!(%institution, %form_id, principal = %principal.id, "delete form request served");
    Ok(Json(ApiResponse::success(Deleted { deleted: true })))
}
